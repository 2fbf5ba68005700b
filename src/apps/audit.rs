//! Read access to the audit trail.

pub mod urls;
pub mod views;
