//! Management reports. Every endpoint is read-only and needs a manager.

pub mod urls;
pub mod views;
