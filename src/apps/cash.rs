//! Cash registers and their sessions.

pub mod serializers;
pub mod urls;
pub mod views;
