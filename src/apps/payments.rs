//! Payment methods and their commission rates.

pub mod serializers;
pub mod urls;
pub mod views;
