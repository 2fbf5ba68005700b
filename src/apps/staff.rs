//! Employees and their roles.

pub mod serializers;
pub mod urls;
pub mod views;
