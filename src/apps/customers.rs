//! Customers (guardians), their students and dietary restrictions.

pub mod serializers;
pub mod urls;
pub mod views;
