//! Suppliers and purchases.

pub mod serializers;
pub mod urls;
pub mod views;
