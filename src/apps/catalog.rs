//! Categories, products, prices and stock.

pub mod serializers;
pub mod urls;
pub mod views;
