//! Stamps (timbrados) and the invoices issued under them.

pub mod serializers;
pub mod urls;
pub mod views;
