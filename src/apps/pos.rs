//! Point of sale: pre-sale checks, sales and their lifecycle, tickets and
//! card recharges at the counter.

pub mod serializers;
pub mod urls;
pub mod views;
