//! The guardians' portal. Everything except the gateway webhook needs a
//! guardian session and only ever shows that family's children.

pub mod serializers;
pub mod urls;
pub mod views;
