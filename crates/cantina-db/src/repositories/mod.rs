//! Repository functions.
//!
//! Every function takes a `&mut SqliteConnection` so a service can compose
//! several of them inside one transaction (`&mut *tx`) or run a single one on
//! a pooled connection.

pub mod accounts;
pub mod audit;
pub mod authorizations;
pub mod cards;
pub mod cash;
pub mod catalog;
pub mod customers;
pub mod fiscal;
pub mod lunch;
pub mod notifications;
pub mod payments;
pub mod promotions;
pub mod purchasing;
pub mod reports;
pub mod sales;

use cantina_core::Error;

pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Error {
	Error::NotFound(format!("{} {} not found", entity, id))
}

/// Joins a list of values for a `weekdays` or `grades` column.
pub(crate) fn join_list<T: ToString>(items: &[T]) -> String {
	items.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
	raw.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(str::to_string)
		.collect()
}
