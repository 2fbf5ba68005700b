//! Business operations.
//!
//! Each public operation opens one transaction on the pool, runs the
//! repository calls it needs, appends an audit entry and commits. Helpers
//! marked `pub(crate)` take an open connection instead so that several
//! operations (a sale debiting a card and issuing its invoice, for instance)
//! share the caller's transaction.

pub mod auth;
pub mod cards;
pub mod cash;
pub mod catalog;
pub mod fiscal;
pub mod lunch;
pub mod notifications;
pub mod portal;
pub mod purchasing;
pub mod sales;
pub mod ticket;

#[cfg(test)]
pub(crate) mod testing;
