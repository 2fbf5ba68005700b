//! # Cantina Core
//!
//! Domain types and business rules shared by every layer of the canteen service.
//!
//! Nothing in this crate touches the network or the database: the modules here
//! are pure functions over plain values, which keeps the rules that move money
//! (card balances, credit, promotions, commissions, fiscal totals) testable in
//! isolation.
//!
//! ## Modules
//!
//! - [`exception`]: the service-wide error enum and `Result` alias
//! - [`money`]: the [`Guaranies`](money::Guaranies) amount type
//! - [`enums`]: string-coded states and kinds persisted as text
//! - [`credit`]: negative balance decisions and debt settlement
//! - [`restrictions`]: dietary restriction matching
//! - [`promotions`]: promotion eligibility and discount computation
//! - [`commissions`]: payment method commission rates
//! - [`notifications`]: balance alert classification and throttling
//! - [`lunch`]: monthly lunch account helpers
//! - [`fiscal`]: document numbering, VAT breakdown and RUC check digits
//! - [`sales`]: sale invariants and payment state
//! - [`cash`]: cash session reconciliation

pub mod cash;
pub mod commissions;
pub mod credit;
pub mod enums;
pub mod exception;
pub mod fiscal;
pub mod lunch;
pub mod money;
pub mod notifications;
pub mod promotions;
pub mod restrictions;
pub mod sales;

pub use exception::{Error, Result};
pub use money::Guaranies;
