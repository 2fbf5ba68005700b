//! Negative balance rules.
//!
//! A card may go below zero only when it was configured to allow it, only up
//! to its credit limit, and only with a supervisor's authorization. Recharges
//! pay the debt back first; outstanding authorizations are considered settled
//! once the balance is back at zero or above.

use serde::{Deserialize, Serialize};

use crate::enums::Role;
use crate::exception::{Error, Result};
use crate::money::Guaranies;

/// Minimum length of the reason a supervisor gives when authorizing.
pub const MIN_AUTHORIZATION_REASON: usize = 10;

/// Credit configuration of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditPolicy {
	pub balance: Guaranies,
	pub allows_negative: bool,
	pub credit_limit: Guaranies,
}

/// Outcome of checking whether a card can cover an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditDecision {
	/// The balance covers the amount.
	Sufficient { resulting: Guaranies },
	/// The card may go negative but a supervisor must authorize it.
	RequiresAuthorization {
		resulting: Guaranies,
		shortfall: Guaranies,
	},
	/// The card cannot cover the amount.
	Denied { resulting: Guaranies, reason: String },
}

impl CreditDecision {
	pub fn resulting(&self) -> Guaranies {
		match self {
			CreditDecision::Sufficient { resulting }
			| CreditDecision::RequiresAuthorization { resulting, .. }
			| CreditDecision::Denied { resulting, .. } => *resulting,
		}
	}

	pub fn message(&self) -> String {
		match self {
			CreditDecision::Sufficient { .. } => "Sufficient balance".to_string(),
			CreditDecision::RequiresAuthorization { shortfall, .. } => {
				format!("Requires supervisor authorization (shortfall {})", shortfall)
			}
			CreditDecision::Denied { reason, .. } => reason.clone(),
		}
	}

	/// What the cashier can do next.
	pub fn options(&self) -> Vec<CheckoutOption> {
		match self {
			CreditDecision::Sufficient { .. } => vec![CheckoutOption::Continue],
			CreditDecision::RequiresAuthorization { .. } => vec![
				CheckoutOption::Recharge,
				CheckoutOption::ReduceItems,
				CheckoutOption::Authorize,
				CheckoutOption::Cancel,
			],
			CreditDecision::Denied { .. } => vec![
				CheckoutOption::Recharge,
				CheckoutOption::ReduceItems,
				CheckoutOption::Cancel,
			],
		}
	}
}

/// Choices offered at the register after a balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutOption {
	Continue,
	Recharge,
	ReduceItems,
	Authorize,
	Cancel,
}

/// Decides whether a card can be debited `amount`.
///
/// # Examples
///
/// ```
/// use cantina_core::credit::{validate_credit_limit, CreditDecision, CreditPolicy};
/// use cantina_core::Guaranies;
///
/// let policy = CreditPolicy {
///     balance: Guaranies(5_000),
///     allows_negative: true,
///     credit_limit: Guaranies(20_000),
/// };
/// let decision = validate_credit_limit(&policy, Guaranies(15_000));
/// assert_eq!(
///     decision,
///     CreditDecision::RequiresAuthorization {
///         resulting: Guaranies(-10_000),
///         shortfall: Guaranies(10_000),
///     }
/// );
/// ```
pub fn validate_credit_limit(policy: &CreditPolicy, amount: Guaranies) -> CreditDecision {
	let resulting = policy.balance - amount;
	if !resulting.is_negative() {
		return CreditDecision::Sufficient { resulting };
	}
	if !policy.allows_negative {
		return CreditDecision::Denied {
			resulting,
			reason: format!(
				"Insufficient balance: card has {} and does not allow negative balance",
				policy.balance
			),
		};
	}
	let debt = -resulting;
	if debt > policy.credit_limit {
		return CreditDecision::Denied {
			resulting,
			reason: format!(
				"Credit limit exceeded: resulting debt {} is above the limit of {}",
				debt, policy.credit_limit
			),
		};
	}
	// Only the part not covered by the current balance is new debt
	let shortfall = debt.min(amount);
	CreditDecision::RequiresAuthorization { resulting, shortfall }
}

/// Whether an employee may authorize a negative balance.
pub fn can_authorize_negative(role: Role, active: bool) -> bool {
	active && role.includes(Role::Manager)
}

/// Checks the reason a supervisor typed when authorizing.
pub fn validate_authorization_reason(reason: &str) -> Result<&str> {
	let trimmed = reason.trim();
	if trimmed.chars().count() < MIN_AUTHORIZATION_REASON {
		return Err(Error::Validation(format!(
			"Authorization reason must have at least {} characters",
			MIN_AUTHORIZATION_REASON
		)));
	}
	Ok(trimmed)
}

/// Effect of crediting a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RechargeOutcome {
	pub previous: Guaranies,
	pub new_balance: Guaranies,
	/// Part of the recharge that went to paying existing debt.
	pub debt_paid: Guaranies,
	/// The card was in debt and is no longer.
	pub debt_settled: bool,
}

/// Credits `amount` to a card balance, paying debt first.
///
/// # Examples
///
/// ```
/// use cantina_core::credit::apply_recharge;
/// use cantina_core::Guaranies;
///
/// let outcome = apply_recharge(Guaranies(-8_000), Guaranies(10_000)).unwrap();
/// assert_eq!(outcome.new_balance, Guaranies(2_000));
/// assert_eq!(outcome.debt_paid, Guaranies(8_000));
/// assert!(outcome.debt_settled);
/// ```
pub fn apply_recharge(balance: Guaranies, amount: Guaranies) -> Result<RechargeOutcome> {
	if !amount.is_positive() {
		return Err(Error::Validation("Recharge amount must be greater than zero".to_string()));
	}
	let new_balance = balance.checked_add(amount)?;
	let debt_paid = if balance.is_negative() {
		amount.min(-balance)
	} else {
		Guaranies::ZERO
	};
	Ok(RechargeOutcome {
		previous: balance,
		new_balance,
		debt_paid,
		debt_settled: balance.is_negative() && !new_balance.is_negative(),
	})
}

/// Authorizations stay open until the balance is back at zero or above.
pub fn settles_authorizations(new_balance: Guaranies) -> bool {
	!new_balance.is_negative()
}
