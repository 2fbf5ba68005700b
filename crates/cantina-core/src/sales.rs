//! Sale invariants.
//!
//! A sale is consistent when its pending balance lies between zero and the
//! total, its payment state agrees with the pending balance, and credit sales
//! name the employee who authorized them.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::enums::{PaymentState, SaleKind};
use crate::exception::{Error, Result};
use crate::money::Guaranies;

/// The fields the invariants are checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleSnapshot {
	pub kind: SaleKind,
	pub total: Guaranies,
	pub pending: Guaranies,
	pub payment_state: PaymentState,
	pub authorized_by: Option<i64>,
}

/// Payment state implied by a total and a pending balance.
pub fn payment_state_for(total: Guaranies, pending: Guaranies) -> PaymentState {
	if pending == Guaranies::ZERO {
		PaymentState::Paid
	} else if pending == total {
		PaymentState::Pending
	} else {
		PaymentState::Partial
	}
}

/// Validates the sale invariants.
///
/// # Examples
///
/// ```
/// use cantina_core::enums::{PaymentState, SaleKind};
/// use cantina_core::sales::{validate_sale, SaleSnapshot};
/// use cantina_core::Guaranies;
///
/// let sale = SaleSnapshot {
///     kind: SaleKind::Credit,
///     total: Guaranies(30_000),
///     pending: Guaranies(10_000),
///     payment_state: PaymentState::Partial,
///     authorized_by: Some(2),
/// };
/// assert!(validate_sale(&sale).is_ok());
/// ```
pub fn validate_sale(sale: &SaleSnapshot) -> Result<()> {
	if sale.total.is_negative() {
		return Err(Error::Validation("Sale total cannot be negative".to_string()));
	}
	if sale.pending.is_negative() {
		return Err(Error::Validation("Pending balance cannot be negative".to_string()));
	}
	if sale.pending > sale.total {
		return Err(Error::Validation(format!(
			"Pending balance {} exceeds sale total {}",
			sale.pending, sale.total
		)));
	}
	match sale.payment_state {
		PaymentState::Paid if sale.pending != Guaranies::ZERO => {
			return Err(Error::Validation(
				"A paid sale cannot have a pending balance".to_string(),
			));
		}
		PaymentState::Pending if sale.pending != sale.total => {
			return Err(Error::Validation(
				"A pending sale must have its whole total pending".to_string(),
			));
		}
		PaymentState::Partial if sale.pending == Guaranies::ZERO || sale.pending == sale.total => {
			return Err(Error::Validation(
				"A partially paid sale must have part of its total pending".to_string(),
			));
		}
		_ => {}
	}
	if sale.kind == SaleKind::Credit && sale.authorized_by.is_none() {
		return Err(Error::Validation(
			"Credit sales require an authorizing employee".to_string(),
		));
	}
	Ok(())
}

/// Checks a line and returns its subtotal.
pub fn line_subtotal(quantity: i64, unit_price: Guaranies) -> Result<Guaranies> {
	if quantity <= 0 {
		return Err(Error::Validation("Quantity must be greater than zero".to_string()));
	}
	if !unit_price.is_positive() {
		return Err(Error::Validation("Unit price must be greater than zero".to_string()));
	}
	unit_price.checked_times(quantity)
}

/// Checks that the payments of a sale add up under its kind, returning the
/// pending balance.
pub fn pending_after_payments(kind: SaleKind, total: Guaranies, paid: Guaranies) -> Result<Guaranies> {
	if paid.is_negative() {
		return Err(Error::Validation("Payments cannot be negative".to_string()));
	}
	match kind {
		SaleKind::Cash if paid != total => Err(Error::Validation(format!(
			"Payments ({}) must equal the sale total ({})",
			paid, total
		))),
		SaleKind::Credit if paid > total => Err(Error::Validation(format!(
			"Payments ({}) exceed the sale total ({})",
			paid, total
		))),
		_ => Ok(total - paid),
	}
}

/// Checks a quantity taken back on a credit note against what the sale sold
/// and what earlier notes already returned.
pub fn check_returnable(sold: i64, already_returned: i64, requested: i64) -> Result<()> {
	if requested <= 0 {
		return Err(Error::Validation("Returned quantity must be greater than zero".to_string()));
	}
	let left = sold.saturating_sub(already_returned).max(0);
	if requested > left {
		return Err(Error::BusinessRule(format!(
			"Only {} of {} units are left to return",
			left, sold
		)));
	}
	Ok(())
}

/// Share of a credit note that settles the open balance of its sale.
///
/// ```
/// use cantina_core::sales::credit_applied;
/// use cantina_core::Guaranies;
///
/// assert_eq!(credit_applied(Guaranies(8_000), Guaranies(5_000)), Guaranies(5_000));
/// assert_eq!(credit_applied(Guaranies(3_000), Guaranies(5_000)), Guaranies(3_000));
/// assert_eq!(credit_applied(Guaranies::ZERO, Guaranies(5_000)), Guaranies::ZERO);
/// ```
pub fn credit_applied(pending: Guaranies, note_total: Guaranies) -> Guaranies {
	pending.min(note_total).max(Guaranies::ZERO)
}

/// Percentage of the total already paid, with two decimals.
pub fn paid_percentage(total: Guaranies, pending: Guaranies) -> f64 {
	if !total.is_positive() {
		return 100.0;
	}
	let paid = Decimal::from((total - pending).value());
	let pct = paid * Decimal::from(100) / Decimal::from(total.value());
	pct.round_dp(2).to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn snapshot(kind: SaleKind, total: i64, pending: i64, state: PaymentState) -> SaleSnapshot {
		SaleSnapshot {
			kind,
			total: Guaranies(total),
			pending: Guaranies(pending),
			payment_state: state,
			authorized_by: None,
		}
	}

	#[rstest]
	#[case(100, 0, PaymentState::Paid)]
	#[case(100, 100, PaymentState::Pending)]
	#[case(100, 40, PaymentState::Partial)]
	#[case(0, 0, PaymentState::Paid)]
	fn test_payment_state_for(#[case] total: i64, #[case] pending: i64, #[case] expected: PaymentState) {
		assert_eq!(payment_state_for(Guaranies(total), Guaranies(pending)), expected);
	}

	#[rstest]
	fn test_pending_above_total_is_rejected() {
		let sale = snapshot(SaleKind::Cash, 10_000, 12_000, PaymentState::Partial);
		assert!(validate_sale(&sale).is_err());
	}

	#[rstest]
	#[case(PaymentState::Paid, 5_000)]
	#[case(PaymentState::Pending, 5_000)]
	#[case(PaymentState::Partial, 0)]
	fn test_inconsistent_states(#[case] state: PaymentState, #[case] pending: i64) {
		let sale = snapshot(SaleKind::Cash, 10_000, pending, state);
		assert!(validate_sale(&sale).is_err());
	}

	#[rstest]
	fn test_credit_requires_authorizer() {
		let mut sale = snapshot(SaleKind::Credit, 10_000, 10_000, PaymentState::Pending);
		assert!(validate_sale(&sale).is_err());
		sale.authorized_by = Some(3);
		assert!(validate_sale(&sale).is_ok());
	}

	#[rstest]
	fn test_line_subtotal() {
		assert_eq!(line_subtotal(3, Guaranies(4_500)).unwrap(), Guaranies(13_500));
		assert!(line_subtotal(0, Guaranies(4_500)).is_err());
		assert!(line_subtotal(1, Guaranies(0)).is_err());
		assert!(matches!(
			line_subtotal(i64::MAX, Guaranies(4_500)),
			Err(Error::Validation(_))
		));
	}

	#[rstest]
	#[case(5, 0, 5, true)]
	#[case(5, 3, 2, true)]
	#[case(5, 3, 3, false)]
	#[case(5, 0, 0, false)]
	#[case(2, 4, 1, false)]
	fn test_check_returnable(#[case] sold: i64, #[case] returned: i64, #[case] requested: i64, #[case] ok: bool) {
		assert_eq!(check_returnable(sold, returned, requested).is_ok(), ok);
	}

	#[rstest]
	fn test_over_return_is_business_rule() {
		let err = check_returnable(3, 1, 5).unwrap_err();
		assert_eq!(err.to_string(), "Only 2 of 3 units are left to return");
	}

	#[rstest]
	fn test_pending_after_payments() {
		assert_eq!(
			pending_after_payments(SaleKind::Cash, Guaranies(20_000), Guaranies(20_000)).unwrap(),
			Guaranies::ZERO
		);
		assert!(pending_after_payments(SaleKind::Cash, Guaranies(20_000), Guaranies(15_000)).is_err());
		assert_eq!(
			pending_after_payments(SaleKind::Credit, Guaranies(20_000), Guaranies(5_000)).unwrap(),
			Guaranies(15_000)
		);
		assert!(pending_after_payments(SaleKind::Credit, Guaranies(20_000), Guaranies(25_000)).is_err());
	}

	#[rstest]
	fn test_paid_percentage() {
		assert_eq!(paid_percentage(Guaranies(30_000), Guaranies(20_000)), 33.33);
		assert_eq!(paid_percentage(Guaranies(30_000), Guaranies::ZERO), 100.0);
		assert_eq!(paid_percentage(Guaranies::ZERO, Guaranies::ZERO), 100.0);
	}
}
