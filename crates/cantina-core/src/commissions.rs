//! Payment method commissions.
//!
//! Card processors and wallets charge a percentage plus a fixed fee per
//! transaction. Rates change over time, so each payment uses the rate that was
//! in force at the moment it was taken.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::money::Guaranies;

/// A commission rate with its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionRate {
	pub id: i64,
	pub basis_points: i64,
	pub fixed_amount: Guaranies,
	pub valid_from: DateTime<Utc>,
	pub valid_until: Option<DateTime<Utc>>,
}

impl CommissionRate {
	pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
		self.valid_from <= at && self.valid_until.is_none_or(|until| until >= at)
	}

	/// Commission charged on `amount`.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_core::commissions::CommissionRate;
	/// use cantina_core::Guaranies;
	/// use chrono::Utc;
	///
	/// let rate = CommissionRate {
	///     id: 1,
	///     basis_points: 350,
	///     fixed_amount: Guaranies(500),
	///     valid_from: Utc::now(),
	///     valid_until: None,
	/// };
	/// assert_eq!(rate.commission_on(Guaranies(100_000)), Guaranies(4_000));
	/// ```
	pub fn commission_on(&self, amount: Guaranies) -> Guaranies {
		amount.percent_bp(self.basis_points) + self.fixed_amount
	}
}

/// The most recent rate in force at `at`.
pub fn current_rate(rates: &[CommissionRate], at: DateTime<Utc>) -> Option<&CommissionRate> {
	rates
		.iter()
		.filter(|rate| rate.is_valid_at(at))
		.max_by_key(|rate| (rate.valid_from, rate.id))
}

/// A computed commission for one payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommissionLine {
	pub rate_id: i64,
	pub amount: Guaranies,
	pub basis_points: i64,
	pub fixed_amount: Guaranies,
	pub commission: Guaranies,
}

/// Computes the commission of a payment, if its method charges one and a rate
/// is in force.
pub fn commission_for(
	generates_commission: bool,
	rates: &[CommissionRate],
	amount: Guaranies,
	at: DateTime<Utc>,
) -> Option<CommissionLine> {
	if !generates_commission || !amount.is_positive() {
		return None;
	}
	let rate = current_rate(rates, at)?;
	Some(CommissionLine {
		rate_id: rate.id,
		amount,
		basis_points: rate.basis_points,
		fixed_amount: rate.fixed_amount,
		commission: rate.commission_on(amount),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Duration, TimeZone};
	use rstest::rstest;

	fn at(day: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
	}

	fn rates() -> Vec<CommissionRate> {
		vec![
			CommissionRate {
				id: 1,
				basis_points: 300,
				fixed_amount: Guaranies::ZERO,
				valid_from: at(1),
				valid_until: Some(at(10)),
			},
			CommissionRate {
				id: 2,
				basis_points: 450,
				fixed_amount: Guaranies(200),
				valid_from: at(5),
				valid_until: None,
			},
		]
	}

	#[rstest]
	#[case(at(3), Some(1))]
	#[case(at(5), Some(2))]
	#[case(at(20), Some(2))]
	#[case(at(1) - Duration::seconds(1), None)]
	fn test_current_rate(#[case] when: DateTime<Utc>, #[case] expected: Option<i64>) {
		let rates = rates();
		assert_eq!(current_rate(&rates, when).map(|r| r.id), expected);
	}

	#[rstest]
	fn test_commission_for_payment() {
		let rates = rates();
		let line = commission_for(true, &rates, Guaranies(50_000), at(20)).unwrap();
		assert_eq!(line.rate_id, 2);
		// 4.5 % of 50 000 + 200
		assert_eq!(line.commission, Guaranies(2_450));
	}

	#[rstest]
	fn test_no_commission_for_cash() {
		let rates = rates();
		assert!(commission_for(false, &rates, Guaranies(50_000), at(20)).is_none());
		assert!(commission_for(true, &[], Guaranies(50_000), at(20)).is_none());
	}
}
