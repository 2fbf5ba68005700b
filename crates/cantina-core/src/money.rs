//! Money in guaraníes.
//!
//! The guaraní has no fractional unit in circulation, so amounts are whole
//! numbers. Percent-based computations (discounts, commissions) go through
//! `rust_decimal` and round half away from zero back to whole guaraníes.
//!
//! The operators saturate at the `i64` bounds. Amounts that come from a
//! request go through the `checked_*` forms, which reject overflow as a
//! validation error.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::exception::{Error, Result};

/// A whole amount of guaraníes. May be negative (card debt, cash shortage).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Guaranies(pub i64);

impl Guaranies {
	pub const ZERO: Guaranies = Guaranies(0);

	pub fn new(amount: i64) -> Self {
		Self(amount)
	}

	pub fn value(self) -> i64 {
		self.0
	}

	pub fn is_negative(self) -> bool {
		self.0 < 0
	}

	pub fn is_positive(self) -> bool {
		self.0 > 0
	}

	pub fn abs(self) -> Self {
		Self(self.0.abs())
	}

	pub fn min(self, other: Self) -> Self {
		Self(self.0.min(other.0))
	}

	pub fn max(self, other: Self) -> Self {
		Self(self.0.max(other.0))
	}

	/// Multiplies a unit price by a quantity.
	pub fn times(self, quantity: i64) -> Self {
		Self(self.0.saturating_mul(quantity))
	}

	pub fn checked_add(self, rhs: Self) -> Result<Self> {
		self.0.checked_add(rhs.0).map(Self).ok_or_else(out_of_range)
	}

	pub fn checked_sub(self, rhs: Self) -> Result<Self> {
		self.0.checked_sub(rhs.0).map(Self).ok_or_else(out_of_range)
	}

	/// Multiplies a unit price by a quantity, rejecting overflow.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_core::Guaranies;
	///
	/// assert_eq!(Guaranies(4_500).checked_times(3).unwrap(), Guaranies(13_500));
	/// assert!(Guaranies(i64::MAX).checked_times(2).is_err());
	/// ```
	pub fn checked_times(self, quantity: i64) -> Result<Self> {
		self.0.checked_mul(quantity).map(Self).ok_or_else(out_of_range)
	}

	/// Adds up amounts, rejecting overflow.
	pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Result<Self> {
		amounts
			.into_iter()
			.try_fold(Self::ZERO, |total, amount| total.checked_add(amount))
	}

	/// Applies a percentage expressed in basis points (1 % = 100).
	///
	/// # Examples
	///
	/// ```
	/// use cantina_core::Guaranies;
	///
	/// // 3.5 % of 10 000
	/// assert_eq!(Guaranies(10_000).percent_bp(350), Guaranies(350));
	/// // 10 % of 12 345 rounds half away from zero
	/// assert_eq!(Guaranies(12_345).percent_bp(1_000), Guaranies(1_235));
	/// ```
	pub fn percent_bp(self, basis_points: i64) -> Self {
		let amount = Decimal::from(self.0) * Decimal::from(basis_points) / Decimal::from(10_000);
		Self(round_to_whole(amount))
	}

	/// Divides by `divisor` rounding half away from zero.
	pub fn div_round(self, divisor: i64) -> Self {
		if divisor == 0 {
			return Self::ZERO;
		}
		let amount = Decimal::from(self.0) / Decimal::from(divisor);
		Self(round_to_whole(amount))
	}
}

fn out_of_range() -> Error {
	Error::Validation("Amount is out of range".to_string())
}

fn round_to_whole(amount: Decimal) -> i64 {
	amount
		.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
		.to_i64()
		.unwrap_or(0)
}

/// Formats an amount the way receipts and notifications show it.
///
/// # Examples
///
/// ```
/// use cantina_core::money::format_guaranies;
///
/// assert_eq!(format_guaranies(1_234_567), "Gs. 1.234.567");
/// assert_eq!(format_guaranies(-1_500), "Gs. -1.500");
/// assert_eq!(format_guaranies(0), "Gs. 0");
/// ```
pub fn format_guaranies(amount: i64) -> String {
	format!("Gs. {}", group_thousands(amount))
}

/// Groups digits with a dot every three positions.
pub fn group_thousands(amount: i64) -> String {
	let digits = amount.unsigned_abs().to_string();
	let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
	for (i, ch) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			grouped.push('.');
		}
		grouped.push(ch);
	}
	if amount < 0 {
		format!("-{}", grouped)
	} else {
		grouped
	}
}

impl fmt::Display for Guaranies {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&format_guaranies(self.0))
	}
}

impl From<i64> for Guaranies {
	fn from(amount: i64) -> Self {
		Self(amount)
	}
}

impl From<Guaranies> for i64 {
	fn from(amount: Guaranies) -> Self {
		amount.0
	}
}

impl Add for Guaranies {
	type Output = Guaranies;

	fn add(self, rhs: Self) -> Self::Output {
		Guaranies(self.0.saturating_add(rhs.0))
	}
}

impl Sub for Guaranies {
	type Output = Guaranies;

	fn sub(self, rhs: Self) -> Self::Output {
		Guaranies(self.0.saturating_sub(rhs.0))
	}
}

impl AddAssign for Guaranies {
	fn add_assign(&mut self, rhs: Self) {
		self.0 = self.0.saturating_add(rhs.0);
	}
}

impl SubAssign for Guaranies {
	fn sub_assign(&mut self, rhs: Self) {
		self.0 = self.0.saturating_sub(rhs.0);
	}
}

impl Neg for Guaranies {
	type Output = Guaranies;

	fn neg(self) -> Self::Output {
		Guaranies(self.0.saturating_neg())
	}
}

impl Sum for Guaranies {
	fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
		iter.fold(Guaranies::ZERO, Add::add)
	}
}

impl<'a> Sum<&'a Guaranies> for Guaranies {
	fn sum<I: Iterator<Item = &'a Guaranies>>(iter: I) -> Self {
		iter.copied().sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(0, "Gs. 0")]
	#[case(999, "Gs. 999")]
	#[case(1_000, "Gs. 1.000")]
	#[case(25_500, "Gs. 25.500")]
	#[case(1_234_567, "Gs. 1.234.567")]
	#[case(-50_000, "Gs. -50.000")]
	fn test_display(#[case] amount: i64, #[case] expected: &str) {
		assert_eq!(Guaranies(amount).to_string(), expected);
	}

	#[rstest]
	#[case(100_000, 1_000, 10_000)]
	#[case(7_500, 250, 188)]
	#[case(7_500, 0, 0)]
	#[case(-20_000, 500, -1_000)]
	fn test_percent_bp(#[case] amount: i64, #[case] bp: i64, #[case] expected: i64) {
		assert_eq!(Guaranies(amount).percent_bp(bp), Guaranies(expected));
	}

	#[rstest]
	fn test_div_round() {
		// VAT 10 % included: 11 000 / 11
		assert_eq!(Guaranies(11_000).div_round(11), Guaranies(1_000));
		// 10 500 / 21 = 500
		assert_eq!(Guaranies(10_500).div_round(21), Guaranies(500));
		// 1 000 / 11 = 90.9 -> 91
		assert_eq!(Guaranies(1_000).div_round(11), Guaranies(91));
		assert_eq!(Guaranies(1_000).div_round(0), Guaranies::ZERO);
	}

	#[rstest]
	fn test_arithmetic() {
		let mut balance = Guaranies(10_000);
		balance -= Guaranies(15_000);
		assert!(balance.is_negative());
		balance += Guaranies(5_000);
		assert_eq!(balance, Guaranies::ZERO);

		let total: Guaranies = [Guaranies(1_000), Guaranies(2_500)].iter().sum();
		assert_eq!(total, Guaranies(3_500));
		assert_eq!(Guaranies(3_000).times(4), Guaranies(12_000));
		assert_eq!(-Guaranies(3), Guaranies(-3));
	}

	#[rstest]
	fn test_checked_arithmetic_rejects_overflow() {
		assert_eq!(Guaranies(1_000).checked_add(Guaranies(500)).unwrap(), Guaranies(1_500));
		assert!(matches!(
			Guaranies(i64::MAX).checked_add(Guaranies(1)),
			Err(Error::Validation(_))
		));
		assert!(Guaranies(i64::MIN).checked_sub(Guaranies(1)).is_err());
		assert!(Guaranies(i64::MAX / 2).checked_times(3).is_err());
		assert!(Guaranies::checked_sum([Guaranies(i64::MAX), Guaranies(1)]).is_err());
		assert_eq!(
			Guaranies::checked_sum([Guaranies(1_000), Guaranies(2_000)]).unwrap(),
			Guaranies(3_000)
		);
	}

	#[rstest]
	fn test_operators_saturate() {
		assert_eq!(Guaranies(i64::MAX) + Guaranies(1), Guaranies(i64::MAX));
		assert_eq!(Guaranies(i64::MAX).times(2), Guaranies(i64::MAX));
		let total: Guaranies = [Guaranies(i64::MAX), Guaranies(5)].iter().sum();
		assert_eq!(total, Guaranies(i64::MAX));
	}

	#[rstest]
	fn test_serde_is_plain_number() {
		let json = serde_json::to_string(&Guaranies(15_000)).unwrap();
		assert_eq!(json, "15000");
		let back: Guaranies = serde_json::from_str("-250").unwrap();
		assert_eq!(back, Guaranies(-250));
	}
}
