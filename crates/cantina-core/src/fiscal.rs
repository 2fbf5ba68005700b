//! Invoicing rules for Paraguay.
//!
//! Invoices are numbered inside a stamp (timbrado) issued by the tax authority
//! for an establishment and expedition point. Prices include VAT, so the tax
//! is extracted from the taxed totals: 10 % VAT is a eleventh of the amount,
//! 5 % VAT a twenty-first.

use chrono::NaiveDate;
use serde::Serialize;

use crate::exception::{Error, Result};
use crate::money::Guaranies;

/// Formats an invoice number as `EEE-PPP-NNNNNNN`.
///
/// # Examples
///
/// ```
/// use cantina_core::fiscal::format_document_number;
///
/// assert_eq!(format_document_number("001", "002", 123), "001-002-0000123");
/// ```
pub fn format_document_number(establishment: &str, point: &str, number: i64) -> String {
	format!("{}-{}-{:07}", establishment, point, number)
}

/// Numbering state of a stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampWindow {
	pub valid_from: NaiveDate,
	pub valid_until: NaiveDate,
	pub next_number: i64,
	pub last_number: i64,
	pub active: bool,
}

impl StampWindow {
	pub fn is_usable_on(&self, date: NaiveDate) -> bool {
		self.active && self.valid_from <= date && date <= self.valid_until && self.next_number <= self.last_number
	}

	/// Reason a stamp cannot issue on `date`, if any.
	pub fn check(&self, date: NaiveDate) -> Result<()> {
		if !self.active {
			return Err(Error::BusinessRule("Stamp is inactive".to_string()));
		}
		if date < self.valid_from || date > self.valid_until {
			return Err(Error::BusinessRule(format!(
				"Stamp is only valid from {} to {}",
				self.valid_from, self.valid_until
			)));
		}
		if self.next_number > self.last_number {
			return Err(Error::BusinessRule("Stamp number range is exhausted".to_string()));
		}
		Ok(())
	}
}

/// VAT rates a product can carry.
pub const VAT_RATES: [i64; 3] = [0, 5, 10];

pub fn validate_vat_rate(rate: i64) -> Result<i64> {
	if VAT_RATES.contains(&rate) {
		Ok(rate)
	} else {
		Err(Error::Validation(format!("VAT rate must be 0, 5 or 10, got {}", rate)))
	}
}

/// Taxed totals of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VatBreakdown {
	pub exempt: Guaranies,
	pub taxed_5: Guaranies,
	pub vat_5: Guaranies,
	pub taxed_10: Guaranies,
	pub vat_10: Guaranies,
}

impl VatBreakdown {
	pub fn total(&self) -> Guaranies {
		self.exempt + self.taxed_5 + self.taxed_10
	}

	pub fn total_vat(&self) -> Guaranies {
		self.vat_5 + self.vat_10
	}
}

/// Splits `(vat_rate, amount)` lines into taxed totals after a sale-level
/// discount.
///
/// The discount is spread across the rate buckets in proportion to their
/// amounts; the rounding remainder goes to the largest bucket.
pub fn vat_breakdown(lines: &[(i64, Guaranies)], discount: Guaranies) -> VatBreakdown {
	// exempt, 5 %, 10 %
	let mut buckets = [Guaranies::ZERO; 3];
	for (rate, amount) in lines {
		let index = match rate {
			5 => 1,
			10 => 2,
			_ => 0,
		};
		buckets[index] += *amount;
	}

	let subtotal: Guaranies = buckets.iter().sum();
	let discount = discount.max(Guaranies::ZERO).min(subtotal);
	if discount.is_positive() && subtotal.is_positive() {
		let mut allocated = [Guaranies::ZERO; 3];
		for (share, bucket) in allocated.iter_mut().zip(buckets.iter()) {
			let share_value = i128::from(discount.value()) * i128::from(bucket.value()) / i128::from(subtotal.value());
			*share = Guaranies(i64::try_from(share_value).unwrap_or(0));
		}
		let remainder = discount - allocated.iter().sum::<Guaranies>();
		let largest = (0..3).max_by_key(|i| (buckets[*i], *i)).unwrap_or(0);
		allocated[largest] += remainder;
		for (bucket, share) in buckets.iter_mut().zip(allocated.iter()) {
			*bucket -= *share;
		}
	}

	VatBreakdown {
		exempt: buckets[0],
		taxed_5: buckets[1],
		vat_5: buckets[1].div_round(21),
		taxed_10: buckets[2],
		vat_10: buckets[2].div_round(11),
	}
}

/// Check digit of a RUC (taxpayer id) without its verifier.
///
/// # Examples
///
/// ```
/// use cantina_core::fiscal::ruc_check_digit;
///
/// assert_eq!(ruc_check_digit("80012345").unwrap(), 8);
/// ```
pub fn ruc_check_digit(base: &str) -> Result<u8> {
	let digits = base.trim().replace(['-', '.'], "");
	if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
		return Err(Error::Validation(format!("Invalid RUC '{}'", base)));
	}
	const WEIGHTS: [u32; 3] = [7, 3, 1];
	let sum: u32 = digits
		.chars()
		.rev()
		.enumerate()
		.map(|(i, c)| c.to_digit(10).unwrap_or(0) * WEIGHTS[i % 3])
		.sum();
	let digit = match 11 - sum % 11 {
		11 => 0,
		10 => 9,
		other => other,
	};
	Ok(digit as u8)
}

/// Validates a RUC written as `base-digit`.
pub fn validate_ruc(ruc: &str) -> Result<()> {
	let (base, digit) = ruc
		.trim()
		.rsplit_once('-')
		.ok_or_else(|| Error::Validation(format!("RUC '{}' must be written as base-digit", ruc)))?;
	let expected = ruc_check_digit(base)?;
	match digit.parse::<u8>() {
		Ok(given) if given == expected => Ok(()),
		_ => Err(Error::Validation(format!(
			"Invalid RUC '{}': check digit should be {}",
			ruc, expected
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn date(y: i32, m: u32, d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(y, m, d).unwrap()
	}

	#[rstest]
	#[case("80012345", 8)]
	#[case("1234567", 3)]
	#[case("4444440", 0)]
	#[case("1000007", 9)]
	#[case("8.001.234", 8)]
	fn test_ruc_check_digit(#[case] base: &str, #[case] expected: u8) {
		assert_eq!(ruc_check_digit(base).unwrap(), expected);
	}

	#[rstest]
	fn test_validate_ruc() {
		assert!(validate_ruc("80012345-8").is_ok());
		assert!(validate_ruc("80012345-1").is_err());
		assert!(validate_ruc("80012345").is_err());
		assert!(validate_ruc("ABC-1").is_err());
	}

	#[rstest]
	fn test_breakdown_without_discount() {
		let lines = [(10, Guaranies(22_000)), (5, Guaranies(10_500)), (0, Guaranies(5_000))];
		let breakdown = vat_breakdown(&lines, Guaranies::ZERO);
		assert_eq!(breakdown.taxed_10, Guaranies(22_000));
		assert_eq!(breakdown.vat_10, Guaranies(2_000));
		assert_eq!(breakdown.taxed_5, Guaranies(10_500));
		assert_eq!(breakdown.vat_5, Guaranies(500));
		assert_eq!(breakdown.exempt, Guaranies(5_000));
		assert_eq!(breakdown.total(), Guaranies(37_500));
	}

	#[rstest]
	fn test_breakdown_spreads_discount() {
		let lines = [(10, Guaranies(22_000)), (5, Guaranies(10_500)), (0, Guaranies(5_000))];
		let breakdown = vat_breakdown(&lines, Guaranies(3_750));
		assert_eq!(breakdown.taxed_10, Guaranies(19_800));
		assert_eq!(breakdown.vat_10, Guaranies(1_800));
		assert_eq!(breakdown.taxed_5, Guaranies(9_450));
		assert_eq!(breakdown.vat_5, Guaranies(450));
		assert_eq!(breakdown.exempt, Guaranies(4_500));
	}

	#[rstest]
	fn test_breakdown_remainder_goes_to_largest_bucket() {
		let lines = [(10, Guaranies(2_000)), (5, Guaranies(1_000))];
		let breakdown = vat_breakdown(&lines, Guaranies(1_000));
		assert_eq!(breakdown.taxed_10, Guaranies(1_333));
		assert_eq!(breakdown.taxed_5, Guaranies(667));
		assert_eq!(breakdown.total(), Guaranies(2_000));
		assert_eq!(breakdown.vat_10, Guaranies(121));
		assert_eq!(breakdown.vat_5, Guaranies(32));
	}

	#[rstest]
	fn test_stamp_window() {
		let stamp = StampWindow {
			valid_from: date(2026, 1, 1),
			valid_until: date(2026, 12, 31),
			next_number: 150,
			last_number: 150,
			active: true,
		};
		assert!(stamp.is_usable_on(date(2026, 6, 1)));
		assert!(stamp.check(date(2027, 1, 1)).is_err());

		let exhausted = StampWindow {
			next_number: 151,
			..stamp
		};
		assert!(!exhausted.is_usable_on(date(2026, 6, 1)));
		assert!(matches!(exhausted.check(date(2026, 6, 1)), Err(Error::BusinessRule(_))));
	}

	#[rstest]
	#[case(0, true)]
	#[case(5, true)]
	#[case(10, true)]
	#[case(12, false)]
	fn test_vat_rates(#[case] rate: i64, #[case] ok: bool) {
		assert_eq!(validate_vat_rate(rate).is_ok(), ok);
	}
}
