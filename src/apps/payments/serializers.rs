//! Payment method payloads.

use cantina_core::Guaranies;
use cantina_core::enums::PaymentMethodKind;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentMethodRequest {
	#[validate(length(min = 1, max = 50, message = "is required"))]
	pub name: String,
	pub kind: PaymentMethodKind,
	#[serde(default)]
	pub generates_commission: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ActiveRequest {
	pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommissionRateRequest {
	/// Percentage in basis points: 350 is 3.5 %.
	#[validate(range(min = 0, max = 10_000, message = "must be between 0 and 10000"))]
	pub basis_points: i64,
	#[serde(default)]
	pub fixed_amount: Guaranies,
	/// Now when absent.
	pub valid_from: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(350, true)]
	#[case(10_000, true)]
	#[case(10_001, false)]
	#[case(-1, false)]
	fn test_basis_points_range(#[case] basis_points: i64, #[case] valid: bool) {
		let request = CommissionRateRequest {
			basis_points,
			fixed_amount: Guaranies::default(),
			valid_from: None,
		};
		assert_eq!(request.validate().is_ok(), valid);
	}
}
