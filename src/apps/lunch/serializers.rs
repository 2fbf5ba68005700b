use cantina_core::Guaranies;
use cantina_core::enums::LunchPaymentMethod;
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LunchTypeRequest {
	#[validate(length(min = 1, max = 100, message = "is required"))]
	pub name: String,
	#[validate(length(min = 1, max = 200, message = "is required"))]
	pub main_course: String,
	#[serde(default)]
	pub includes_dessert: bool,
	#[serde(default)]
	pub includes_drink: bool,
	pub price: Guaranies,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlanRequest {
	#[validate(length(min = 1, max = 100, message = "is required"))]
	pub name: String,
	pub lunch_type_id: i64,
	#[validate(range(min = 1, max = 7))]
	pub days_per_week: i64,
	pub monthly_price: Guaranies,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscriptionRequest {
	pub student_id: i64,
	pub plan_id: i64,
	/// Today when absent.
	pub start_date: Option<NaiveDate>,
	pub end_date: Option<NaiveDate>,
}

/// Body of the generate endpoints: `{"month": "2026-03"}`.
#[derive(Debug, Deserialize, Validate)]
pub struct MonthRequest {
	#[validate(length(equal = 7, message = "must look like YYYY-MM"))]
	pub month: String,
}

#[derive(Debug, Deserialize)]
pub struct FeePaymentRequest {
	pub method: LunchPaymentMethod,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AccountPaymentRequest {
	pub amount: Guaranies,
	pub method: LunchPaymentMethod,
	#[validate(length(max = 100))]
	pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case("2026-03", true)]
	#[case("2026-3", false)]
	#[case("marzo", false)]
	fn test_month_shape(#[case] month: &str, #[case] valid: bool) {
		let request: MonthRequest = serde_json::from_value(json!({"month": month})).unwrap();
		assert_eq!(request.validate().is_ok(), valid);
	}

	#[rstest]
	fn test_unknown_payment_method_is_rejected() {
		let result = serde_json::from_value::<FeePaymentRequest>(json!({"method": "BARTER"}));
		assert!(result.is_err());
	}
}
