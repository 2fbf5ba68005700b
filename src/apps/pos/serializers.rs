use cantina_core::Guaranies;
use serde::Deserialize;
use validator::Validate;

use crate::services::sales::ItemInput;

#[derive(Debug, Deserialize, Validate)]
pub struct BalanceCheckRequest {
	#[validate(length(min = 1, max = 20))]
	pub card_number: String,
	pub amount: Guaranies,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RestrictionCheckRequest {
	pub student_id: i64,
	#[validate(length(min = 1, message = "must contain at least one product"))]
	pub product_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PromotionPreviewRequest {
	#[validate(length(min = 1, message = "must contain at least one item"))]
	pub items: Vec<ItemInput>,
	pub student_id: Option<i64>,
	pub promotion_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoidRequest {
	#[validate(length(min = 3, max = 500, message = "must explain why the sale is voided"))]
	pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreditPaymentRequest {
	pub payment_method_id: i64,
	pub amount: Guaranies,
	#[validate(length(max = 100))]
	pub reference: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RechargeRequest {
	#[validate(length(min = 1, max = 20))]
	pub card_number: String,
	pub amount: Guaranies,
	pub cash_session_id: Option<i64>,
	#[validate(length(max = 200))]
	pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SupervisorRequest {
	#[validate(length(min = 1))]
	pub username: String,
	#[validate(length(min = 1))]
	pub password: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case("ok", false)]
	#[case("Error de cobro", true)]
	fn test_void_reason_length(#[case] reason: &str, #[case] valid: bool) {
		let request: VoidRequest = serde_json::from_value(json!({"reason": reason})).unwrap();
		assert_eq!(request.validate().is_ok(), valid);
	}

	#[rstest]
	fn test_preview_needs_items() {
		let request: PromotionPreviewRequest = serde_json::from_value(json!({"items": []})).unwrap();
		assert!(request.validate().is_err());
	}
}
