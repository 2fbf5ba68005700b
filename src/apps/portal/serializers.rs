use cantina_core::Guaranies;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct PortalRechargeRequest {
	#[validate(length(min = 1, max = 20))]
	pub card_number: String,
	pub amount: Guaranies,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
	pub alert_threshold: Option<Guaranies>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordChangeRequest {
	#[validate(length(min = 1, message = "is required"))]
	pub current_password: String,
	#[validate(length(min = 8, message = "must be at least 8 characters"))]
	pub new_password: String,
}
