//! Card payloads.

use cantina_core::Guaranies;
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct IssueCardRequest {
	pub student_id: i64,
	#[validate(length(min = 1, max = 20, message = "must be between 1 and 20 characters"))]
	pub card_number: String,
	pub expires_on: Option<NaiveDate>,
	pub alert_threshold: Option<Guaranies>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreditPolicyRequest {
	pub allows_negative: bool,
	#[serde(default)]
	pub credit_limit: Guaranies,
}

/// `null` restores the default threshold.
#[derive(Debug, Deserialize, Validate)]
pub struct AlertThresholdRequest {
	pub alert_threshold: Option<Guaranies>,
}
