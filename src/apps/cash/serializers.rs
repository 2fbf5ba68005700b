use cantina_core::Guaranies;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
	#[validate(length(min = 1, max = 50, message = "is required"))]
	pub name: String,
	#[validate(length(max = 100))]
	pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
	pub register_id: i64,
	#[serde(default)]
	pub opening_amount: Guaranies,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CloseSessionRequest {
	pub counted_amount: Guaranies,
	#[validate(length(max = 500))]
	pub notes: Option<String>,
}
