//! Staff payloads.

use cantina_core::enums::Role;
use cantina_db::repositories::accounts::EmployeeChanges;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct EmployeeUpdateRequest {
	#[validate(length(min = 1, message = "cannot be empty"))]
	pub first_name: Option<String>,
	#[validate(length(min = 1, message = "cannot be empty"))]
	pub last_name: Option<String>,
	pub role: Option<Role>,
	pub active: Option<bool>,
}

impl From<EmployeeUpdateRequest> for EmployeeChanges {
	fn from(data: EmployeeUpdateRequest) -> Self {
		EmployeeChanges {
			first_name: data.first_name,
			last_name: data.last_name,
			role: data.role,
			active: data.active,
		}
	}
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
	pub password: String,
}
