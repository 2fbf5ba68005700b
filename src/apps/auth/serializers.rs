//! Login and password recovery payloads.

use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct EmployeeLoginRequest {
	#[validate(length(min = 1, message = "Username cannot be empty"))]
	pub username: String,
	#[validate(length(min = 1, message = "Password cannot be empty"))]
	pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GuardianLoginRequest {
	#[validate(email(message = "Invalid email format"))]
	pub email: String,
	#[validate(length(min = 1, message = "Password cannot be empty"))]
	pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
	#[validate(email(message = "Invalid email format"))]
	pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirm {
	#[validate(length(min = 1, message = "Token cannot be empty"))]
	pub token: String,
	#[validate(length(min = 1, message = "Password cannot be empty"))]
	pub password: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("familia@example.com", true)]
	#[case("not-an-email", false)]
	fn test_guardian_login_email(#[case] email: &str, #[case] valid: bool) {
		let request = GuardianLoginRequest {
			email: email.to_string(),
			password: "portal-2026".to_string(),
		};
		assert_eq!(request.validate().is_ok(), valid);
	}
}
