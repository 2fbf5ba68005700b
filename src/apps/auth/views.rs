//! Login, logout, password recovery and the current principal.

use cantina_auth::token::bearer_token;
use cantina_core::Result;
use cantina_http::{Request, Response};

use super::serializers::{EmployeeLoginRequest, GuardianLoginRequest, PasswordResetConfirm, PasswordResetRequest};
use crate::extract::{principal, validated};
use crate::services::auth;
use crate::state::AppState;

/// Staff login
///
/// POST /api/auth/login
/// Success response: 200 OK with the bearer token and principal
/// Error responses:
/// - 400 Bad Request: Missing username or password
/// - 401 Unauthorized: Invalid credentials or locked out
pub async fn login(state: AppState, request: Request) -> Result<Response> {
	let data: EmployeeLoginRequest = validated(&request)?;
	let login = auth::login_employee(&state, &data.username, &data.password).await?;
	Response::json(&login)
}

/// Guardian login
///
/// POST /api/auth/portal/login
pub async fn portal_login(state: AppState, request: Request) -> Result<Response> {
	let data: GuardianLoginRequest = validated(&request)?;
	let login = auth::login_guardian(&state, &data.email, &data.password).await?;
	Response::json(&login)
}

/// Guardian password recovery
///
/// POST /api/auth/portal/password-reset
/// Success response: 200 OK with the same message whether or not the e-mail
/// belongs to an account
/// Error responses:
/// - 400 Bad Request: Malformed e-mail
pub async fn portal_password_reset(state: AppState, request: Request) -> Result<Response> {
	let data: PasswordResetRequest = validated(&request)?;
	let ip = request.remote_addr.map(|addr| addr.ip().to_string());
	auth::request_portal_password_reset(&state, &data.email, ip.as_deref()).await?;
	Response::success("If the address belongs to an account, a recovery link has been sent")
}

/// POST /api/auth/portal/password-reset/confirm
pub async fn portal_password_reset_confirm(state: AppState, request: Request) -> Result<Response> {
	let data: PasswordResetConfirm = validated(&request)?;
	auth::reset_portal_password(&state, &data.token, &data.password).await?;
	Response::success("Password updated")
}

/// POST /api/auth/logout
pub async fn logout(state: AppState, request: Request) -> Result<Response> {
	if let Some(token) = request.authorization().and_then(bearer_token) {
		auth::logout(&state.db, token).await?;
	}
	Response::success("Logged out")
}

/// GET /api/auth/me
pub async fn me(_state: AppState, request: Request) -> Result<Response> {
	Response::json(&principal(&request)?)
}
