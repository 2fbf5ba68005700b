use cantina_core::{Error, Result};
use cantina_http::{Request, Response};

use super::serializers::{PasswordChangeRequest, PortalRechargeRequest, ThresholdRequest};
use crate::extract::{guardian, month, validated};
use crate::services::{auth, portal};
use crate::state::AppState;

/// Header carrying the hex HMAC of a gateway callback body.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// GET /api/portal/children
pub async fn children(state: AppState, request: Request) -> Result<Response> {
	let (_, customer_id) = guardian(&request)?;
	Response::json(&portal::children(&state, customer_id).await?)
}

/// GET /api/portal/cards/{card_number}/movements?limit=
pub async fn card_movements(state: AppState, request: Request) -> Result<Response> {
	let (_, customer_id) = guardian(&request)?;
	let number: String = request.path_param("card_number")?;
	let limit = request.query::<i64>("limit")?;
	Response::json(&portal::card_movements(&state, customer_id, &number, limit).await?)
}

/// PUT /api/portal/cards/{card_number}/alert-threshold
pub async fn set_alert_threshold(state: AppState, request: Request) -> Result<Response> {
	let (portal_user_id, customer_id) = guardian(&request)?;
	let number: String = request.path_param("card_number")?;
	let data: ThresholdRequest = request.json()?;
	let card =
		portal::set_child_alert_threshold(&state, portal_user_id, customer_id, &number, data.alert_threshold).await?;
	Response::json(&card)
}

/// GET /api/portal/recharges
pub async fn recharge_history(state: AppState, request: Request) -> Result<Response> {
	let (_, customer_id) = guardian(&request)?;
	Response::json(&portal::recharge_history(&state, customer_id).await?)
}

/// Request an online recharge
///
/// POST /api/portal/recharges
/// Success response: 201 Created with the pending recharge and its pay_request_id
/// Error responses:
/// - 400 Bad Request: amount outside the allowed range
/// - 404 Not Found: the card does not belong to one of the family's children
/// - 422 Unprocessable Entity: the card cannot be recharged
pub async fn request_recharge(state: AppState, request: Request) -> Result<Response> {
	let (portal_user_id, customer_id) = guardian(&request)?;
	let data = validated::<PortalRechargeRequest>(&request)?;
	let recharge =
		portal::request_recharge(&state, portal_user_id, customer_id, &data.card_number, data.amount).await?;
	Response::created_json(&recharge)
}

/// POST /api/portal/recharges/{id}/cancel
pub async fn cancel_recharge(state: AppState, request: Request) -> Result<Response> {
	let (portal_user_id, customer_id) = guardian(&request)?;
	let id: i64 = request.path_param("id")?;
	Response::json(&portal::cancel_recharge(&state, portal_user_id, customer_id, id).await?)
}

/// Payment gateway webhook
///
/// POST /api/portal/gateway/callback
/// Authenticated by the HMAC in the `X-Signature` header, not by a session.
/// Success response: 200 OK with the updated recharge
/// Error responses:
/// - 401 Unauthorized: missing or invalid signature
/// - 404 Not Found: unknown pay_request_id
pub async fn gateway_callback(state: AppState, request: Request) -> Result<Response> {
	let signature = request.header(SIGNATURE_HEADER);
	Response::json(&portal::gateway_callback(&state, &request.body, signature).await?)
}

/// GET /api/portal/notifications?unread_only=
pub async fn notifications(state: AppState, request: Request) -> Result<Response> {
	let (_, customer_id) = guardian(&request)?;
	let unread_only = request.query::<bool>("unread_only")?.unwrap_or(false);
	Response::json(&portal::notifications(&state, customer_id, unread_only).await?)
}

/// POST /api/portal/notifications/{id}/read
pub async fn mark_read(state: AppState, request: Request) -> Result<Response> {
	let (_, customer_id) = guardian(&request)?;
	let id: i64 = request.path_param("id")?;
	portal::mark_notification_read(&state, customer_id, id).await?;
	Ok(Response::no_content())
}

/// GET /api/portal/students/{id}/restrictions
pub async fn child_restrictions(state: AppState, request: Request) -> Result<Response> {
	let (_, customer_id) = guardian(&request)?;
	let student_id: i64 = request.path_param("id")?;
	Response::json(&portal::child_restrictions(&state, customer_id, student_id).await?)
}

/// GET /api/portal/students/{id}/lunch?month=
pub async fn child_lunch(state: AppState, request: Request) -> Result<Response> {
	let (_, customer_id) = guardian(&request)?;
	let student_id: i64 = request.path_param("id")?;
	let month = month(&request)?.ok_or_else(|| Error::Validation("month is required".to_string()))?;
	Response::json(&portal::child_lunch_statement(&state, customer_id, student_id, month).await?)
}

/// POST /api/portal/password
pub async fn change_password(state: AppState, request: Request) -> Result<Response> {
	let (portal_user_id, _) = guardian(&request)?;
	let data = validated::<PasswordChangeRequest>(&request)?;
	auth::change_portal_password(&state, portal_user_id, &data.current_password, &data.new_password).await?;
	Response::success("Password changed")
}
