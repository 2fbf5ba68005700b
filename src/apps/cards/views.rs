//! Card views.

use cantina_core::Result;
use cantina_core::enums::{CardState, Role};
use cantina_db::repositories::audit::Actor;
use cantina_http::{Request, Response};

use super::serializers::{AlertThresholdRequest, CreditPolicyRequest, IssueCardRequest};
use crate::extract::{employee, validated};
use crate::services::cards;
use crate::state::AppState;

/// Issue a card
///
/// POST /api/cards
/// Success response: 201 Created with the card
/// Error responses:
/// - 404 Not Found: Student not found
/// - 409 Conflict: The student already has a card, or the number is taken
pub async fn issue_card(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data: IssueCardRequest = validated(&request)?;
	let card = cards::issue_card(
		&state,
		employee_id,
		data.student_id,
		&data.card_number,
		data.expires_on,
		data.alert_threshold,
	)
	.await?;
	Response::created_json(&card)
}

/// GET /api/cards/{card_number}
pub async fn card_detail(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let number: String = request.path_param("card_number")?;
	Response::json(&cards::card_detail(&state, &number).await?)
}

async fn change_state(state: AppState, request: Request, target: CardState) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let number: String = request.path_param("card_number")?;
	Response::json(&cards::set_card_state(&state, employee_id, &number, target).await?)
}

/// POST /api/cards/{card_number}/block
pub async fn block_card(state: AppState, request: Request) -> Result<Response> {
	change_state(state, request, CardState::Blocked).await
}

/// POST /api/cards/{card_number}/unblock
pub async fn unblock_card(state: AppState, request: Request) -> Result<Response> {
	change_state(state, request, CardState::Active).await
}

/// Negative balance policy.
///
/// PUT /api/cards/{card_number}/credit
pub async fn configure_credit(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let number: String = request.path_param("card_number")?;
	let data: CreditPolicyRequest = validated(&request)?;
	let card = cards::configure_credit(&state, employee_id, &number, data.allows_negative, data.credit_limit).await?;
	Response::json(&card)
}

/// PUT /api/cards/{card_number}/alert-threshold
pub async fn set_alert_threshold(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let number: String = request.path_param("card_number")?;
	let data: AlertThresholdRequest = validated(&request)?;
	let card = cards::set_alert_threshold(&state, Actor::Employee(employee_id), &number, data.alert_threshold).await?;
	Response::json(&card)
}

/// Recharges and consumptions, newest first.
///
/// GET /api/cards/{card_number}/movements?limit=
pub async fn movements(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let number: String = request.path_param("card_number")?;
	let limit = request.query::<i64>("limit")?;
	Response::json(&cards::movements(&state, &number, limit).await?)
}
