use cantina_core::Result;
use cantina_core::enums::Role;
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::cash;
use cantina_http::{Request, Response};

use super::serializers::{CloseSessionRequest, OpenSessionRequest, RegisterRequest};
use crate::extract::{date_range, employee, validated};
use crate::services::cash as service;
use crate::state::AppState;

/// GET /api/cash/registers
pub async fn list_registers(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&cash::list_registers(&mut conn).await?)
}

/// POST /api/cash/registers
pub async fn create_register(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Administrator)?;
	let data = validated::<RegisterRequest>(&request)?;
	let mut tx = state.db.begin().await?;
	let register = cash::insert_register(&mut tx, data.name.trim(), data.location.as_deref()).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_CASH_REGISTER",
		"cash_register",
		register.id,
		Some(&register.name),
	)
	.await?;
	tx.commit().await?;
	Response::created_json(&register)
}

/// GET /api/cash/sessions?from=&to=
pub async fn list_sessions(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let (from, to) = date_range(&request, state.today())?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&cash::list_sessions(&mut conn, from, to).await?)
}

/// Open a cash session
///
/// POST /api/cash/sessions
/// Success response: 201 Created with the session
/// Error responses:
/// - 404 Not Found: unknown register
/// - 409 Conflict: the register already has an open session
pub async fn open_session(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let data: OpenSessionRequest = request.json()?;
	let session = service::open_session(&state, employee_id, data.register_id, data.opening_amount).await?;
	Response::created_json(&session)
}

/// GET /api/cash/sessions/{id}
pub async fn session_summary(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	Response::json(&service::summary(&state, id).await?)
}

/// Close a cash session
///
/// POST /api/cash/sessions/{id}/close
/// Success response: 200 OK with the closed session and its difference
/// Error responses:
/// - 404 Not Found: unknown session
/// - 422 Unprocessable Entity: the session is already closed
pub async fn close_session(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let data = validated::<CloseSessionRequest>(&request)?;
	let session = service::close_session(&state, employee_id, id, data.counted_amount, data.notes.as_deref()).await?;
	Response::json(&session)
}
