//! Staff views. Administrators only.

use cantina_core::Result;
use cantina_core::enums::Role;
use cantina_db::repositories::accounts;
use cantina_db::repositories::audit::Actor;
use cantina_http::{Request, Response};

use super::serializers::{EmployeeUpdateRequest, PasswordResetRequest};
use crate::extract::{employee, validated};
use crate::services::auth::{self, NewEmployeeInput};
use crate::state::AppState;

/// GET /api/staff
pub async fn list_employees(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Administrator)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&accounts::list_employees(&mut conn).await?)
}

/// POST /api/staff
pub async fn create_employee(state: AppState, request: Request) -> Result<Response> {
	let admin_id = employee(&request, Role::Administrator)?;
	let data: NewEmployeeInput = validated(&request)?;
	let created = auth::create_employee(&state, Actor::Employee(admin_id), &data).await?;
	Response::created_json(&created)
}

/// GET /api/staff/{id}
pub async fn get_employee(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Administrator)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&accounts::get_employee(&mut conn, id).await?)
}

/// PUT /api/staff/{id}
pub async fn update_employee(state: AppState, request: Request) -> Result<Response> {
	let admin_id = employee(&request, Role::Administrator)?;
	let id: i64 = request.path_param("id")?;
	let data: EmployeeUpdateRequest = validated(&request)?;
	Response::json(&auth::update_employee(&state, admin_id, id, &data.into()).await?)
}

/// POST /api/staff/{id}/password
pub async fn reset_password(state: AppState, request: Request) -> Result<Response> {
	let admin_id = employee(&request, Role::Administrator)?;
	let id: i64 = request.path_param("id")?;
	let data: PasswordResetRequest = validated(&request)?;
	auth::reset_employee_password(&state, admin_id, id, &data.password).await?;
	Response::success("Password updated")
}
