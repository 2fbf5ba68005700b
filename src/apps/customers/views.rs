//! Customer, student and restriction views.

use cantina_core::Result;
use cantina_core::enums::Role;
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::customers;
use cantina_http::{Request, Response};

use super::serializers::{
	CustomerRequest, CustomerUpdateRequest, PortalUserRequest, RestrictionRequest, StudentRequest, StudentUpdateRequest,
};
use crate::extract::{employee, validated};
use crate::services::{auth, sales};
use crate::state::AppState;

/// GET /api/customers?search=
pub async fn list_customers(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let search = request.query_value("search");
	let mut conn = state.db.pool().acquire().await?;
	let customers = customers::list_customers(&mut conn, search.as_deref()).await?;
	Response::json(&customers)
}

/// Create a customer
///
/// POST /api/customers
/// Success response: 201 Created with the customer
/// Error responses:
/// - 400 Bad Request: Invalid fields
/// - 409 Conflict: Tax id already registered
pub async fn create_customer(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data: CustomerRequest = validated(&request)?;
	let mut tx = state.db.begin().await?;
	let customer = customers::insert_customer(&mut tx, &data.into_new()).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_CUSTOMER",
		"customer",
		customer.id,
		Some(&customer.full_name()),
	)
	.await?;
	tx.commit().await?;
	tracing::info!(customer_id = customer.id, "customer created");
	Response::created_json(&customer)
}

/// GET /api/customers/{id}
pub async fn get_customer(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&customers::get_customer(&mut conn, id).await?)
}

/// PUT /api/customers/{id}
pub async fn update_customer(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data: CustomerUpdateRequest = validated(&request)?;
	let mut tx = state.db.begin().await?;
	let customer = customers::update_customer(&mut tx, id, &data.into()).await?;
	audit::record(&mut tx, Actor::Employee(employee_id), "UPDATE_CUSTOMER", "customer", id, None).await?;
	tx.commit().await?;
	Response::json(&customer)
}

/// Open credit sales and total debt.
///
/// GET /api/customers/{id}/account
pub async fn customer_account(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	Response::json(&sales::customer_account(&state, id).await?)
}

/// POST /api/customers/{id}/portal-user
pub async fn create_portal_user(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data: PortalUserRequest = validated(&request)?;
	let user = auth::create_portal_user(&state, employee_id, id, &data.email, &data.password).await?;
	Response::created_json(&user)
}

/// GET /api/customers/{id}/students
pub async fn list_students(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	customers::get_customer(&mut conn, id).await?;
	Response::json(&customers::list_students(&mut conn, id).await?)
}

/// POST /api/customers/{id}/students
pub async fn create_student(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let customer_id: i64 = request.path_param("id")?;
	let data: StudentRequest = validated(&request)?;
	let mut tx = state.db.begin().await?;
	let customer = customers::get_customer(&mut tx, customer_id).await?;
	let student = customers::insert_student(&mut tx, &data.into_new(customer.id)).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_STUDENT",
		"student",
		student.id,
		Some(&format!("{} ({})", student.full_name(), customer.full_name())),
	)
	.await?;
	tx.commit().await?;
	Response::created_json(&student)
}

/// GET /api/customers/students/{id}
pub async fn get_student(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&customers::get_student(&mut conn, id).await?)
}

/// PUT /api/customers/students/{id}
pub async fn update_student(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data: StudentUpdateRequest = validated(&request)?;
	let mut tx = state.db.begin().await?;
	let student = customers::update_student(&mut tx, id, &data.into()).await?;
	audit::record(&mut tx, Actor::Employee(employee_id), "UPDATE_STUDENT", "student", id, None).await?;
	tx.commit().await?;
	Response::json(&student)
}

/// GET /api/customers/students/{id}/restrictions
pub async fn list_restrictions(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	customers::get_student(&mut conn, id).await?;
	Response::json(&customers::list_restrictions(&mut conn, id).await?)
}

/// POST /api/customers/students/{id}/restrictions
pub async fn add_restriction(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let student_id: i64 = request.path_param("id")?;
	let data: RestrictionRequest = validated(&request)?;
	let notes = data.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
	let mut tx = state.db.begin().await?;
	customers::get_student(&mut tx, student_id).await?;
	let restriction = customers::insert_restriction(&mut tx, student_id, data.kind, notes).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"ADD_RESTRICTION",
		"student",
		student_id,
		Some(data.kind.as_str()),
	)
	.await?;
	tx.commit().await?;
	Response::created_json(&restriction)
}

/// DELETE /api/customers/students/{id}/restrictions/{restriction_id}
pub async fn delete_restriction(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let student_id: i64 = request.path_param("id")?;
	let restriction_id: i64 = request.path_param("restriction_id")?;
	let mut tx = state.db.begin().await?;
	customers::delete_restriction(&mut tx, student_id, restriction_id).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"DELETE_RESTRICTION",
		"student",
		student_id,
		Some(&restriction_id.to_string()),
	)
	.await?;
	tx.commit().await?;
	Ok(Response::no_content())
}
