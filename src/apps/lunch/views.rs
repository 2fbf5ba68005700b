//! Lunch views. Menus and plans are managed by managers; cashiers handle
//! subscriptions, fees, served lunches and account payments.

use cantina_core::enums::{AccountState, Role, SubscriptionState};
use cantina_core::lunch::YearMonth;
use cantina_core::{Error, Result};
use cantina_db::repositories::lunch;
use cantina_http::{Request, Response};

use super::serializers::{
	AccountPaymentRequest, FeePaymentRequest, LunchTypeRequest, MonthRequest, PlanRequest, SubscriptionRequest,
};
use crate::extract::{employee, month, validated};
use crate::services::lunch::{self as service, ServeLunch};
use crate::state::AppState;

/// GET /api/lunch/types
pub async fn list_types(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&lunch::list_lunch_types(&mut conn).await?)
}

/// POST /api/lunch/types
pub async fn create_type(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data = validated::<LunchTypeRequest>(&request)?;
	let lunch_type = service::create_lunch_type(
		&state,
		employee_id,
		&data.name,
		&data.main_course,
		data.includes_dessert,
		data.includes_drink,
		data.price,
	)
	.await?;
	Response::created_json(&lunch_type)
}

/// GET /api/lunch/plans
pub async fn list_plans(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&lunch::list_plans(&mut conn).await?)
}

/// POST /api/lunch/plans
pub async fn create_plan(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data = validated::<PlanRequest>(&request)?;
	let plan =
		service::create_plan(&state, employee_id, &data.name, data.lunch_type_id, data.days_per_week, data.monthly_price)
			.await?;
	Response::created_json(&plan)
}

/// GET /api/lunch/subscriptions?student_id=&state=
pub async fn list_subscriptions(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let student_id = request.query::<i64>("student_id")?;
	let subscription_state = request.query::<SubscriptionState>("state")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&lunch::list_subscriptions(&mut conn, student_id, subscription_state).await?)
}

/// Subscribe a student
///
/// POST /api/lunch/subscriptions
/// Success response: 201 Created with the subscription
/// Error responses:
/// - 404 Not Found: unknown student or plan
/// - 409 Conflict: the student already has an active or suspended subscription
/// - 422 Unprocessable Entity: inactive student or plan
pub async fn subscribe(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let data = validated::<SubscriptionRequest>(&request)?;
	let start = data.start_date.unwrap_or_else(|| state.today());
	let subscription =
		service::subscribe(&state, employee_id, data.student_id, data.plan_id, start, data.end_date).await?;
	Response::created_json(&subscription)
}

async fn change_subscription(state: AppState, request: Request, target: SubscriptionState) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	Response::json(&service::change_subscription(&state, employee_id, id, target).await?)
}

/// POST /api/lunch/subscriptions/{id}/suspend
pub async fn suspend(state: AppState, request: Request) -> Result<Response> {
	change_subscription(state, request, SubscriptionState::Suspended).await
}

/// POST /api/lunch/subscriptions/{id}/reactivate
pub async fn reactivate(state: AppState, request: Request) -> Result<Response> {
	change_subscription(state, request, SubscriptionState::Active).await
}

/// POST /api/lunch/subscriptions/{id}/cancel
pub async fn cancel(state: AppState, request: Request) -> Result<Response> {
	change_subscription(state, request, SubscriptionState::Cancelled).await
}

fn body_month(request: &Request) -> Result<YearMonth> {
	YearMonth::parse(&validated::<MonthRequest>(request)?.month)
}

/// POST /api/lunch/fees/generate
pub async fn generate_fees(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let month = body_month(&request)?;
	Response::created_json(&service::generate_monthly_fees(&state, employee_id, month).await?)
}

/// GET /api/lunch/fees?month=&subscription_id=
pub async fn list_fees(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let month = month(&request)?;
	let subscription_id = request.query::<i64>("subscription_id")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&lunch::list_monthly_payments(&mut conn, subscription_id, month).await?)
}

/// POST /api/lunch/fees/{id}/pay
pub async fn pay_fee(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let data: FeePaymentRequest = request.json()?;
	Response::json(&service::pay_monthly_fee(&state, employee_id, id, data.method).await?)
}

/// Register a served lunch
///
/// POST /api/lunch/records
/// Success response: 201 Created with the lunch record
/// Error responses:
/// - 409 Conflict: the student already had lunch that day, or an
///   unacknowledged dietary restriction conflict
/// - 422 Unprocessable Entity: the card cannot cover the lunch
pub async fn serve(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let input: ServeLunch = request.json()?;
	Response::created_json(&service::serve_lunch(&state, employee_id, &input).await?)
}

/// POST /api/lunch/accounts/generate
pub async fn generate_accounts(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let month = body_month(&request)?;
	Response::created_json(&service::generate_accounts(&state, employee_id, month).await?)
}

/// GET /api/lunch/accounts?month=&student_id=&state=
pub async fn list_accounts(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let month = month(&request)?;
	let student_id = request.query::<i64>("student_id")?;
	let account_state = request.query::<AccountState>("state")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&lunch::list_accounts(&mut conn, month, student_id, account_state).await?)
}

/// POST /api/lunch/accounts/{id}/pay
pub async fn pay_account(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let data = validated::<AccountPaymentRequest>(&request)?;
	let account =
		service::pay_account(&state, employee_id, id, data.amount, data.method, data.reference.as_deref()).await?;
	Response::json(&account)
}

/// GET /api/lunch/students/{id}/statement?month=
pub async fn statement(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let student_id: i64 = request.path_param("id")?;
	let month = month(&request)?.ok_or_else(|| Error::Validation("month is required".to_string()))?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&service::statement(&mut conn, student_id, month).await?)
}
