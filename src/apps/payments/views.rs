//! Payment method views.

use cantina_core::enums::Role;
use cantina_core::{Error, Result};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::payments;
use cantina_http::{Request, Response};
use chrono::Utc;

use super::serializers::{ActiveRequest, CommissionRateRequest, PaymentMethodRequest};
use crate::extract::{employee, validated};
use crate::state::AppState;

/// GET /api/payment-methods?active_only=
pub async fn list_methods(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let active_only = request.query::<bool>("active_only")?.unwrap_or(false);
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&payments::list_payment_methods(&mut conn, active_only).await?)
}

/// POST /api/payment-methods
pub async fn create_method(state: AppState, request: Request) -> Result<Response> {
	let admin_id = employee(&request, Role::Administrator)?;
	let data: PaymentMethodRequest = validated(&request)?;
	let mut tx = state.db.begin().await?;
	let method = payments::insert_payment_method(&mut tx, data.name.trim(), data.kind, data.generates_commission).await?;
	audit::record(
		&mut tx,
		Actor::Employee(admin_id),
		"CREATE_PAYMENT_METHOD",
		"payment_method",
		method.id,
		Some(&method.name),
	)
	.await?;
	tx.commit().await?;
	Response::created_json(&method)
}

/// PUT /api/payment-methods/{id}/active
pub async fn set_active(state: AppState, request: Request) -> Result<Response> {
	let admin_id = employee(&request, Role::Administrator)?;
	let id: i64 = request.path_param("id")?;
	let data: ActiveRequest = validated(&request)?;
	let mut tx = state.db.begin().await?;
	let method = payments::set_payment_method_active(&mut tx, id, data.active).await?;
	let action = if data.active { "ENABLE_PAYMENT_METHOD" } else { "DISABLE_PAYMENT_METHOD" };
	audit::record(&mut tx, Actor::Employee(admin_id), action, "payment_method", id, None).await?;
	tx.commit().await?;
	Response::json(&method)
}

/// GET /api/payment-methods/{id}/commission-rates
pub async fn list_rates(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	payments::get_payment_method(&mut conn, id).await?;
	Response::json(&payments::list_commission_rates(&mut conn, id).await?)
}

/// Add a commission rate
///
/// POST /api/payment-methods/{id}/commission-rates
/// Success response: 201 Created with the rate; the previous open rate
/// ends where this one starts
/// Error responses:
/// - 400 Bad Request: Basis points out of range or negative fixed amount
/// - 422 Unprocessable Entity: The method does not generate commissions
pub async fn add_rate(state: AppState, request: Request) -> Result<Response> {
	let admin_id = employee(&request, Role::Administrator)?;
	let id: i64 = request.path_param("id")?;
	let data: CommissionRateRequest = validated(&request)?;
	if data.fixed_amount.is_negative() {
		return Err(Error::Validation("Fixed amount cannot be negative".to_string()));
	}
	let valid_from = data.valid_from.unwrap_or_else(Utc::now);

	let mut tx = state.db.begin().await?;
	let method = payments::get_payment_method(&mut tx, id).await?;
	if !method.generates_commission {
		return Err(Error::BusinessRule(format!("{} does not generate commissions", method.name)));
	}
	let rate = payments::insert_commission_rate(&mut tx, id, data.basis_points, data.fixed_amount, valid_from).await?;
	audit::record(
		&mut tx,
		Actor::Employee(admin_id),
		"ADD_COMMISSION_RATE",
		"payment_method",
		id,
		Some(&format!("{} bp + {}", rate.basis_points, rate.fixed_amount)),
	)
	.await?;
	tx.commit().await?;
	Response::created_json(&rate)
}
