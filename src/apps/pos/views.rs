//! POS views. Cashiers sell and recharge; voiding needs a manager.

use cantina_core::enums::Role;
use cantina_core::{Error, Result};
use cantina_db::repositories::sales::{self as repo, SaleFilter};
use cantina_http::{Request, Response};

use super::serializers::{
	BalanceCheckRequest, CreditPaymentRequest, PromotionPreviewRequest, RechargeRequest, RestrictionCheckRequest,
	SupervisorRequest, VoidRequest,
};
use crate::extract::{employee, validated};
use crate::services::sales::{self, SaleRequest};
use crate::services::{cards, ticket};
use crate::state::AppState;

/// POST /api/pos/balance-check
pub async fn balance_check(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let data = validated::<BalanceCheckRequest>(&request)?;
	Response::json(&sales::check_balance(&state, &data.card_number, data.amount).await?)
}

/// POST /api/pos/restriction-check
pub async fn restriction_check(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let data = validated::<RestrictionCheckRequest>(&request)?;
	Response::json(&sales::check_restrictions(&state, data.student_id, &data.product_ids).await?)
}

/// POST /api/pos/promotion-preview
pub async fn promotion_preview(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let data = validated::<PromotionPreviewRequest>(&request)?;
	let preview =
		sales::preview_promotion(&state, &data.items, data.student_id, data.promotion_code.as_deref()).await?;
	Response::json(&preview)
}

/// Process a sale
///
/// POST /api/pos/sales
/// Request body: items, payments, and optionally kind, student_id,
/// customer_id, cash_session_id, promotion_code, acknowledge_restrictions,
/// supervisor and issue_invoice
/// Success response: 201 Created with the receipt
/// Error responses:
/// - 400 Bad Request: empty cart or payments that do not add up
/// - 404 Not Found: unknown product, card or payment method
/// - 409 Conflict: unacknowledged dietary restriction conflict
/// - 422 Unprocessable Entity: blocked card, insufficient balance or
///   insufficient stock
pub async fn create_sale(state: AppState, request: Request) -> Result<Response> {
	let cashier_id = employee(&request, Role::Cashier)?;
	let data = validated::<SaleRequest>(&request)?;
	Response::created_json(&sales::process_sale(&state, cashier_id, &data).await?)
}

/// GET /api/pos/sales?from=&to=&customer_id=&employee_id=
pub async fn list_sales(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let filter = SaleFilter {
		from: request.query("from")?,
		to: request.query("to")?,
		customer_id: request.query("customer_id")?,
		employee_id: request.query("employee_id")?,
	};
	if let (Some(from), Some(to)) = (filter.from, filter.to)
		&& from > to
	{
		return Err(Error::Validation(format!("'from' ({}) is after 'to' ({})", from, to)));
	}
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&repo::list_sales(&mut conn, &filter).await?)
}

/// GET /api/pos/sales/{id}
pub async fn get_sale(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	Response::json(&sales::sale_detail(&state, id).await?)
}

/// Void a sale
///
/// POST /api/pos/sales/{id}/void
/// Success response: 200 OK with the voided sale
/// Error responses:
/// - 403 Forbidden: caller is not a manager
/// - 409 Conflict: the sale is already voided
pub async fn void_sale(state: AppState, request: Request) -> Result<Response> {
	let manager_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data = validated::<VoidRequest>(&request)?;
	Response::json(&sales::void_sale(&state, manager_id, id, &data.reason).await?)
}

/// POST /api/pos/sales/{id}/payments: pays down a credit sale.
pub async fn pay_sale(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let data = validated::<CreditPaymentRequest>(&request)?;
	let sale = sales::pay_credit_sale(
		&state,
		employee_id,
		id,
		data.payment_method_id,
		data.amount,
		data.reference.as_deref(),
	)
	.await?;
	Response::json(&sale)
}

/// GET /api/pos/sales/{id}/ticket
pub async fn sale_ticket(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let text = ticket::sale_ticket(&state, id).await?;
	Ok(Response::ok().with_text(text))
}

/// POST /api/pos/recharges
pub async fn recharge(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let data = validated::<RechargeRequest>(&request)?;
	let recharge = cards::recharge_at_pos(
		&state,
		employee_id,
		&data.card_number,
		data.amount,
		data.cash_session_id,
		data.note.as_deref(),
	)
	.await?;
	Response::created_json(&recharge)
}

/// POST /api/pos/validate-supervisor
pub async fn validate_supervisor(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let data = validated::<SupervisorRequest>(&request)?;
	Response::json(&sales::validate_supervisor(&state, &data.username, &data.password).await?)
}
