//! Purchasing views.

use cantina_core::Result;
use cantina_core::enums::Role;
use cantina_db::repositories::purchasing;
use cantina_http::{Request, Response};

use super::serializers::{PurchaseRequest, SupplierPaymentRequest, SupplierRequest};
use crate::extract::{employee, validated};
use crate::services::purchasing::{self as service, PurchaseDetail};
use crate::state::AppState;

/// GET /api/purchasing/suppliers
pub async fn list_suppliers(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&purchasing::list_suppliers(&mut conn).await?)
}

/// POST /api/purchasing/suppliers
pub async fn create_supplier(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data: SupplierRequest = validated(&request)?;
	let supplier = service::create_supplier(
		&state,
		employee_id,
		&data.name,
		&data.ruc,
		data.phone.as_deref(),
		data.email.as_deref(),
	)
	.await?;
	Response::created_json(&supplier)
}

/// GET /api/purchasing/suppliers/{id}/account
pub async fn supplier_account(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	Response::json(&service::supplier_account(&state, id).await?)
}

/// Pay a supplier
///
/// POST /api/purchasing/suppliers/{id}/payments
/// Success response: 201 Created with the account movement
/// Error responses:
/// - 400 Bad Request: Amount not positive
/// - 404 Not Found: Supplier not found
/// - 422 Unprocessable Entity: Amount above the balance owed
pub async fn pay_supplier(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data: SupplierPaymentRequest = validated(&request)?;
	let movement = service::pay_supplier(&state, employee_id, id, data.amount, data.reference.as_deref()).await?;
	Response::created_json(&movement)
}

/// GET /api/purchasing/purchases?supplier_id=
pub async fn list_purchases(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let supplier_id = request.query::<i64>("supplier_id")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&purchasing::list_purchases(&mut conn, supplier_id).await?)
}

/// Register a supplier invoice
///
/// POST /api/purchasing/purchases
/// Success response: 201 Created with the purchase and its items
/// Error responses:
/// - 400 Bad Request: No items, bad quantities or costs
/// - 404 Not Found: Supplier or product not found
/// - 409 Conflict: Invoice already registered for the supplier
pub async fn register_purchase(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data: PurchaseRequest = validated(&request)?;
	let date = data.purchase_date.unwrap_or_else(|| state.today());
	let detail =
		service::register_purchase(&state, employee_id, data.supplier_id, &data.invoice_number, date, &data.items)
			.await?;
	Response::created_json(&detail)
}

/// GET /api/purchasing/purchases/{id}
pub async fn get_purchase(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	let purchase = purchasing::get_purchase(&mut conn, id).await?;
	let items = purchasing::list_purchase_items(&mut conn, id).await?;
	Response::json(&PurchaseDetail { purchase, items })
}
