use cantina_core::Result;
use cantina_core::enums::Role;
use cantina_core::fiscal::ruc_check_digit;
use cantina_db::repositories::fiscal::{self, NewStamp};
use cantina_http::{Request, Response};
use serde_json::json;

use super::serializers::{CreditNoteRequest, InvoiceRequest, StampRequest};
use crate::extract::{employee, validated};
use crate::services::fiscal as service;
use crate::state::AppState;

/// GET /api/fiscal/stamps
pub async fn list_stamps(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&fiscal::list_stamps(&mut conn).await?)
}

/// POST /api/fiscal/stamps
pub async fn create_stamp(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Administrator)?;
	let stamp: NewStamp = validated::<StampRequest>(&request)?.into();
	Response::created_json(&service::create_stamp(&state, employee_id, &stamp).await?)
}

/// Issue the invoice of a sale
///
/// POST /api/fiscal/invoices
/// Success response: 201 Created with the fiscal document
/// Error responses:
/// - 404 Not Found: unknown sale
/// - 409 Conflict: the sale already has an invoice
/// - 422 Unprocessable Entity: voided sale, or no usable stamp
pub async fn issue_invoice(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Cashier)?;
	let data: InvoiceRequest = request.json()?;
	Response::created_json(&service::issue_invoice(&state, employee_id, data.sale_id).await?)
}

/// GET /api/fiscal/documents/{id}
pub async fn get_document(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&fiscal::get_document(&mut conn, id).await?)
}

/// Issue a credit note for returned items
///
/// POST /api/fiscal/sales/{id}/credit-notes
/// Success response: 201 Created with the note and its items
/// Error responses:
/// - 400 Bad Request: No reason, no items or repeated products
/// - 404 Not Found: unknown sale
/// - 422 Unprocessable Entity: no invoice, product not sold, or more units
///   than are left to return
pub async fn issue_credit_note(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let sale_id: i64 = request.path_param("id")?;
	let data: CreditNoteRequest = validated(&request)?;
	let detail = service::issue_credit_note(&state, employee_id, sale_id, &data.items, &data.reason).await?;
	Response::created_json(&detail)
}

/// GET /api/fiscal/sales/{id}/credit-notes
pub async fn list_credit_notes(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let sale_id: i64 = request.path_param("id")?;
	Response::json(&service::credit_notes_for_sale(&state, sale_id).await?)
}

/// GET /api/fiscal/credit-notes/{id}
pub async fn get_credit_note(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	Response::json(&service::credit_note_detail(&state, id).await?)
}

/// POST /api/fiscal/credit-notes/{id}/void
pub async fn void_credit_note(state: AppState, request: Request) -> Result<Response> {
	let manager_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	Response::json(&service::void_credit_note(&state, manager_id, id).await?)
}

/// GET /api/fiscal/ruc/{base}: the check digit of a RUC base number.
pub async fn ruc_digit(_state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let base: String = request.path_param("base")?;
	let digit = ruc_check_digit(&base)?;
	Response::json(&json!({
		"base": base,
		"check_digit": digit,
		"ruc": format!("{}-{}", base, digit),
	}))
}
