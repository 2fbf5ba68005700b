//! Purchasing payloads.

use cantina_core::Guaranies;
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::services::purchasing::PurchaseLine;

#[derive(Debug, Deserialize, Validate)]
pub struct SupplierRequest {
	#[validate(length(min = 1, max = 150, message = "is required"))]
	pub name: String,
	pub ruc: String,
	pub phone: Option<String>,
	#[validate(email(message = "Invalid email format"))]
	pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseRequest {
	pub supplier_id: i64,
	#[validate(length(min = 1, max = 30, message = "is required"))]
	pub invoice_number: String,
	/// Today when absent.
	pub purchase_date: Option<NaiveDate>,
	#[validate(length(min = 1, message = "must contain at least one item"))]
	pub items: Vec<PurchaseLine>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SupplierPaymentRequest {
	pub amount: Guaranies,
	#[validate(length(max = 255))]
	pub reference: Option<String>,
}
