//! Supplier purchases that bring stock in, and what the canteen owes each
//! supplier.

use std::collections::HashSet;

use cantina_core::enums::{StockMovementKind, SupplierMovementKind};
use cantina_core::fiscal::validate_ruc;
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::catalog;
use cantina_db::repositories::purchasing::{
	self, NewSupplierMovement, Purchase, PurchaseItem, Supplier, SupplierMovement,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub async fn create_supplier(
	state: &AppState,
	employee_id: i64,
	name: &str,
	ruc: &str,
	phone: Option<&str>,
	email: Option<&str>,
) -> Result<Supplier> {
	let name = name.trim();
	if name.is_empty() {
		return Err(Error::Validation("Supplier name is required".to_string()));
	}
	validate_ruc(ruc.trim())?;
	let mut tx = state.db.begin().await?;
	let supplier = purchasing::insert_supplier(&mut tx, name, ruc.trim(), phone, email).await?;
	audit::record(&mut tx, Actor::Employee(employee_id), "CREATE_SUPPLIER", "supplier", supplier.id, Some(name)).await?;
	tx.commit().await?;
	Ok(supplier)
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PurchaseLine {
	pub product_id: i64,
	pub quantity: i64,
	pub unit_cost: Guaranies,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDetail {
	pub purchase: Purchase,
	pub items: Vec<PurchaseItem>,
}

/// Books a supplier invoice: stock comes in and each product takes the
/// invoiced cost as its last cost.
pub async fn register_purchase(
	state: &AppState,
	employee_id: i64,
	supplier_id: i64,
	invoice_number: &str,
	purchase_date: NaiveDate,
	lines: &[PurchaseLine],
) -> Result<PurchaseDetail> {
	let invoice_number = invoice_number.trim();
	if invoice_number.is_empty() {
		return Err(Error::Validation("Invoice number is required".to_string()));
	}
	if lines.is_empty() {
		return Err(Error::Validation("A purchase needs at least one item".to_string()));
	}
	let mut seen = HashSet::new();
	for line in lines {
		if line.quantity <= 0 || line.unit_cost.is_negative() {
			return Err(Error::Validation(format!(
				"Invalid quantity or cost for product {}",
				line.product_id
			)));
		}
		if !seen.insert(line.product_id) {
			return Err(Error::Validation(format!("Product {} appears more than once", line.product_id)));
		}
	}

	let mut tx = state.db.begin().await?;
	let supplier = purchasing::get_supplier(&mut tx, supplier_id).await?;
	if !supplier.active {
		return Err(Error::BusinessRule(format!("Supplier '{}' is inactive", supplier.name)));
	}
	let existing = purchasing::list_purchases(&mut tx, Some(supplier.id)).await?;
	if existing.iter().any(|p| p.invoice_number == invoice_number) {
		return Err(Error::Conflict(format!(
			"Invoice {} of {} is already registered",
			invoice_number, supplier.name
		)));
	}

	let total = lines.iter().try_fold(Guaranies::ZERO, |total, l| {
		total.checked_add(l.unit_cost.checked_times(l.quantity)?)
	})?;
	let purchase_id =
		purchasing::insert_purchase(&mut tx, supplier.id, invoice_number, purchase_date, total, employee_id).await?;
	let reference = format!("Compra {} {}", supplier.name, invoice_number);
	let mut items = Vec::with_capacity(lines.len());
	for line in lines {
		catalog::get_product(&mut tx, line.product_id).await?;
		items.push(
			purchasing::insert_purchase_item(&mut tx, purchase_id, line.product_id, line.quantity, line.unit_cost)
				.await?,
		);
		catalog::move_stock(
			&mut tx,
			line.product_id,
			StockMovementKind::Entry,
			line.quantity,
			Some(&reference),
			Some(employee_id),
		)
		.await?;
		catalog::set_cost(&mut tx, line.product_id, line.unit_cost).await?;
	}
	if total.is_positive() {
		let balance_after = purchasing::supplier_balance(&mut tx, supplier.id).await?.checked_add(total)?;
		purchasing::insert_supplier_movement(
			&mut tx,
			&NewSupplierMovement {
				supplier_id: supplier.id,
				purchase_id: Some(purchase_id),
				kind: SupplierMovementKind::Charge,
				amount: total,
				balance_after,
				reference: Some(&reference),
				employee_id,
			},
		)
		.await?;
	}
	let purchase = purchasing::get_purchase(&mut tx, purchase_id).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"REGISTER_PURCHASE",
		"purchase",
		purchase_id,
		Some(&format!("{} total {}", reference, total)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(purchase_id, supplier = %supplier.name, total = %total, "purchase registered");
	Ok(PurchaseDetail { purchase, items })
}

/// Statement of the supplier current account.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierAccount {
	pub supplier: Supplier,
	pub balance: Guaranies,
	pub movements: Vec<SupplierMovement>,
}

pub async fn supplier_account(state: &AppState, supplier_id: i64) -> Result<SupplierAccount> {
	let mut conn = state.db.pool().acquire().await?;
	let supplier = purchasing::get_supplier(&mut conn, supplier_id).await?;
	Ok(SupplierAccount {
		balance: purchasing::supplier_balance(&mut conn, supplier.id).await?,
		movements: purchasing::list_supplier_movements(&mut conn, supplier.id).await?,
		supplier,
	})
}

/// Records a payment to a supplier against the balance owed.
pub async fn pay_supplier(
	state: &AppState,
	employee_id: i64,
	supplier_id: i64,
	amount: Guaranies,
	reference: Option<&str>,
) -> Result<SupplierMovement> {
	if !amount.is_positive() {
		return Err(Error::Validation("Payment amount must be greater than zero".to_string()));
	}
	let reference = reference.map(str::trim).filter(|r| !r.is_empty());

	let mut tx = state.db.begin().await?;
	let supplier = purchasing::get_supplier(&mut tx, supplier_id).await?;
	let balance = purchasing::supplier_balance(&mut tx, supplier.id).await?;
	if amount > balance {
		return Err(Error::BusinessRule(format!(
			"Payment of {} exceeds the {} owed to {}",
			amount, balance, supplier.name
		)));
	}
	let movement = purchasing::insert_supplier_movement(
		&mut tx,
		&NewSupplierMovement {
			supplier_id: supplier.id,
			purchase_id: None,
			kind: SupplierMovementKind::Payment,
			amount,
			balance_after: balance - amount,
			reference,
			employee_id,
		},
	)
	.await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"PAY_SUPPLIER",
		"supplier",
		supplier.id,
		Some(&format!("{} paid, {} owed", amount, movement.balance_after)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(supplier_id, amount = %amount, balance = %movement.balance_after, "supplier payment");
	Ok(movement)
}
