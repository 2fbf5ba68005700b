//! Suppliers, purchases and the supplier current account.

use cantina_core::enums::SupplierMovementKind;
use cantina_core::{Guaranies, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Supplier {
	pub id: i64,
	pub name: String,
	pub ruc: String,
	pub phone: Option<String>,
	pub email: Option<String>,
	pub active: bool,
	pub created_at: DateTime<Utc>,
}

pub async fn insert_supplier(
	conn: &mut SqliteConnection,
	name: &str,
	ruc: &str,
	phone: Option<&str>,
	email: Option<&str>,
) -> Result<Supplier> {
	Ok(sqlx::query_as::<_, Supplier>(
		"INSERT INTO suppliers (name, ruc, phone, email, created_at) VALUES (?, ?, ?, ?, ?)
		 RETURNING id, name, ruc, phone, email, active, created_at",
	)
	.bind(name)
	.bind(ruc)
	.bind(phone)
	.bind(email)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn list_suppliers(conn: &mut SqliteConnection) -> Result<Vec<Supplier>> {
	Ok(sqlx::query_as::<_, Supplier>(
		"SELECT id, name, ruc, phone, email, active, created_at FROM suppliers ORDER BY name",
	)
	.fetch_all(&mut *conn)
	.await?)
}

pub async fn get_supplier(conn: &mut SqliteConnection, id: i64) -> Result<Supplier> {
	sqlx::query_as::<_, Supplier>(
		"SELECT id, name, ruc, phone, email, active, created_at FROM suppliers WHERE id = ?",
	)
	.bind(id)
	.fetch_optional(&mut *conn)
	.await?
	.ok_or_else(|| not_found("Supplier", id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Purchase {
	pub id: i64,
	pub supplier_id: i64,
	pub supplier: String,
	pub invoice_number: String,
	pub purchase_date: NaiveDate,
	pub total: Guaranies,
	pub employee_id: Option<i64>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PurchaseItem {
	pub id: i64,
	pub purchase_id: i64,
	pub product_id: i64,
	pub quantity: i64,
	pub unit_cost: Guaranies,
	pub subtotal: Guaranies,
}

const PURCHASE_SELECT: &str = "SELECT p.id, p.supplier_id, s.name AS supplier, p.invoice_number, \
	p.purchase_date, p.total, p.employee_id, p.created_at \
	FROM purchases p JOIN suppliers s ON s.id = p.supplier_id";

pub async fn insert_purchase(
	conn: &mut SqliteConnection,
	supplier_id: i64,
	invoice_number: &str,
	purchase_date: NaiveDate,
	total: Guaranies,
	employee_id: i64,
) -> Result<i64> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO purchases (supplier_id, invoice_number, purchase_date, total, employee_id, created_at)
		 VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(supplier_id)
	.bind(invoice_number)
	.bind(purchase_date)
	.bind(total)
	.bind(employee_id)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?;
	Ok(id)
}

pub async fn insert_purchase_item(
	conn: &mut SqliteConnection,
	purchase_id: i64,
	product_id: i64,
	quantity: i64,
	unit_cost: Guaranies,
) -> Result<PurchaseItem> {
	Ok(sqlx::query_as::<_, PurchaseItem>(
		"INSERT INTO purchase_items (purchase_id, product_id, quantity, unit_cost, subtotal)
		 VALUES (?, ?, ?, ?, ?)
		 RETURNING id, purchase_id, product_id, quantity, unit_cost, subtotal",
	)
	.bind(purchase_id)
	.bind(product_id)
	.bind(quantity)
	.bind(unit_cost)
	.bind(unit_cost.times(quantity))
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn get_purchase(conn: &mut SqliteConnection, id: i64) -> Result<Purchase> {
	let sql = format!("{} WHERE p.id = ?", PURCHASE_SELECT);
	sqlx::query_as::<_, Purchase>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Purchase", id))
}

pub async fn list_purchase_items(conn: &mut SqliteConnection, purchase_id: i64) -> Result<Vec<PurchaseItem>> {
	Ok(sqlx::query_as::<_, PurchaseItem>(
		"SELECT id, purchase_id, product_id, quantity, unit_cost, subtotal FROM purchase_items
		 WHERE purchase_id = ? ORDER BY id",
	)
	.bind(purchase_id)
	.fetch_all(&mut *conn)
	.await?)
}

pub async fn list_purchases(conn: &mut SqliteConnection, supplier_id: Option<i64>) -> Result<Vec<Purchase>> {
	let sql = format!(
		"{} WHERE (?1 IS NULL OR p.supplier_id = ?1) ORDER BY p.purchase_date DESC, p.id DESC",
		PURCHASE_SELECT
	);
	Ok(sqlx::query_as::<_, Purchase>(&sql).bind(supplier_id).fetch_all(&mut *conn).await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct SupplierMovement {
	pub id: i64,
	pub supplier_id: i64,
	pub purchase_id: Option<i64>,
	#[sqlx(try_from = "String")]
	pub kind: SupplierMovementKind,
	pub amount: Guaranies,
	pub balance_after: Guaranies,
	pub reference: Option<String>,
	pub employee_id: Option<i64>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSupplierMovement<'a> {
	pub supplier_id: i64,
	pub purchase_id: Option<i64>,
	pub kind: SupplierMovementKind,
	pub amount: Guaranies,
	pub balance_after: Guaranies,
	pub reference: Option<&'a str>,
	pub employee_id: i64,
}

/// What the canteen owes the supplier, zero before the first movement.
pub async fn supplier_balance(conn: &mut SqliteConnection, supplier_id: i64) -> Result<Guaranies> {
	let last: Option<(Guaranies,)> = sqlx::query_as(
		"SELECT balance_after FROM supplier_account_movements WHERE supplier_id = ? ORDER BY id DESC LIMIT 1",
	)
	.bind(supplier_id)
	.fetch_optional(&mut *conn)
	.await?;
	Ok(last.map_or(Guaranies::ZERO, |(balance,)| balance))
}

pub async fn insert_supplier_movement(
	conn: &mut SqliteConnection,
	new: &NewSupplierMovement<'_>,
) -> Result<SupplierMovement> {
	Ok(sqlx::query_as::<_, SupplierMovement>(
		"INSERT INTO supplier_account_movements (supplier_id, purchase_id, kind, amount, balance_after,
			reference, employee_id, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
		 RETURNING id, supplier_id, purchase_id, kind, amount, balance_after, reference, employee_id, created_at",
	)
	.bind(new.supplier_id)
	.bind(new.purchase_id)
	.bind(new.kind.as_str())
	.bind(new.amount)
	.bind(new.balance_after)
	.bind(new.reference)
	.bind(new.employee_id)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn list_supplier_movements(conn: &mut SqliteConnection, supplier_id: i64) -> Result<Vec<SupplierMovement>> {
	Ok(sqlx::query_as::<_, SupplierMovement>(
		"SELECT id, supplier_id, purchase_id, kind, amount, balance_after, reference, employee_id, created_at
		 FROM supplier_account_movements WHERE supplier_id = ? ORDER BY id",
	)
	.bind(supplier_id)
	.fetch_all(&mut *conn)
	.await?)
}
