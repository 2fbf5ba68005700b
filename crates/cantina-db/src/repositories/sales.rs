//! Sales, their items, payments and commissions.

use cantina_core::commissions::CommissionLine;
use cantina_core::enums::{PaymentMethodKind, PaymentState, SaleKind, SaleState};
use cantina_core::sales::{SaleSnapshot, paid_percentage};
use cantina_core::{Guaranies, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Sale {
	pub id: i64,
	pub customer_id: i64,
	pub employee_id: i64,
	pub student_id: Option<i64>,
	pub cash_session_id: Option<i64>,
	#[sqlx(try_from = "String")]
	pub kind: SaleKind,
	pub subtotal: Guaranies,
	pub discount: Guaranies,
	pub total_amount: Guaranies,
	pub pending_balance: Guaranies,
	#[sqlx(try_from = "String")]
	pub payment_state: PaymentState,
	#[sqlx(try_from = "String")]
	pub state: SaleState,
	pub authorized_by: Option<i64>,
	pub void_reason: Option<String>,
	pub voided_by: Option<i64>,
	pub voided_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl Sale {
	pub fn snapshot(&self) -> SaleSnapshot {
		SaleSnapshot {
			kind: self.kind,
			total: self.total_amount,
			pending: self.pending_balance,
			payment_state: self.payment_state,
			authorized_by: self.authorized_by,
		}
	}

	pub fn paid_percentage(&self) -> f64 {
		paid_percentage(self.total_amount, self.pending_balance)
	}
}

const SALE_COLUMNS: &str = "id, customer_id, employee_id, student_id, cash_session_id, kind, subtotal, \
	discount, total_amount, pending_balance, payment_state, state, authorized_by, void_reason, voided_by, \
	voided_at, created_at";

#[derive(Debug, Clone)]
pub struct NewSale {
	pub customer_id: i64,
	pub employee_id: i64,
	pub student_id: Option<i64>,
	pub cash_session_id: Option<i64>,
	pub kind: SaleKind,
	pub subtotal: Guaranies,
	pub discount: Guaranies,
	pub total_amount: Guaranies,
	pub pending_balance: Guaranies,
	pub payment_state: PaymentState,
	pub authorized_by: Option<i64>,
}

pub async fn insert_sale(conn: &mut SqliteConnection, new: &NewSale) -> Result<Sale> {
	let sql = format!(
		"INSERT INTO sales (customer_id, employee_id, student_id, cash_session_id, kind, subtotal, discount,
			total_amount, pending_balance, payment_state, authorized_by, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
		SALE_COLUMNS
	);
	Ok(sqlx::query_as::<_, Sale>(&sql)
		.bind(new.customer_id)
		.bind(new.employee_id)
		.bind(new.student_id)
		.bind(new.cash_session_id)
		.bind(new.kind.as_str())
		.bind(new.subtotal)
		.bind(new.discount)
		.bind(new.total_amount)
		.bind(new.pending_balance)
		.bind(new.payment_state.as_str())
		.bind(new.authorized_by)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn find_sale(conn: &mut SqliteConnection, id: i64) -> Result<Option<Sale>> {
	let sql = format!("SELECT {} FROM sales WHERE id = ?", SALE_COLUMNS);
	Ok(sqlx::query_as::<_, Sale>(&sql).bind(id).fetch_optional(&mut *conn).await?)
}

pub async fn get_sale(conn: &mut SqliteConnection, id: i64) -> Result<Sale> {
	find_sale(conn, id).await?.ok_or_else(|| not_found("Sale", id))
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
	pub from: Option<NaiveDate>,
	pub to: Option<NaiveDate>,
	pub customer_id: Option<i64>,
	pub employee_id: Option<i64>,
}

pub async fn list_sales(conn: &mut SqliteConnection, filter: &SaleFilter) -> Result<Vec<Sale>> {
	let sql = format!(
		"SELECT {} FROM sales
		 WHERE (?1 IS NULL OR date(created_at) >= ?1)
			AND (?2 IS NULL OR date(created_at) <= ?2)
			AND (?3 IS NULL OR customer_id = ?3)
			AND (?4 IS NULL OR employee_id = ?4)
		 ORDER BY id DESC",
		SALE_COLUMNS
	);
	Ok(sqlx::query_as::<_, Sale>(&sql)
		.bind(filter.from)
		.bind(filter.to)
		.bind(filter.customer_id)
		.bind(filter.employee_id)
		.fetch_all(&mut *conn)
		.await?)
}

/// Processed credit sales of a customer that still owe money, oldest first.
pub async fn list_open_credit_sales(conn: &mut SqliteConnection, customer_id: i64) -> Result<Vec<Sale>> {
	let sql = format!(
		"SELECT {} FROM sales
		 WHERE customer_id = ? AND kind = 'CREDIT' AND state = 'PROCESSED' AND pending_balance > 0
		 ORDER BY id",
		SALE_COLUMNS
	);
	Ok(sqlx::query_as::<_, Sale>(&sql).bind(customer_id).fetch_all(&mut *conn).await?)
}

pub async fn set_pending(
	conn: &mut SqliteConnection,
	id: i64,
	pending_balance: Guaranies,
	payment_state: PaymentState,
) -> Result<Sale> {
	let sql = format!(
		"UPDATE sales SET pending_balance = ?, payment_state = ? WHERE id = ? RETURNING {}",
		SALE_COLUMNS
	);
	sqlx::query_as::<_, Sale>(&sql)
		.bind(pending_balance)
		.bind(payment_state.as_str())
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Sale", id))
}

pub async fn void_sale(conn: &mut SqliteConnection, id: i64, voided_by: i64, reason: &str) -> Result<Sale> {
	let sql = format!(
		"UPDATE sales SET state = 'VOIDED', void_reason = ?, voided_by = ?, voided_at = ?
		 WHERE id = ? RETURNING {}",
		SALE_COLUMNS
	);
	sqlx::query_as::<_, Sale>(&sql)
		.bind(reason)
		.bind(voided_by)
		.bind(Utc::now())
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Sale", id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct SaleItem {
	pub id: i64,
	pub sale_id: i64,
	pub product_id: i64,
	pub description: String,
	pub vat_rate: i64,
	pub quantity: i64,
	pub unit_price: Guaranies,
	pub subtotal: Guaranies,
}

pub async fn insert_sale_item(
	conn: &mut SqliteConnection,
	sale_id: i64,
	product_id: i64,
	quantity: i64,
	unit_price: Guaranies,
) -> Result<i64> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO sale_items (sale_id, product_id, quantity, unit_price, subtotal)
		 VALUES (?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(sale_id)
	.bind(product_id)
	.bind(quantity)
	.bind(unit_price)
	.bind(unit_price.times(quantity))
	.fetch_one(&mut *conn)
	.await?;
	Ok(id)
}

pub async fn list_sale_items(conn: &mut SqliteConnection, sale_id: i64) -> Result<Vec<SaleItem>> {
	Ok(sqlx::query_as::<_, SaleItem>(
		"SELECT i.id, i.sale_id, i.product_id, p.description, p.vat_rate, i.quantity, i.unit_price, i.subtotal
		 FROM sale_items i JOIN products p ON p.id = i.product_id
		 WHERE i.sale_id = ? ORDER BY i.id",
	)
	.bind(sale_id)
	.fetch_all(&mut *conn)
	.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct SalePayment {
	pub id: i64,
	pub sale_id: i64,
	pub payment_method_id: i64,
	pub method: String,
	#[sqlx(try_from = "String")]
	pub method_kind: PaymentMethodKind,
	pub amount: Guaranies,
	pub card_number: Option<String>,
	pub reference: Option<String>,
	pub created_at: DateTime<Utc>,
}

const PAYMENT_SELECT: &str = "SELECT sp.id, sp.sale_id, sp.payment_method_id, m.name AS method, \
	m.kind AS method_kind, sp.amount, sp.card_number, sp.reference, sp.created_at \
	FROM sale_payments sp JOIN payment_methods m ON m.id = sp.payment_method_id";

pub async fn insert_sale_payment(
	conn: &mut SqliteConnection,
	sale_id: i64,
	payment_method_id: i64,
	amount: Guaranies,
	card_number: Option<&str>,
	reference: Option<&str>,
) -> Result<SalePayment> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO sale_payments (sale_id, payment_method_id, amount, card_number, reference, created_at)
		 VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(sale_id)
	.bind(payment_method_id)
	.bind(amount)
	.bind(card_number)
	.bind(reference)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?;

	let sql = format!("{} WHERE sp.id = ?", PAYMENT_SELECT);
	Ok(sqlx::query_as::<_, SalePayment>(&sql).bind(id).fetch_one(&mut *conn).await?)
}

pub async fn list_sale_payments(conn: &mut SqliteConnection, sale_id: i64) -> Result<Vec<SalePayment>> {
	let sql = format!("{} WHERE sp.sale_id = ? ORDER BY sp.id", PAYMENT_SELECT);
	Ok(sqlx::query_as::<_, SalePayment>(&sql).bind(sale_id).fetch_all(&mut *conn).await?)
}

pub async fn insert_sale_commission(
	conn: &mut SqliteConnection,
	sale_payment_id: i64,
	line: &CommissionLine,
) -> Result<()> {
	sqlx::query(
		"INSERT INTO sale_commissions (sale_payment_id, commission_rate_id, amount, basis_points, fixed_amount, commission)
		 VALUES (?, ?, ?, ?, ?, ?)",
	)
	.bind(sale_payment_id)
	.bind(line.rate_id)
	.bind(line.amount)
	.bind(line.basis_points)
	.bind(line.fixed_amount)
	.bind(line.commission)
	.execute(&mut *conn)
	.await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;
	use crate::repositories::accounts::insert_employee;
	use crate::repositories::catalog::{NewProduct, insert_category, insert_product};
	use cantina_core::enums::Role;

	#[tokio::test]
	async fn test_credit_sale_requires_authorizer() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let cashier = insert_employee(&mut conn, "caja1", "hash", "Ana", "Gómez", Role::Cashier)
			.await
			.unwrap();

		let mut new = NewSale {
			customer_id: 1,
			employee_id: cashier.id,
			student_id: None,
			cash_session_id: None,
			kind: SaleKind::Credit,
			subtotal: Guaranies::new(20_000),
			discount: Guaranies::ZERO,
			total_amount: Guaranies::new(20_000),
			pending_balance: Guaranies::new(20_000),
			payment_state: PaymentState::Pending,
			authorized_by: None,
		};
		assert!(insert_sale(&mut conn, &new).await.is_err());

		new.authorized_by = Some(cashier.id);
		let sale = insert_sale(&mut conn, &new).await.unwrap();
		assert_eq!(sale.paid_percentage(), 0.0);

		let sale = set_pending(&mut conn, sale.id, Guaranies::new(5_000), PaymentState::Partial)
			.await
			.unwrap();
		assert_eq!(sale.paid_percentage(), 75.0);
		assert_eq!(list_open_credit_sales(&mut conn, 1).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_items_and_payments() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let cashier = insert_employee(&mut conn, "caja1", "hash", "Ana", "Gómez", Role::Cashier)
			.await
			.unwrap();
		let category = insert_category(&mut conn, "Bebidas", None).await.unwrap();
		let product = insert_product(
			&mut conn,
			&NewProduct {
				category_id: category.id,
				description: "Jugo de naranja".to_string(),
				price: Guaranies::new(6_000),
				vat_rate: 10,
				..Default::default()
			},
		)
		.await
		.unwrap();

		let sale = insert_sale(
			&mut conn,
			&NewSale {
				customer_id: 1,
				employee_id: cashier.id,
				student_id: None,
				cash_session_id: None,
				kind: SaleKind::Cash,
				subtotal: Guaranies::new(12_000),
				discount: Guaranies::ZERO,
				total_amount: Guaranies::new(12_000),
				pending_balance: Guaranies::ZERO,
				payment_state: PaymentState::Paid,
				authorized_by: None,
			},
		)
		.await
		.unwrap();
		insert_sale_item(&mut conn, sale.id, product.id, 2, Guaranies::new(6_000)).await.unwrap();
		assert!(insert_sale_item(&mut conn, sale.id, product.id, 1, Guaranies::new(6_000)).await.is_err());

		let payment = insert_sale_payment(&mut conn, sale.id, 1, Guaranies::new(12_000), None, None)
			.await
			.unwrap();
		assert_eq!(payment.method_kind, PaymentMethodKind::Cash);

		let items = list_sale_items(&mut conn, sale.id).await.unwrap();
		assert_eq!(items.len(), 1);
		assert_eq!(items[0].subtotal, Guaranies::new(12_000));
		assert_eq!(items[0].description, "Jugo de naranja");
	}
}
