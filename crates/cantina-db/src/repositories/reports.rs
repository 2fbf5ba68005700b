//! Read-only aggregates for the management reports.
//!
//! Date filters compare `date(column)` so a range is inclusive of whole days
//! regardless of the time of day stored.

use cantina_core::{Guaranies, Result};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct SalesSummary {
	pub count: i64,
	pub subtotal: Guaranies,
	pub discount: Guaranies,
	pub total: Guaranies,
	pub pending: Guaranies,
}

/// Processed sales of one day.
pub async fn daily_sales(conn: &mut SqliteConnection, day: NaiveDate) -> Result<SalesSummary> {
	Ok(sqlx::query_as::<_, SalesSummary>(
		"SELECT COUNT(*) AS count,
			COALESCE(SUM(subtotal), 0) AS subtotal,
			COALESCE(SUM(discount), 0) AS discount,
			COALESCE(SUM(total_amount), 0) AS total,
			COALESCE(SUM(pending_balance), 0) AS pending
		 FROM sales WHERE state = 'PROCESSED' AND date(created_at) = ?",
	)
	.bind(day)
	.fetch_one(&mut *conn)
	.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct MethodTotal {
	pub payment_method_id: i64,
	pub method: String,
	pub payments: i64,
	pub amount: Guaranies,
}

pub async fn sales_by_method(conn: &mut SqliteConnection, from: NaiveDate, to: NaiveDate) -> Result<Vec<MethodTotal>> {
	Ok(sqlx::query_as::<_, MethodTotal>(
		"SELECT m.id AS payment_method_id, m.name AS method, COUNT(sp.id) AS payments,
			COALESCE(SUM(sp.amount), 0) AS amount
		 FROM sale_payments sp
		 JOIN sales s ON s.id = sp.sale_id
		 JOIN payment_methods m ON m.id = sp.payment_method_id
		 WHERE s.state = 'PROCESSED' AND date(s.created_at) BETWEEN ? AND ?
		 GROUP BY m.id, m.name ORDER BY amount DESC",
	)
	.bind(from)
	.bind(to)
	.fetch_all(&mut *conn)
	.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TopProduct {
	pub product_id: i64,
	pub description: String,
	pub quantity: i64,
	pub amount: Guaranies,
}

pub async fn top_products(
	conn: &mut SqliteConnection,
	from: NaiveDate,
	to: NaiveDate,
	limit: i64,
) -> Result<Vec<TopProduct>> {
	Ok(sqlx::query_as::<_, TopProduct>(
		"SELECT p.id AS product_id, p.description, SUM(i.quantity) AS quantity, SUM(i.subtotal) AS amount
		 FROM sale_items i
		 JOIN sales s ON s.id = i.sale_id
		 JOIN products p ON p.id = i.product_id
		 WHERE s.state = 'PROCESSED' AND date(s.created_at) BETWEEN ? AND ?
		 GROUP BY p.id, p.description
		 ORDER BY quantity DESC, amount DESC
		 LIMIT ?",
	)
	.bind(from)
	.bind(to)
	.bind(limit)
	.fetch_all(&mut *conn)
	.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct NegativeCard {
	pub card_number: String,
	pub student_id: i64,
	pub student: String,
	pub customer_id: i64,
	pub balance: Guaranies,
	pub credit_limit: Guaranies,
}

pub async fn negative_cards(conn: &mut SqliteConnection) -> Result<Vec<NegativeCard>> {
	Ok(sqlx::query_as::<_, NegativeCard>(
		"SELECT c.card_number, c.student_id, s.first_name || ' ' || s.last_name AS student, s.customer_id,
			c.balance, c.credit_limit
		 FROM cards c JOIN students s ON s.id = c.student_id
		 WHERE c.balance < 0 ORDER BY c.balance",
	)
	.fetch_all(&mut *conn)
	.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CommissionTotal {
	pub payment_method_id: i64,
	pub method: String,
	pub payments: i64,
	pub amount: Guaranies,
	pub commission: Guaranies,
}

pub async fn commissions_by_method(
	conn: &mut SqliteConnection,
	from: NaiveDate,
	to: NaiveDate,
) -> Result<Vec<CommissionTotal>> {
	Ok(sqlx::query_as::<_, CommissionTotal>(
		"SELECT m.id AS payment_method_id, m.name AS method, COUNT(sc.id) AS payments,
			COALESCE(SUM(sc.amount), 0) AS amount, COALESCE(SUM(sc.commission), 0) AS commission
		 FROM sale_commissions sc
		 JOIN sale_payments sp ON sp.id = sc.sale_payment_id
		 JOIN sales s ON s.id = sp.sale_id
		 JOIN payment_methods m ON m.id = sp.payment_method_id
		 WHERE s.state = 'PROCESSED' AND date(s.created_at) BETWEEN ? AND ?
		 GROUP BY m.id, m.name ORDER BY commission DESC",
	)
	.bind(from)
	.bind(to)
	.fetch_all(&mut *conn)
	.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LunchMonth {
	pub lunch_type_id: i64,
	pub lunch_type: String,
	pub lunches: i64,
	pub charged_to_card: i64,
	pub amount: Guaranies,
}

/// Served lunches of a month grouped by lunch type.
pub async fn lunch_consumption(
	conn: &mut SqliteConnection,
	first_day: NaiveDate,
	next_first_day: NaiveDate,
) -> Result<Vec<LunchMonth>> {
	Ok(sqlx::query_as::<_, LunchMonth>(
		"SELECT t.id AS lunch_type_id, t.name AS lunch_type, COUNT(r.id) AS lunches,
			COALESCE(SUM(r.charged_to_card), 0) AS charged_to_card, COALESCE(SUM(r.amount), 0) AS amount
		 FROM lunch_records r JOIN lunch_types t ON t.id = r.lunch_type_id
		 WHERE r.served_on >= ? AND r.served_on < ?
		 GROUP BY t.id, t.name ORDER BY lunches DESC",
	)
	.bind(first_day)
	.bind(next_first_day)
	.fetch_all(&mut *conn)
	.await?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;
	use crate::repositories::accounts::insert_employee;
	use crate::repositories::catalog::{NewProduct, insert_category, insert_product};
	use crate::repositories::sales::{NewSale, insert_sale, insert_sale_item, insert_sale_payment, void_sale};
	use cantina_core::enums::{PaymentState, Role, SaleKind};
	use chrono::Utc;

	#[tokio::test]
	async fn test_voided_sales_are_excluded() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let cashier = insert_employee(&mut conn, "caja1", "hash", "Ana", "Gómez", Role::Manager)
			.await
			.unwrap();
		let category = insert_category(&mut conn, "Snacks", None).await.unwrap();
		let product = insert_product(
			&mut conn,
			&NewProduct {
				category_id: category.id,
				description: "Chipa".to_string(),
				price: Guaranies::new(3_000),
				vat_rate: 10,
				..Default::default()
			},
		)
		.await
		.unwrap();

		let mut sale_ids = Vec::new();
		for quantity in [2, 3] {
			let total = Guaranies::new(3_000).times(quantity);
			let sale = insert_sale(
				&mut conn,
				&NewSale {
					customer_id: 1,
					employee_id: cashier.id,
					student_id: None,
					cash_session_id: None,
					kind: SaleKind::Cash,
					subtotal: total,
					discount: Guaranies::ZERO,
					total_amount: total,
					pending_balance: Guaranies::ZERO,
					payment_state: PaymentState::Paid,
					authorized_by: None,
				},
			)
			.await
			.unwrap();
			insert_sale_item(&mut conn, sale.id, product.id, quantity, Guaranies::new(3_000))
				.await
				.unwrap();
			insert_sale_payment(&mut conn, sale.id, 1, total, None, None).await.unwrap();
			sale_ids.push(sale.id);
		}
		void_sale(&mut conn, sale_ids[1], cashier.id, "Error de carga").await.unwrap();

		let today = Utc::now().date_naive();
		let summary = daily_sales(&mut conn, today).await.unwrap();
		assert_eq!(summary.count, 1);
		assert_eq!(summary.total, Guaranies::new(6_000));

		let methods = sales_by_method(&mut conn, today, today).await.unwrap();
		assert_eq!(methods.len(), 1);
		assert_eq!(methods[0].method, "Efectivo");

		let top = top_products(&mut conn, today, today, 10).await.unwrap();
		assert_eq!(top[0].quantity, 2);
	}
}
