//! Payment methods and their commission rates.

use cantina_core::commissions::CommissionRate;
use cantina_core::enums::PaymentMethodKind;
use cantina_core::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PaymentMethod {
	pub id: i64,
	pub name: String,
	#[sqlx(try_from = "String")]
	pub kind: PaymentMethodKind,
	pub generates_commission: bool,
	pub active: bool,
}

const METHOD_COLUMNS: &str = "id, name, kind, generates_commission, active";

pub async fn list_payment_methods(conn: &mut SqliteConnection, active_only: bool) -> Result<Vec<PaymentMethod>> {
	let sql = format!(
		"SELECT {} FROM payment_methods WHERE (? = 0 OR active = 1) ORDER BY id",
		METHOD_COLUMNS
	);
	Ok(sqlx::query_as::<_, PaymentMethod>(&sql).bind(active_only).fetch_all(&mut *conn).await?)
}

pub async fn get_payment_method(conn: &mut SqliteConnection, id: i64) -> Result<PaymentMethod> {
	let sql = format!("SELECT {} FROM payment_methods WHERE id = ?", METHOD_COLUMNS);
	sqlx::query_as::<_, PaymentMethod>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Payment method", id))
}

pub async fn insert_payment_method(
	conn: &mut SqliteConnection,
	name: &str,
	kind: PaymentMethodKind,
	generates_commission: bool,
) -> Result<PaymentMethod> {
	let sql = format!(
		"INSERT INTO payment_methods (name, kind, generates_commission) VALUES (?, ?, ?) RETURNING {}",
		METHOD_COLUMNS
	);
	Ok(sqlx::query_as::<_, PaymentMethod>(&sql)
		.bind(name)
		.bind(kind.as_str())
		.bind(generates_commission)
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn set_payment_method_active(conn: &mut SqliteConnection, id: i64, active: bool) -> Result<PaymentMethod> {
	let sql = format!("UPDATE payment_methods SET active = ? WHERE id = ? RETURNING {}", METHOD_COLUMNS);
	sqlx::query_as::<_, PaymentMethod>(&sql)
		.bind(active)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Payment method", id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CommissionRateRow {
	pub id: i64,
	pub payment_method_id: i64,
	pub basis_points: i64,
	pub fixed_amount: cantina_core::Guaranies,
	pub valid_from: DateTime<Utc>,
	pub valid_until: Option<DateTime<Utc>>,
}

impl From<CommissionRateRow> for CommissionRate {
	fn from(row: CommissionRateRow) -> Self {
		CommissionRate {
			id: row.id,
			basis_points: row.basis_points,
			fixed_amount: row.fixed_amount,
			valid_from: row.valid_from,
			valid_until: row.valid_until,
		}
	}
}

const RATE_COLUMNS: &str = "id, payment_method_id, basis_points, fixed_amount, valid_from, valid_until";

/// Adds a rate and closes the validity window of the one it replaces.
pub async fn insert_commission_rate(
	conn: &mut SqliteConnection,
	payment_method_id: i64,
	basis_points: i64,
	fixed_amount: cantina_core::Guaranies,
	valid_from: DateTime<Utc>,
) -> Result<CommissionRateRow> {
	sqlx::query(
		"UPDATE commission_rates SET valid_until = ?1
		 WHERE payment_method_id = ?2 AND valid_until IS NULL
			AND julianday(valid_from) < julianday(?1)",
	)
	.bind(valid_from)
	.bind(payment_method_id)
	.execute(&mut *conn)
	.await?;

	let sql = format!(
		"INSERT INTO commission_rates (payment_method_id, basis_points, fixed_amount, valid_from)
		 VALUES (?, ?, ?, ?) RETURNING {}",
		RATE_COLUMNS
	);
	Ok(sqlx::query_as::<_, CommissionRateRow>(&sql)
		.bind(payment_method_id)
		.bind(basis_points)
		.bind(fixed_amount)
		.bind(valid_from)
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn list_commission_rates(conn: &mut SqliteConnection, payment_method_id: i64) -> Result<Vec<CommissionRateRow>> {
	let sql = format!(
		"SELECT {} FROM commission_rates WHERE payment_method_id = ? ORDER BY valid_from DESC, id DESC",
		RATE_COLUMNS
	);
	Ok(sqlx::query_as::<_, CommissionRateRow>(&sql)
		.bind(payment_method_id)
		.fetch_all(&mut *conn)
		.await?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;
	use cantina_core::Guaranies;
	use chrono::Duration;

	#[tokio::test]
	async fn test_seeded_methods() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();

		let methods = list_payment_methods(&mut conn, true).await.unwrap();
		assert_eq!(methods.len(), 6);
		assert_eq!(methods[0].kind, PaymentMethodKind::Cash);
		assert!(!methods[0].generates_commission);
		assert!(methods.iter().any(|m| m.kind == PaymentMethodKind::CreditCard && m.generates_commission));
	}

	#[tokio::test]
	async fn test_new_rate_closes_previous() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let start = Utc::now() - Duration::days(30);
		let change = Utc::now() - Duration::days(1);

		insert_commission_rate(&mut conn, 4, 350, Guaranies::new(0), start).await.unwrap();
		insert_commission_rate(&mut conn, 4, 400, Guaranies::new(500), change).await.unwrap();

		let rates = list_commission_rates(&mut conn, 4).await.unwrap();
		assert_eq!(rates.len(), 2);
		assert_eq!(rates[0].basis_points, 400);
		assert!(rates[0].valid_until.is_none());
		assert!(rates[1].valid_until.is_some());

		let core: Vec<CommissionRate> = rates.into_iter().map(CommissionRate::from).collect();
		let current = cantina_core::commissions::current_rate(&core, Utc::now()).unwrap();
		assert_eq!(current.basis_points, 400);
	}
}
