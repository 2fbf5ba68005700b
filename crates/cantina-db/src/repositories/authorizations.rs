//! Negative balance authorizations.

use cantina_core::{Guaranies, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Authorization {
	pub id: i64,
	pub card_number: String,
	pub sale_id: Option<i64>,
	pub supervisor_id: i64,
	pub cashier_id: i64,
	pub previous_balance: Guaranies,
	pub amount: Guaranies,
	pub resulting_balance: Guaranies,
	pub reason: String,
	pub settled: bool,
	pub settled_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

const AUTHORIZATION_COLUMNS: &str = "id, card_number, sale_id, supervisor_id, cashier_id, previous_balance, \
	amount, resulting_balance, reason, settled, settled_at, created_at";

#[derive(Debug, Clone)]
pub struct NewAuthorization<'a> {
	pub card_number: &'a str,
	pub sale_id: Option<i64>,
	pub supervisor_id: i64,
	pub cashier_id: i64,
	pub previous_balance: Guaranies,
	pub amount: Guaranies,
	pub reason: &'a str,
}

pub async fn insert_authorization(conn: &mut SqliteConnection, new: &NewAuthorization<'_>) -> Result<Authorization> {
	let sql = format!(
		"INSERT INTO negative_balance_authorizations
			(card_number, sale_id, supervisor_id, cashier_id, previous_balance, amount, resulting_balance, reason, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
		AUTHORIZATION_COLUMNS
	);
	Ok(sqlx::query_as::<_, Authorization>(&sql)
		.bind(new.card_number)
		.bind(new.sale_id)
		.bind(new.supervisor_id)
		.bind(new.cashier_id)
		.bind(new.previous_balance)
		.bind(new.amount)
		.bind(new.previous_balance - new.amount)
		.bind(new.reason)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn list_unsettled(conn: &mut SqliteConnection, card_number: &str) -> Result<Vec<Authorization>> {
	let sql = format!(
		"SELECT {} FROM negative_balance_authorizations WHERE card_number = ? AND settled = 0 ORDER BY id",
		AUTHORIZATION_COLUMNS
	);
	Ok(sqlx::query_as::<_, Authorization>(&sql).bind(card_number).fetch_all(&mut *conn).await?)
}

/// Marks every open authorization of a card as settled.
pub async fn settle_all(conn: &mut SqliteConnection, card_number: &str) -> Result<u64> {
	let result = sqlx::query(
		"UPDATE negative_balance_authorizations SET settled = 1, settled_at = ?
		 WHERE card_number = ? AND settled = 0",
	)
	.bind(Utc::now())
	.bind(card_number)
	.execute(&mut *conn)
	.await?;
	Ok(result.rows_affected())
}

pub async fn list_in_range(
	conn: &mut SqliteConnection,
	from: NaiveDate,
	to: NaiveDate,
	unsettled_only: bool,
) -> Result<Vec<Authorization>> {
	let sql = format!(
		"SELECT {} FROM negative_balance_authorizations
		 WHERE date(created_at) BETWEEN ? AND ? AND (? = 0 OR settled = 0)
		 ORDER BY id DESC",
		AUTHORIZATION_COLUMNS
	);
	Ok(sqlx::query_as::<_, Authorization>(&sql)
		.bind(from)
		.bind(to)
		.bind(unsettled_only)
		.fetch_all(&mut *conn)
		.await?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;
	use crate::repositories::accounts::insert_employee;
	use crate::repositories::cards::insert_card;
	use crate::repositories::customers::{NewStudent, insert_student};
	use cantina_core::enums::Role;

	#[tokio::test]
	async fn test_settle_all_closes_open_authorizations() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let supervisor = insert_employee(&mut conn, "jefa", "hash", "Marta", "Ruiz", Role::Manager)
			.await
			.unwrap();
		let student = insert_student(
			&mut conn,
			&NewStudent {
				customer_id: 1,
				first_name: "Lucas".to_string(),
				last_name: "Benítez".to_string(),
				grade: "3B".to_string(),
				birth_date: None,
			},
		)
		.await
		.unwrap();
		insert_card(&mut conn, "1001", student.id, None, None).await.unwrap();

		let auth = insert_authorization(
			&mut conn,
			&NewAuthorization {
				card_number: "1001",
				sale_id: None,
				supervisor_id: supervisor.id,
				cashier_id: supervisor.id,
				previous_balance: Guaranies::new(2_000),
				amount: Guaranies::new(7_000),
				reason: "Olvidó recargar la tarjeta",
			},
		)
		.await
		.unwrap();
		assert_eq!(auth.resulting_balance, Guaranies::new(-5_000));
		assert!(!auth.settled);

		assert_eq!(settle_all(&mut conn, "1001").await.unwrap(), 1);
		assert!(list_unsettled(&mut conn, "1001").await.unwrap().is_empty());

		let today = Utc::now().date_naive();
		assert_eq!(list_in_range(&mut conn, today, today, false).await.unwrap().len(), 1);
		assert!(list_in_range(&mut conn, today, today, true).await.unwrap().is_empty());
	}
}
