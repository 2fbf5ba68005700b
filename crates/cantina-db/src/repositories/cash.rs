//! Cash registers and their sessions.

use cantina_core::cash::Reconciliation;
use cantina_core::enums::CashSessionState;
use cantina_core::{Guaranies, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CashRegister {
	pub id: i64,
	pub name: String,
	pub location: Option<String>,
	pub active: bool,
}

pub async fn insert_register(conn: &mut SqliteConnection, name: &str, location: Option<&str>) -> Result<CashRegister> {
	Ok(sqlx::query_as::<_, CashRegister>(
		"INSERT INTO cash_registers (name, location) VALUES (?, ?) RETURNING id, name, location, active",
	)
	.bind(name)
	.bind(location)
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn list_registers(conn: &mut SqliteConnection) -> Result<Vec<CashRegister>> {
	Ok(sqlx::query_as::<_, CashRegister>("SELECT id, name, location, active FROM cash_registers ORDER BY name")
		.fetch_all(&mut *conn)
		.await?)
}

pub async fn get_register(conn: &mut SqliteConnection, id: i64) -> Result<CashRegister> {
	sqlx::query_as::<_, CashRegister>("SELECT id, name, location, active FROM cash_registers WHERE id = ?")
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Cash register", id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CashSession {
	pub id: i64,
	pub register_id: i64,
	pub employee_id: i64,
	pub opening_amount: Guaranies,
	pub opened_at: DateTime<Utc>,
	#[sqlx(try_from = "String")]
	pub state: CashSessionState,
	pub closed_by: Option<i64>,
	pub closed_at: Option<DateTime<Utc>>,
	pub counted_amount: Option<Guaranies>,
	pub expected_amount: Option<Guaranies>,
	pub difference: Option<Guaranies>,
	pub notes: Option<String>,
}

const SESSION_COLUMNS: &str = "id, register_id, employee_id, opening_amount, opened_at, state, closed_by, \
	closed_at, counted_amount, expected_amount, difference, notes";

pub async fn open_session(
	conn: &mut SqliteConnection,
	register_id: i64,
	employee_id: i64,
	opening_amount: Guaranies,
) -> Result<CashSession> {
	let sql = format!(
		"INSERT INTO cash_sessions (register_id, employee_id, opening_amount, opened_at)
		 VALUES (?, ?, ?, ?) RETURNING {}",
		SESSION_COLUMNS
	);
	Ok(sqlx::query_as::<_, CashSession>(&sql)
		.bind(register_id)
		.bind(employee_id)
		.bind(opening_amount)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn get_session(conn: &mut SqliteConnection, id: i64) -> Result<CashSession> {
	let sql = format!("SELECT {} FROM cash_sessions WHERE id = ?", SESSION_COLUMNS);
	sqlx::query_as::<_, CashSession>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Cash session", id))
}

pub async fn find_open_session(conn: &mut SqliteConnection, register_id: i64) -> Result<Option<CashSession>> {
	let sql = format!(
		"SELECT {} FROM cash_sessions WHERE register_id = ? AND state = 'OPEN'",
		SESSION_COLUMNS
	);
	Ok(sqlx::query_as::<_, CashSession>(&sql)
		.bind(register_id)
		.fetch_optional(&mut *conn)
		.await?)
}

/// Cash taken during a session: cash sale payments and confirmed cash recharges.
pub async fn session_cash_totals(conn: &mut SqliteConnection, session_id: i64) -> Result<(Guaranies, Guaranies)> {
	let (sales, recharges): (i64, i64) = sqlx::query_as(
		"SELECT
			COALESCE((SELECT SUM(sp.amount) FROM sale_payments sp
				JOIN sales s ON s.id = sp.sale_id
				JOIN payment_methods m ON m.id = sp.payment_method_id
				WHERE s.cash_session_id = ?1 AND s.state = 'PROCESSED' AND m.kind = 'CASH'), 0),
			COALESCE((SELECT SUM(amount) FROM recharges
				WHERE cash_session_id = ?1 AND source = 'CASH' AND state = 'CONFIRMED'), 0)",
	)
	.bind(session_id)
	.fetch_one(&mut *conn)
	.await?;
	Ok((Guaranies(sales), Guaranies(recharges)))
}

pub async fn close_session(
	conn: &mut SqliteConnection,
	id: i64,
	closed_by: i64,
	reconciliation: &Reconciliation,
	notes: Option<&str>,
) -> Result<CashSession> {
	let sql = format!(
		"UPDATE cash_sessions SET state = 'CLOSED', closed_by = ?, closed_at = ?, counted_amount = ?,
			expected_amount = ?, difference = ?, notes = ?
		 WHERE id = ? AND state = 'OPEN' RETURNING {}",
		SESSION_COLUMNS
	);
	sqlx::query_as::<_, CashSession>(&sql)
		.bind(closed_by)
		.bind(Utc::now())
		.bind(reconciliation.counted)
		.bind(reconciliation.expected)
		.bind(reconciliation.difference)
		.bind(notes)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Open cash session", id))
}

pub async fn list_sessions(conn: &mut SqliteConnection, from: NaiveDate, to: NaiveDate) -> Result<Vec<CashSession>> {
	let sql = format!(
		"SELECT {} FROM cash_sessions WHERE date(opened_at) BETWEEN ? AND ? ORDER BY opened_at DESC, id DESC",
		SESSION_COLUMNS
	);
	Ok(sqlx::query_as::<_, CashSession>(&sql)
		.bind(from)
		.bind(to)
		.fetch_all(&mut *conn)
		.await?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;
	use crate::repositories::accounts::insert_employee;
	use cantina_core::cash::reconcile;
	use cantina_core::enums::Role;
	use cantina_core::Error;

	#[tokio::test]
	async fn test_one_open_session_per_register() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let cashier = insert_employee(&mut conn, "caja1", "hash", "Ana", "Gómez", Role::Cashier)
			.await
			.unwrap();
		let register = insert_register(&mut conn, "Caja 1", Some("Planta baja")).await.unwrap();

		let session = open_session(&mut conn, register.id, cashier.id, Guaranies::new(100_000))
			.await
			.unwrap();
		let err = open_session(&mut conn, register.id, cashier.id, Guaranies::new(0))
			.await
			.unwrap_err();
		assert!(matches!(err, Error::Conflict(_)));

		let (sales, recharges) = session_cash_totals(&mut conn, session.id).await.unwrap();
		assert_eq!((sales, recharges), (Guaranies::ZERO, Guaranies::ZERO));

		let reconciliation = reconcile(session.opening_amount, sales, recharges, Guaranies::new(98_000));
		let closed = close_session(&mut conn, session.id, cashier.id, &reconciliation, None)
			.await
			.unwrap();
		assert_eq!(closed.state, CashSessionState::Closed);
		assert_eq!(closed.difference, Some(Guaranies::new(-2_000)));
		assert!(find_open_session(&mut conn, register.id).await.unwrap().is_none());
		assert!(close_session(&mut conn, session.id, cashier.id, &reconciliation, None).await.is_err());
	}
}
