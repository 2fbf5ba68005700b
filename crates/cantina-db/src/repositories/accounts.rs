//! Employees, portal users, sessions and login attempts.

use cantina_core::Result;
use cantina_core::enums::Role;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Employee {
	pub id: i64,
	pub username: String,
	#[serde(skip_serializing)]
	pub password_hash: String,
	pub first_name: String,
	pub last_name: String,
	#[sqlx(try_from = "String")]
	pub role: Role,
	pub active: bool,
	pub created_at: DateTime<Utc>,
}

impl Employee {
	pub fn full_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name)
	}
}

const EMPLOYEE_COLUMNS: &str = "id, username, password_hash, first_name, last_name, role, active, created_at";

pub async fn insert_employee(
	conn: &mut SqliteConnection,
	username: &str,
	password_hash: &str,
	first_name: &str,
	last_name: &str,
	role: Role,
) -> Result<Employee> {
	let sql = format!(
		"INSERT INTO employees (username, password_hash, first_name, last_name, role, created_at)
		 VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
		EMPLOYEE_COLUMNS
	);
	Ok(sqlx::query_as::<_, Employee>(&sql)
		.bind(username)
		.bind(password_hash)
		.bind(first_name)
		.bind(last_name)
		.bind(role.as_str())
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn find_employee(conn: &mut SqliteConnection, id: i64) -> Result<Option<Employee>> {
	let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
	Ok(sqlx::query_as::<_, Employee>(&sql).bind(id).fetch_optional(&mut *conn).await?)
}

pub async fn get_employee(conn: &mut SqliteConnection, id: i64) -> Result<Employee> {
	find_employee(conn, id).await?.ok_or_else(|| not_found("Employee", id))
}

pub async fn find_employee_by_username(conn: &mut SqliteConnection, username: &str) -> Result<Option<Employee>> {
	let sql = format!("SELECT {} FROM employees WHERE username = ?", EMPLOYEE_COLUMNS);
	Ok(sqlx::query_as::<_, Employee>(&sql).bind(username).fetch_optional(&mut *conn).await?)
}

pub async fn list_employees(conn: &mut SqliteConnection) -> Result<Vec<Employee>> {
	let sql = format!("SELECT {} FROM employees ORDER BY username", EMPLOYEE_COLUMNS);
	Ok(sqlx::query_as::<_, Employee>(&sql).fetch_all(&mut *conn).await?)
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeChanges {
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub role: Option<Role>,
	pub active: Option<bool>,
}

pub async fn update_employee(conn: &mut SqliteConnection, id: i64, changes: &EmployeeChanges) -> Result<Employee> {
	let sql = format!(
		"UPDATE employees SET
			first_name = COALESCE(?, first_name),
			last_name = COALESCE(?, last_name),
			role = COALESCE(?, role),
			active = COALESCE(?, active)
		 WHERE id = ? RETURNING {}",
		EMPLOYEE_COLUMNS
	);
	sqlx::query_as::<_, Employee>(&sql)
		.bind(&changes.first_name)
		.bind(&changes.last_name)
		.bind(changes.role.map(|r| r.as_str()))
		.bind(changes.active)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Employee", id))
}

pub async fn set_employee_password(conn: &mut SqliteConnection, id: i64, password_hash: &str) -> Result<()> {
	let result = sqlx::query("UPDATE employees SET password_hash = ? WHERE id = ?")
		.bind(password_hash)
		.bind(id)
		.execute(&mut *conn)
		.await?;
	if result.rows_affected() == 0 {
		return Err(not_found("Employee", id));
	}
	Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PortalUser {
	pub id: i64,
	pub customer_id: i64,
	pub email: String,
	#[serde(skip_serializing)]
	pub password_hash: String,
	pub active: bool,
	pub last_login_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

const PORTAL_USER_COLUMNS: &str = "id, customer_id, email, password_hash, active, last_login_at, created_at";

pub async fn insert_portal_user(
	conn: &mut SqliteConnection,
	customer_id: i64,
	email: &str,
	password_hash: &str,
) -> Result<PortalUser> {
	let sql = format!(
		"INSERT INTO portal_users (customer_id, email, password_hash, created_at) VALUES (?, ?, ?, ?) RETURNING {}",
		PORTAL_USER_COLUMNS
	);
	Ok(sqlx::query_as::<_, PortalUser>(&sql)
		.bind(customer_id)
		.bind(email.trim().to_lowercase())
		.bind(password_hash)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn find_portal_user(conn: &mut SqliteConnection, id: i64) -> Result<Option<PortalUser>> {
	let sql = format!("SELECT {} FROM portal_users WHERE id = ?", PORTAL_USER_COLUMNS);
	Ok(sqlx::query_as::<_, PortalUser>(&sql).bind(id).fetch_optional(&mut *conn).await?)
}

pub async fn find_portal_user_by_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<PortalUser>> {
	let sql = format!("SELECT {} FROM portal_users WHERE email = ?", PORTAL_USER_COLUMNS);
	Ok(sqlx::query_as::<_, PortalUser>(&sql)
		.bind(email.trim().to_lowercase())
		.fetch_optional(&mut *conn)
		.await?)
}

pub async fn set_portal_password(conn: &mut SqliteConnection, id: i64, password_hash: &str) -> Result<()> {
	sqlx::query("UPDATE portal_users SET password_hash = ? WHERE id = ?")
		.bind(password_hash)
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(())
}

pub async fn touch_portal_login(conn: &mut SqliteConnection, id: i64) -> Result<()> {
	sqlx::query("UPDATE portal_users SET last_login_at = ? WHERE id = ?")
		.bind(Utc::now())
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(())
}

/// Who a stored session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionRow {
	pub token: String,
	pub employee_id: Option<i64>,
	pub portal_user_id: Option<i64>,
	pub expires_at: DateTime<Utc>,
}

pub async fn insert_session(
	conn: &mut SqliteConnection,
	token: &str,
	employee_id: Option<i64>,
	portal_user_id: Option<i64>,
	expires_at: DateTime<Utc>,
) -> Result<()> {
	sqlx::query(
		"INSERT INTO sessions (token, employee_id, portal_user_id, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
	)
	.bind(token)
	.bind(employee_id)
	.bind(portal_user_id)
	.bind(Utc::now())
	.bind(expires_at)
	.execute(&mut *conn)
	.await?;
	Ok(())
}

/// The session for `token`, if it exists and has not expired.
pub async fn find_live_session(conn: &mut SqliteConnection, token: &str, now: DateTime<Utc>) -> Result<Option<SessionRow>> {
	let session = sqlx::query_as::<_, SessionRow>(
		"SELECT token, employee_id, portal_user_id, expires_at FROM sessions WHERE token = ?",
	)
	.bind(token)
	.fetch_optional(&mut *conn)
	.await?;
	Ok(session.filter(|s| s.expires_at > now))
}

pub async fn delete_session(conn: &mut SqliteConnection, token: &str) -> Result<bool> {
	let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
		.bind(token)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected() > 0)
}

pub async fn delete_expired_sessions(conn: &mut SqliteConnection, now: DateTime<Utc>) -> Result<u64> {
	let result = sqlx::query("DELETE FROM sessions WHERE julianday(expires_at) <= julianday(?)")
		.bind(now)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected())
}

/// Drops every session of a guardian, used after a password reset.
pub async fn delete_portal_sessions(conn: &mut SqliteConnection, portal_user_id: i64) -> Result<u64> {
	let result = sqlx::query("DELETE FROM sessions WHERE portal_user_id = ?")
		.bind(portal_user_id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected())
}

/// A stored password recovery token. Only the digest of the token is kept.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecoveryToken {
	pub id: i64,
	pub portal_user_id: i64,
	pub expires_at: DateTime<Utc>,
	pub used_at: Option<DateTime<Utc>>,
}

pub async fn insert_recovery_token(
	conn: &mut SqliteConnection,
	portal_user_id: i64,
	token_digest: &str,
	expires_at: DateTime<Utc>,
	requested_ip: Option<&str>,
) -> Result<()> {
	sqlx::query(
		"INSERT INTO recovery_tokens (portal_user_id, token_digest, created_at, expires_at, requested_ip)
		 VALUES (?, ?, ?, ?, ?)",
	)
	.bind(portal_user_id)
	.bind(token_digest)
	.bind(Utc::now())
	.bind(expires_at)
	.bind(requested_ip)
	.execute(&mut *conn)
	.await?;
	Ok(())
}

pub async fn find_recovery_token(conn: &mut SqliteConnection, token_digest: &str) -> Result<Option<RecoveryToken>> {
	Ok(sqlx::query_as::<_, RecoveryToken>(
		"SELECT id, portal_user_id, expires_at, used_at FROM recovery_tokens WHERE token_digest = ?",
	)
	.bind(token_digest)
	.fetch_optional(&mut *conn)
	.await?)
}

/// Marks every outstanding token of a guardian used.
pub async fn consume_recovery_tokens(conn: &mut SqliteConnection, portal_user_id: i64) -> Result<u64> {
	let result = sqlx::query("UPDATE recovery_tokens SET used_at = ? WHERE portal_user_id = ? AND used_at IS NULL")
		.bind(Utc::now())
		.bind(portal_user_id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected())
}

pub async fn delete_stale_recovery_tokens(conn: &mut SqliteConnection, now: DateTime<Utc>) -> Result<u64> {
	let result =
		sqlx::query("DELETE FROM recovery_tokens WHERE used_at IS NOT NULL OR julianday(expires_at) <= julianday(?)")
			.bind(now)
			.execute(&mut *conn)
			.await?;
	Ok(result.rows_affected())
}

/// Login realms, so an employee username and a portal email never share a
/// lockout counter.
pub const REALM_EMPLOYEE: &str = "EMPLOYEE";
pub const REALM_PORTAL: &str = "PORTAL";

pub async fn record_login_attempt(conn: &mut SqliteConnection, realm: &str, identity: &str, success: bool) -> Result<()> {
	sqlx::query("INSERT INTO login_attempts (identity, realm, success, attempted_at) VALUES (?, ?, ?, ?)")
		.bind(identity)
		.bind(realm)
		.bind(success)
		.bind(Utc::now())
		.execute(&mut *conn)
		.await?;
	Ok(())
}

/// Failed attempts since `since`, counted after the last success.
pub async fn recent_failures(
	conn: &mut SqliteConnection,
	realm: &str,
	identity: &str,
	since: DateTime<Utc>,
) -> Result<i64> {
	let (count,): (i64,) = sqlx::query_as(
		"SELECT COUNT(*) FROM login_attempts
		 WHERE realm = ?1 AND identity = ?2 AND success = 0
			AND julianday(attempted_at) >= julianday(?3)
			AND id > COALESCE((SELECT MAX(id) FROM login_attempts
				WHERE realm = ?1 AND identity = ?2 AND success = 1), 0)",
	)
	.bind(realm)
	.bind(identity)
	.bind(since)
	.fetch_one(&mut *conn)
	.await?;
	Ok(count)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;
	use chrono::Duration;

	#[tokio::test]
	async fn test_sessions_expire() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let employee = insert_employee(&mut conn, "cajero", "hash", "Juan", "Pérez", Role::Cashier)
			.await
			.unwrap();
		let now = Utc::now();

		insert_session(&mut conn, "live", Some(employee.id), None, now + Duration::hours(1)).await.unwrap();
		insert_session(&mut conn, "stale", Some(employee.id), None, now - Duration::hours(1)).await.unwrap();

		assert!(find_live_session(&mut conn, "live", now).await.unwrap().is_some());
		assert!(find_live_session(&mut conn, "stale", now).await.unwrap().is_none());
		assert_eq!(delete_expired_sessions(&mut conn, now).await.unwrap(), 1);
		assert!(delete_session(&mut conn, "live").await.unwrap());
	}

	#[tokio::test]
	async fn test_recovery_tokens_are_consumed_and_purged() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let (customer_id,): (i64,) = sqlx::query_as("SELECT id FROM customers WHERE is_generic = 1")
			.fetch_one(&mut *conn)
			.await
			.unwrap();
		let user = insert_portal_user(&mut conn, customer_id, "Padre@Example.com", "hash").await.unwrap();
		let now = Utc::now();

		insert_recovery_token(&mut conn, user.id, "digest-live", now + Duration::hours(2), Some("10.0.0.8"))
			.await
			.unwrap();
		insert_recovery_token(&mut conn, user.id, "digest-old", now - Duration::minutes(1), None)
			.await
			.unwrap();
		let live = find_recovery_token(&mut conn, "digest-live").await.unwrap().unwrap();
		assert_eq!(live.portal_user_id, user.id);
		assert!(live.used_at.is_none());

		assert_eq!(consume_recovery_tokens(&mut conn, user.id).await.unwrap(), 2);
		assert!(find_recovery_token(&mut conn, "digest-live").await.unwrap().unwrap().used_at.is_some());
		assert_eq!(delete_stale_recovery_tokens(&mut conn, now).await.unwrap(), 2);
		assert!(find_recovery_token(&mut conn, "digest-live").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_failures_reset_after_success() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let since = Utc::now() - Duration::minutes(15);

		for _ in 0..3 {
			record_login_attempt(&mut conn, REALM_EMPLOYEE, "cajero", false).await.unwrap();
		}
		record_login_attempt(&mut conn, REALM_PORTAL, "cajero", false).await.unwrap();
		assert_eq!(recent_failures(&mut conn, REALM_EMPLOYEE, "cajero", since).await.unwrap(), 3);

		record_login_attempt(&mut conn, REALM_EMPLOYEE, "cajero", true).await.unwrap();
		record_login_attempt(&mut conn, REALM_EMPLOYEE, "cajero", false).await.unwrap();
		assert_eq!(recent_failures(&mut conn, REALM_EMPLOYEE, "cajero", since).await.unwrap(), 1);
	}
}
