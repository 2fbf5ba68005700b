//! Audit trail.

use cantina_core::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AuditEntry {
	pub id: i64,
	pub employee_id: Option<i64>,
	pub portal_user_id: Option<i64>,
	pub action: String,
	pub entity: String,
	pub entity_id: Option<String>,
	pub detail: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
	Employee(i64),
	PortalUser(i64),
	System,
}

pub async fn record(
	conn: &mut SqliteConnection,
	actor: Actor,
	action: &str,
	entity: &str,
	entity_id: impl ToString,
	detail: Option<&str>,
) -> Result<()> {
	let (employee_id, portal_user_id) = match actor {
		Actor::Employee(id) => (Some(id), None),
		Actor::PortalUser(id) => (None, Some(id)),
		Actor::System => (None, None),
	};
	sqlx::query(
		"INSERT INTO audit_log (employee_id, portal_user_id, action, entity, entity_id, detail, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?)",
	)
	.bind(employee_id)
	.bind(portal_user_id)
	.bind(action)
	.bind(entity)
	.bind(entity_id.to_string())
	.bind(detail)
	.bind(Utc::now())
	.execute(&mut *conn)
	.await?;
	Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
	pub employee_id: Option<i64>,
	pub entity: Option<String>,
	pub limit: Option<i64>,
}

pub async fn list(conn: &mut SqliteConnection, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
	Ok(sqlx::query_as::<_, AuditEntry>(
		"SELECT id, employee_id, portal_user_id, action, entity, entity_id, detail, created_at FROM audit_log
		 WHERE (?1 IS NULL OR employee_id = ?1) AND (?2 IS NULL OR entity = ?2)
		 ORDER BY id DESC LIMIT ?3",
	)
	.bind(filter.employee_id)
	.bind(&filter.entity)
	.bind(filter.limit.unwrap_or(200))
	.fetch_all(&mut *conn)
	.await?)
}
