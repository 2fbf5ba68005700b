//! Guardian notifications.

use cantina_core::enums::NotificationKind;
use cantina_core::{Guaranies, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Notification {
	pub id: i64,
	pub customer_id: i64,
	pub student_id: Option<i64>,
	pub card_number: Option<String>,
	#[sqlx(try_from = "String")]
	pub kind: NotificationKind,
	pub title: String,
	pub message: String,
	pub balance: Guaranies,
	pub read: bool,
	pub created_at: DateTime<Utc>,
}

const NOTIFICATION_COLUMNS: &str =
	"id, customer_id, student_id, card_number, kind, title, message, balance, read, created_at";

#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
	pub customer_id: i64,
	pub student_id: Option<i64>,
	pub card_number: Option<&'a str>,
	pub kind: NotificationKind,
	pub title: &'a str,
	pub message: &'a str,
	pub balance: Guaranies,
}

pub async fn insert_notification(conn: &mut SqliteConnection, new: &NewNotification<'_>) -> Result<Notification> {
	let sql = format!(
		"INSERT INTO balance_notifications (customer_id, student_id, card_number, kind, title, message, balance, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
		NOTIFICATION_COLUMNS
	);
	Ok(sqlx::query_as::<_, Notification>(&sql)
		.bind(new.customer_id)
		.bind(new.student_id)
		.bind(new.card_number)
		.bind(new.kind.as_str())
		.bind(new.title)
		.bind(new.message)
		.bind(new.balance)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn list_for_customer(
	conn: &mut SqliteConnection,
	customer_id: i64,
	unread_only: bool,
) -> Result<Vec<Notification>> {
	let sql = format!(
		"SELECT {} FROM balance_notifications WHERE customer_id = ? AND (? = 0 OR read = 0)
		 ORDER BY created_at DESC, id DESC",
		NOTIFICATION_COLUMNS
	);
	Ok(sqlx::query_as::<_, Notification>(&sql)
		.bind(customer_id)
		.bind(unread_only)
		.fetch_all(&mut *conn)
		.await?)
}

/// Marks a notification read. Only the owning customer may do so.
pub async fn mark_read(conn: &mut SqliteConnection, customer_id: i64, id: i64) -> Result<()> {
	let result = sqlx::query("UPDATE balance_notifications SET read = 1 WHERE id = ? AND customer_id = ?")
		.bind(id)
		.bind(customer_id)
		.execute(&mut *conn)
		.await?;
	if result.rows_affected() == 0 {
		return Err(not_found("Notification", id));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;

	#[tokio::test]
	async fn test_only_owner_marks_read() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let created = insert_notification(
			&mut conn,
			&NewNotification {
				customer_id: 1,
				student_id: None,
				card_number: None,
				kind: NotificationKind::LowBalance,
				title: "Saldo bajo",
				message: "Saldo bajo",
				balance: Guaranies::new(5_000),
			},
		)
		.await
		.unwrap();

		assert!(mark_read(&mut conn, 2, created.id).await.is_err());
		assert_eq!(list_for_customer(&mut conn, 1, true).await.unwrap().len(), 1);

		mark_read(&mut conn, 1, created.id).await.unwrap();
		assert!(list_for_customer(&mut conn, 1, true).await.unwrap().is_empty());
		assert_eq!(list_for_customer(&mut conn, 1, false).await.unwrap().len(), 1);
	}
}
