//! Connection pool and migrations.

use std::str::FromStr;
use std::time::Duration;

use cantina_core::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

/// Shared handle to the SQLite database.
///
/// Cloning is cheap; every clone uses the same pool.
#[derive(Debug, Clone)]
pub struct Database {
	pool: SqlitePool,
}

impl Database {
	/// Connects to `url` with foreign keys enforced.
	pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
		let options = SqliteConnectOptions::from_str(url)?
			.create_if_missing(true)
			.foreign_keys(true)
			.busy_timeout(Duration::from_secs(5));
		let pool = SqlitePoolOptions::new()
			.max_connections(max_connections)
			.connect_with(options)
			.await?;
		tracing::info!(url = %url, max_connections, "database pool ready");
		Ok(Self { pool })
	}

	/// A private in-memory database with migrations applied.
	///
	/// Each in-memory connection is its own database, so the pool is
	/// limited to a single connection.
	pub async fn in_memory() -> Result<Self> {
		let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(options)
			.await?;
		let db = Self { pool };
		db.migrate().await?;
		Ok(db)
	}

	/// Applies pending migrations.
	pub async fn migrate(&self) -> Result<()> {
		sqlx::migrate!("./migrations").run(&self.pool).await?;
		tracing::info!("database migrations applied");
		Ok(())
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Starts a transaction. Dropping it without `commit` rolls back.
	pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
		Ok(self.pool.begin().await?)
	}

	/// Round-trips a trivial query.
	pub async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}

	pub async fn close(&self) {
		self.pool.close().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_in_memory_is_migrated_and_seeded() {
		let db = Database::in_memory().await.unwrap();
		db.ping().await.unwrap();

		let (methods,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payment_methods")
			.fetch_one(db.pool())
			.await
			.unwrap();
		assert_eq!(methods, 6);

		let (generic,): (String,) = sqlx::query_as("SELECT tax_id FROM customers WHERE is_generic = 1")
			.fetch_one(db.pool())
			.await
			.unwrap();
		assert_eq!(generic, "44444401-7");
	}

	#[tokio::test]
	async fn test_foreign_keys_are_enforced() {
		let db = Database::in_memory().await.unwrap();
		let result = sqlx::query(
			"INSERT INTO students (customer_id, first_name, last_name, created_at) VALUES (999, 'A', 'B', '2026-01-01T00:00:00Z')",
		)
		.execute(db.pool())
		.await;
		assert!(result.is_err());
	}
}
