//! # Cantina DB
//!
//! SQLite persistence for the canteen service: the embedded migrations, the
//! connection pool and one repository module per aggregate.
//!
//! Repository functions are plain `async fn`s over `&mut SqliteConnection`.
//! A service opens a transaction with [`Database::begin`] and passes
//! `&mut *tx` to every repository call it makes, so an operation that touches
//! balances, stock and numbering either commits as a whole or not at all.
//!
//! ```no_run
//! use cantina_db::Database;
//! use cantina_db::repositories::cards;
//!
//! # async fn example() -> cantina_core::Result<()> {
//! let db = Database::connect("sqlite://cantina.db?mode=rwc", 5).await?;
//! db.migrate().await?;
//!
//! let mut tx = db.begin().await?;
//! let card = cards::get_card(&mut tx, "1001").await?;
//! println!("balance: {}", card.balance);
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod repositories;

pub use connection::Database;
