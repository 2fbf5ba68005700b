//! # Cantina
//!
//! Management service for a school canteen: counter sales with mixed
//! payments, prepaid student cards that may go negative under supervision,
//! promotions, dietary restrictions, lunch subscriptions and accounts,
//! stamped invoices and a portal where guardians follow and recharge their
//! children's cards.
//!
//! ## Layout
//!
//! - [`services`]: business operations, each one a database transaction
//! - [`apps`]: HTTP views and URL patterns, one module per area
//! - [`urls`]: the root router and the middleware chain
//! - [`tasks`]: periodic notification scans
//!
//! The building blocks live in the workspace crates: `cantina-core` (money,
//! enums, errors and pure business rules), `cantina-conf` (layered
//! settings), `cantina-auth` (hashing, tokens, signatures), `cantina-db`
//! (SQLite repositories) and `cantina-http` (router, middleware and server).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use cantina::state::AppState;
//! use cantina::urls::build_handler;
//! use cantina_conf::Settings;
//! use cantina_db::Database;
//!
//! # async fn run() -> cantina_core::Result<()> {
//! let settings = Settings::default();
//! let db = Database::connect(&settings.database.url, settings.database.max_connections).await?;
//! db.migrate().await?;
//! let state = AppState::new(db, settings);
//! let handler = build_handler(&state);
//! # let _ = handler;
//! # Ok(())
//! # }
//! ```

pub mod apps;
pub mod extract;
pub mod middleware;
pub mod services;
pub mod state;
pub mod tasks;
pub mod urls;

pub use state::AppState;
