//! Shared application state handed to every view.

use std::sync::Arc;

use cantina_auth::{Argon2Hasher, PasswordHasher};
use cantina_conf::Settings;
use cantina_db::Database;
use chrono::{DateTime, Local, NaiveDate};

#[derive(Clone)]
pub struct AppState {
	pub db: Database,
	pub settings: Arc<Settings>,
	pub hasher: Arc<dyn PasswordHasher>,
}

impl AppState {
	pub fn new(db: Database, settings: Settings) -> Self {
		Self {
			db,
			settings: Arc::new(settings),
			hasher: Arc::new(Argon2Hasher::new()),
		}
	}

	pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
		self.hasher = hasher;
		self
	}

	/// Wall-clock time of the canteen. Promotions and card expiry follow local
	/// dates.
	pub fn now(&self) -> DateTime<Local> {
		Local::now()
	}

	pub fn today(&self) -> NaiveDate {
		self.now().date_naive()
	}
}

impl std::fmt::Debug for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppState")
			.field("db", &self.db)
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}
