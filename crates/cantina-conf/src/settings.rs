//! Typed settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::builder::{SettingsBuilder, SettingsError};
use crate::sources::{DefaultSource, EnvSource, TomlFileSource};
use crate::{DEFAULT_SETTINGS_FILE, ENV_PREFIX};

/// Every setting of the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Relaxes checks that only matter in production, such as the
	/// presence of the payment gateway secret.
	pub debug: bool,
	pub server: ServerSettings,
	pub database: DatabaseSettings,
	pub logging: LoggingSettings,
	pub business: BusinessSettings,
	pub company: CompanySettings,
	pub portal: PortalSettings,
	pub tasks: TaskSettings,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			debug: false,
			server: ServerSettings::default(),
			database: DatabaseSettings::default(),
			logging: LoggingSettings::default(),
			business: BusinessSettings::default(),
			company: CompanySettings::default(),
			portal: PortalSettings::default(),
			tasks: TaskSettings::default(),
		}
	}
}

impl Settings {
	/// Loads defaults, the TOML file at `path` (or `cantina.toml`) and the
	/// `CANTINA_` environment, then validates the result.
	pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
		let file = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
		SettingsBuilder::new()
			.add_source(DefaultSource::from_defaults())
			.add_source(TomlFileSource::new(file))
			.add_source(EnvSource::new().with_prefix(ENV_PREFIX))
			.build()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
	pub host: String,
	pub port: u16,
	/// Seconds in-flight requests get to finish after a shutdown signal.
	pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".to_string(),
			port: 8000,
			shutdown_timeout_secs: 30,
		}
	}
}

impl ServerSettings {
	pub fn address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
	pub url: String,
	pub max_connections: u32,
	/// Apply pending migrations when the server starts.
	pub migrate_on_start: bool,
}

impl Default for DatabaseSettings {
	fn default() -> Self {
		Self {
			url: "sqlite://cantina.db?mode=rwc".to_string(),
			max_connections: 5,
			migrate_on_start: true,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	Pretty,
	Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
	/// `tracing` filter directive; `RUST_LOG` takes precedence when set.
	pub level: String,
	pub format: LogFormat,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::Pretty,
		}
	}
}

/// Thresholds of the business rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessSettings {
	/// Low-balance alert threshold for cards without one of their own.
	pub alert_threshold: i64,
	pub notification_cooldown_hours: i64,
	pub session_ttl_hours: i64,
	pub max_failed_logins: i64,
	pub lockout_minutes: i64,
}

impl Default for BusinessSettings {
	fn default() -> Self {
		Self {
			alert_threshold: 10_000,
			notification_cooldown_hours: 24,
			session_ttl_hours: 12,
			max_failed_logins: 5,
			lockout_minutes: 15,
		}
	}
}

/// Header printed on tickets and invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanySettings {
	pub name: String,
	pub ruc: String,
	pub address: String,
	pub phone: String,
}

impl Default for CompanySettings {
	fn default() -> Self {
		Self {
			name: "Cantina Escolar".to_string(),
			ruc: "80012345-8".to_string(),
			address: "Asunción, Paraguay".to_string(),
			phone: String::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
	/// Shared secret of the payment gateway webhook (HMAC-SHA256).
	pub gateway_secret: String,
	pub min_recharge: i64,
	pub max_recharge: i64,
	/// Lifetime of a password recovery token.
	pub recovery_token_ttl_minutes: i64,
}

impl Default for PortalSettings {
	fn default() -> Self {
		Self {
			gateway_secret: String::new(),
			min_recharge: 1_000,
			max_recharge: 5_000_000,
			recovery_token_ttl_minutes: 120,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
	pub enabled: bool,
	pub interval_secs: u64,
}

impl Default for TaskSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			interval_secs: 3_600,
		}
	}
}
