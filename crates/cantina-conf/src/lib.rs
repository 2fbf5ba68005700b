//! # cantina-conf
//!
//! Layered settings for the cantina service.
//!
//! Values are merged from several [`ConfigSource`]s in priority order:
//! built-in defaults, then a TOML file, then `CANTINA_` environment
//! variables. Nested keys use a double underscore in the environment, so
//! `CANTINA_SERVER__PORT=9000` overrides `[server] port`.
//!
//! ```
//! use cantina_conf::{DefaultSource, SettingsBuilder};
//! use serde_json::Value;
//!
//! let settings = SettingsBuilder::new()
//!     .add_source(DefaultSource::from_defaults().with_value("debug", Value::Bool(true)))
//!     .build()
//!     .unwrap();
//! assert_eq!(settings.server.port, 8000);
//! ```

pub mod builder;
pub mod settings;
pub mod sources;
pub mod validation;

pub use builder::{SettingsBuilder, SettingsError};
pub use settings::{
	BusinessSettings, CompanySettings, DatabaseSettings, LogFormat, LoggingSettings,
	PortalSettings, ServerSettings, Settings, TaskSettings,
};
pub use sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
pub use validation::{ValidationError, validate};

/// Prefix of the environment variables read by [`Settings::load`].
pub const ENV_PREFIX: &str = "CANTINA_";

/// File read by [`Settings::load`] when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "cantina.toml";
