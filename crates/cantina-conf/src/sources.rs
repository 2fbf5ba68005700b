//! Configuration sources for the layered settings.
//!
//! Each source produces a map of top-level keys to JSON values. Sections are
//! nested objects, so a TOML `[server]` table and `CANTINA_SERVER__PORT`
//! land in the same place.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

use crate::settings::Settings;

/// Separator between section and key in environment variable names.
const NESTING_SEPARATOR: &str = "__";

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Environment variable configuration source
pub struct EnvSource {
	prefix: Option<String>,
}

impl EnvSource {
	/// Create a source reading every environment variable.
	pub fn new() -> Self {
		Self { prefix: None }
	}

	/// Only read variables starting with `prefix`, which is stripped.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_conf::sources::EnvSource;
	///
	/// let source = EnvSource::new().with_prefix("CANTINA_");
	/// ```
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}

	/// Builds the nested map from `(name, value)` pairs.
	pub fn collect<I>(&self, vars: I) -> IndexMap<String, Value>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		let mut config = IndexMap::new();

		for (key, value) in vars {
			let clean_key = match &self.prefix {
				Some(prefix) => match key.strip_prefix(prefix.as_str()) {
					Some(rest) => rest,
					None => continue,
				},
				None => key.as_str(),
			};
			if clean_key.is_empty() {
				continue;
			}

			let path: Vec<String> = clean_key
				.to_lowercase()
				.split(NESTING_SEPARATOR)
				.map(str::to_string)
				.collect();
			insert_nested(&mut config, &path, parse_env_value(&value));
		}

		config
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.collect(std::env::vars()))
	}

	fn priority(&self) -> u8 {
		100 // Highest priority
	}

	fn description(&self) -> String {
		match &self.prefix {
			Some(prefix) => format!("Environment variables (prefix: {})", prefix),
			None => "Environment variables".to_string(),
		}
	}
}

fn parse_env_value(raw: &str) -> Value {
	let trimmed = raw.trim();
	match trimmed.to_lowercase().as_str() {
		"true" | "yes" | "on" => return Value::Bool(true),
		"false" | "no" | "off" => return Value::Bool(false),
		_ => {}
	}
	// "007" stays a string so leading zeros survive
	match trimmed.parse::<i64>() {
		Ok(num) if num.to_string() == trimmed => Value::Number(num.into()),
		_ => Value::String(raw.to_string()),
	}
}

fn insert_nested(config: &mut IndexMap<String, Value>, path: &[String], value: Value) {
	match path {
		[] => {}
		[key] => {
			config.insert(key.clone(), value);
		}
		[section, rest @ ..] => {
			let entry = config
				.entry(section.clone())
				.or_insert_with(|| Value::Object(Map::new()));
			if !entry.is_object() {
				*entry = Value::Object(Map::new());
			}
			if let Value::Object(child) = entry {
				insert_path(child, rest, value);
			}
		}
	}
}

fn insert_path(map: &mut Map<String, Value>, path: &[String], value: Value) {
	match path {
		[] => {}
		[key] => {
			map.insert(key.clone(), value);
		}
		[first, rest @ ..] => {
			let entry = map
				.entry(first.clone())
				.or_insert_with(|| Value::Object(Map::new()));
			if !entry.is_object() {
				*entry = Value::Object(Map::new());
			}
			if let Value::Object(child) = entry {
				insert_path(child, rest, value);
			}
		}
	}
}

/// TOML file configuration source. A missing file yields no values.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	/// # Examples
	///
	/// ```
	/// use cantina_conf::sources::TomlFileSource;
	///
	/// let source = TomlFileSource::new("cantina.toml");
	/// ```
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;

		// Convert TOML value to JSON value
		let json_value = serde_json::to_value(&toml_value)?;
		let map = json_value
			.as_object()
			.ok_or_else(|| SourceError::Parse("Expected table at root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50 // Medium priority
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	/// An empty source.
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// The built-in defaults of [`Settings`].
	pub fn from_defaults() -> Self {
		let values = match serde_json::to_value(Settings::default()) {
			Ok(Value::Object(map)) => map.into_iter().collect(),
			_ => IndexMap::new(),
		};
		Self { values }
	}

	/// Add a default value for a top-level key.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_conf::sources::DefaultSource;
	/// use serde_json::Value;
	///
	/// let source = DefaultSource::new().with_value("debug", Value::Bool(true));
	/// ```
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0 // Lowest priority
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}
