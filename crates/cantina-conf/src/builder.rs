//! Merges sources into [`Settings`].

use serde_json::{Map, Value};

use crate::settings::Settings;
use crate::sources::{ConfigSource, SourceError};
use crate::validation::{ValidationError, validate};

/// Error raised while loading settings.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Failed to load {source_name}: {error}")]
	Source {
		source_name: String,
		#[source]
		error: SourceError,
	},

	#[error("Invalid settings: {0}")]
	Deserialize(#[from] serde_json::Error),

	#[error(transparent)]
	Validation(#[from] ValidationError),
}

/// Collects sources and merges them by priority.
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Merges every source into one JSON object. Sources of equal priority
	/// apply in the order they were added.
	pub fn merge(&self) -> Result<Value, SettingsError> {
		let mut ordered: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| s.as_ref()).collect();
		ordered.sort_by_key(|s| s.priority());

		let mut merged = Value::Object(Map::new());
		for source in ordered {
			let values = source.load().map_err(|error| SettingsError::Source {
				source_name: source.description(),
				error,
			})?;
			tracing::debug!(source = %source.description(), keys = values.len(), "loaded settings source");
			let overlay = Value::Object(values.into_iter().collect());
			merge_into(&mut merged, overlay);
		}
		Ok(merged)
	}

	/// Merges, deserializes and validates.
	pub fn build(self) -> Result<Settings, SettingsError> {
		let merged = self.merge()?;
		let settings: Settings = serde_json::from_value(merged)?;
		validate(&settings)?;
		Ok(settings)
	}
}

/// Deep-merges `overlay` into `base`.
///
/// Scalars from untyped sources (environment variables) are coerced to a
/// string when the value they replace is a string, so a numeric-looking
/// secret still deserializes into a `String` field.
fn merge_into(base: &mut Value, overlay: Value) {
	match overlay {
		Value::Object(overlay_map) if base.is_object() => {
			if let Value::Object(base_map) = base {
				for (key, value) in overlay_map {
					match base_map.get_mut(&key) {
						Some(existing) => merge_into(existing, value),
						None => {
							base_map.insert(key, value);
						}
					}
				}
			}
		}
		Value::Number(_) | Value::Bool(_) if base.is_string() => {
			*base = Value::String(overlay.to_string());
		}
		other => *base = other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sources::DefaultSource;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_deep_merge_keeps_sibling_keys() {
		let mut base = json!({"server": {"host": "127.0.0.1", "port": 8000}});
		merge_into(&mut base, json!({"server": {"port": 9000}}));
		assert_eq!(base, json!({"server": {"host": "127.0.0.1", "port": 9000}}));
	}

	#[rstest]
	fn test_number_over_string_is_coerced() {
		let mut base = json!({"portal": {"gateway_secret": ""}});
		merge_into(&mut base, json!({"portal": {"gateway_secret": 123456}}));
		assert_eq!(base, json!({"portal": {"gateway_secret": "123456"}}));
	}

	#[rstest]
	fn test_higher_priority_wins_regardless_of_order() {
		struct Fixed(u8, Value);
		impl ConfigSource for Fixed {
			fn load(&self) -> Result<indexmap::IndexMap<String, Value>, SourceError> {
				Ok(self.1.as_object().cloned().unwrap_or_default().into_iter().collect())
			}
			fn priority(&self) -> u8 {
				self.0
			}
			fn description(&self) -> String {
				format!("fixed {}", self.0)
			}
		}

		let merged = SettingsBuilder::new()
			.add_source(Fixed(100, json!({"debug": true})))
			.add_source(DefaultSource::new().with_value("debug", json!(false)))
			.merge()
			.unwrap();
		assert_eq!(merged["debug"], json!(true));
	}

	#[rstest]
	fn test_build_rejects_invalid_types() {
		let result = SettingsBuilder::new()
			.add_source(DefaultSource::from_defaults().with_value("server", json!({"port": "not-a-port"})))
			.build();
		assert!(matches!(result, Err(SettingsError::Deserialize(_))));
	}
}
