//! Settings validation.

use crate::settings::Settings;

/// Validation error
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
	#[error("Security error: {0}")]
	Security(String),

	#[error("Invalid value for '{key}': {message}")]
	InvalidValue { key: String, message: String },

	#[error("Multiple validation errors: {}", join(.0))]
	Multiple(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
	errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

fn invalid(key: &str, message: impl Into<String>) -> ValidationError {
	ValidationError::InvalidValue {
		key: key.to_string(),
		message: message.into(),
	}
}

/// Checks every section; all problems are reported together.
pub fn validate(settings: &Settings) -> Result<(), ValidationError> {
	let mut errors = Vec::new();

	if settings.server.port == 0 {
		errors.push(invalid("server.port", "must be between 1 and 65535"));
	}
	if settings.database.url.trim().is_empty() {
		errors.push(invalid("database.url", "must not be empty"));
	}
	if settings.database.max_connections == 0 {
		errors.push(invalid("database.max_connections", "must be at least 1"));
	}

	let business = &settings.business;
	if business.alert_threshold < 0 {
		errors.push(invalid("business.alert_threshold", "must not be negative"));
	}
	if business.notification_cooldown_hours < 0 {
		errors.push(invalid("business.notification_cooldown_hours", "must not be negative"));
	}
	if business.session_ttl_hours <= 0 {
		errors.push(invalid("business.session_ttl_hours", "must be positive"));
	}
	if business.max_failed_logins <= 0 {
		errors.push(invalid("business.max_failed_logins", "must be positive"));
	}
	if business.lockout_minutes <= 0 {
		errors.push(invalid("business.lockout_minutes", "must be positive"));
	}

	let portal = &settings.portal;
	if portal.min_recharge <= 0 {
		errors.push(invalid("portal.min_recharge", "must be positive"));
	}
	if portal.max_recharge < portal.min_recharge {
		errors.push(invalid("portal.max_recharge", "must not be lower than portal.min_recharge"));
	}
	if portal.recovery_token_ttl_minutes <= 0 {
		errors.push(invalid("portal.recovery_token_ttl_minutes", "must be positive"));
	}
	if !settings.debug && portal.gateway_secret.trim().is_empty() {
		errors.push(ValidationError::Security(
			"portal.gateway_secret must be set when debug is off".to_string(),
		));
	}

	if settings.tasks.enabled && settings.tasks.interval_secs == 0 {
		errors.push(invalid("tasks.interval_secs", "must be positive"));
	}

	match errors.len() {
		0 => Ok(()),
		1 => Err(errors.remove(0)),
		_ => Err(ValidationError::Multiple(errors)),
	}
}
