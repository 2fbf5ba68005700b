//! Service-wide error type.
//!
//! Every fallible operation in the service returns [`Result`]. Each variant
//! carries the HTTP status it is rendered with, so the HTTP layer can turn any
//! error into a response without inspecting its origin.

use thiserror::Error;

/// Result type used throughout the service.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by business operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// Payload or field validation failed.
	#[error("Validation error: {0}")]
	Validation(String),

	/// Malformed request (unparseable body, bad path parameter).
	#[error("Bad request: {0}")]
	BadRequest(String),

	/// Missing or invalid credentials.
	#[error("Authentication failed: {0}")]
	Authentication(String),

	/// Authenticated, but the role does not allow the operation.
	#[error("Permission denied: {0}")]
	PermissionDenied(String),

	/// The requested entity does not exist.
	#[error("Not found: {0}")]
	NotFound(String),

	/// The operation conflicts with current state (duplicates, wrong state).
	#[error("Conflict: {0}")]
	Conflict(String),

	/// A card cannot cover the requested amount.
	#[error("Insufficient balance: {0}")]
	InsufficientBalance(String),

	/// A business rule rejected the operation.
	#[error("{0}")]
	BusinessRule(String),

	/// Storage failure.
	#[error("Database error: {0}")]
	Database(String),

	/// Anything else.
	#[error("Internal error: {0}")]
	Internal(String),
}

impl Error {
	/// HTTP status code this error is rendered with.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_core::Error;
	///
	/// assert_eq!(Error::NotFound("card 100".into()).status_code(), 404);
	/// assert_eq!(Error::InsufficientBalance("card 100".into()).status_code(), 422);
	/// ```
	pub fn status_code(&self) -> u16 {
		match self {
			Error::Validation(_) | Error::BadRequest(_) => 400,
			Error::Authentication(_) => 401,
			Error::PermissionDenied(_) => 403,
			Error::NotFound(_) => 404,
			Error::Conflict(_) => 409,
			Error::InsufficientBalance(_) | Error::BusinessRule(_) => 422,
			Error::Database(_) | Error::Internal(_) => 500,
		}
	}

	/// Whether the error is a server-side failure rather than a client mistake.
	pub fn is_server_error(&self) -> bool {
		self.status_code() >= 500
	}

	/// Message safe to return to a client.
	///
	/// Server errors are replaced with a generic message; their detail only goes
	/// to the logs.
	pub fn public_message(&self) -> String {
		if self.is_server_error() {
			"Internal server error".to_string()
		} else {
			self.to_string()
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(error: serde_json::Error) -> Self {
		Error::BadRequest(format!("Invalid JSON: {}", error))
	}
}

impl From<chrono::ParseError> for Error {
	fn from(error: chrono::ParseError) -> Self {
		Error::Validation(format!("Invalid date: {}", error))
	}
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for Error {
	fn from(error: sqlx::Error) -> Self {
		match &error {
			sqlx::Error::RowNotFound => Error::NotFound("Object not found".to_string()),
			sqlx::Error::Database(db) if db.is_unique_violation() => {
				Error::Conflict(format!("Duplicate entry: {}", db.message()))
			}
			sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
				Error::Validation(format!("Referenced entity does not exist: {}", db.message()))
			}
			sqlx::Error::Database(db) if db.is_check_violation() => {
				Error::Validation(format!("Constraint violated: {}", db.message()))
			}
			_ => Error::Database(error.to_string()),
		}
	}
}

#[cfg(feature = "sqlx")]
impl From<sqlx::migrate::MigrateError> for Error {
	fn from(error: sqlx::migrate::MigrateError) -> Self {
		Error::Database(format!("Migration failed: {}", error))
	}
}
