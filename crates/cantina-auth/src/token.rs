//! Opaque bearer tokens.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// A random session token, issued at login and sent back as
/// `Authorization: Bearer <token>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
	pub fn generate() -> Self {
		Self(uuid::Uuid::new_v4().simple().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}

impl fmt::Display for SessionToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Hex SHA-256 of a password recovery token.
///
/// Recovery tokens are stored by digest so a leaked table cannot be replayed.
///
/// # Examples
///
/// ```
/// use cantina_auth::token::recovery_digest;
///
/// let digest = recovery_digest("abc");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, recovery_digest("abc"));
/// assert_ne!(digest, recovery_digest("abd"));
/// ```
pub fn recovery_digest(token: &str) -> String {
	hex::encode(Sha256::digest(token.trim().as_bytes()))
}

/// Extracts the token from an `Authorization` header value.
///
/// # Examples
///
/// ```
/// use cantina_auth::token::bearer_token;
///
/// assert_eq!(bearer_token("Bearer abc123"), Some("abc123"));
/// assert_eq!(bearer_token("bearer abc123"), Some("abc123"));
/// assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
/// assert_eq!(bearer_token("Bearer "), None);
/// ```
pub fn bearer_token(header: &str) -> Option<&str> {
	let (scheme, token) = header.trim().split_once(' ')?;
	if !scheme.eq_ignore_ascii_case("bearer") {
		return None;
	}
	let token = token.trim();
	if token.is_empty() { None } else { Some(token) }
}

/// Expiry of a session issued at `now`.
pub fn expires_at(now: DateTime<Utc>, ttl_hours: i64) -> DateTime<Utc> {
	now + Duration::hours(ttl_hours)
}
