//! Login lockout.

use chrono::{DateTime, Duration, Utc};

/// Refuses logins for an identity after `max_failures` failed attempts
/// inside the sliding `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginThrottle {
	pub max_failures: i64,
	pub window: Duration,
}

impl Default for LoginThrottle {
	fn default() -> Self {
		Self {
			max_failures: 5,
			window: Duration::minutes(15),
		}
	}
}

impl LoginThrottle {
	pub fn new(max_failures: i64, window_minutes: i64) -> Self {
		Self {
			max_failures,
			window: Duration::minutes(window_minutes),
		}
	}

	/// Oldest attempt time that still counts.
	pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
		now - self.window
	}

	pub fn is_locked(&self, recent_failures: i64) -> bool {
		recent_failures >= self.max_failures
	}
}
