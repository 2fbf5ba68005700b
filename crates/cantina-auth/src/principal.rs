//! The authenticated caller of a request.

use cantina_core::enums::Role;
use cantina_core::{Error, Result};
use serde::Serialize;

/// Who a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
	/// Canteen staff using the back office or the point of sale.
	Employee { id: i64, username: String, role: Role },
	/// A parent using the portal; sees only the students of `customer_id`.
	Guardian { portal_user_id: i64, customer_id: i64, email: String },
}

impl Principal {
	pub fn employee_id(&self) -> Option<i64> {
		match self {
			Principal::Employee { id, .. } => Some(*id),
			Principal::Guardian { .. } => None,
		}
	}

	pub fn role(&self) -> Option<Role> {
		match self {
			Principal::Employee { role, .. } => Some(*role),
			Principal::Guardian { .. } => None,
		}
	}

	/// Returns the employee id when the caller holds at least `required`.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_auth::Principal;
	/// use cantina_core::enums::Role;
	///
	/// let manager = Principal::Employee { id: 2, username: "marta".into(), role: Role::Manager };
	/// assert_eq!(manager.require_role(Role::Cashier).unwrap(), 2);
	/// assert!(manager.require_role(Role::Administrator).is_err());
	/// ```
	pub fn require_role(&self, required: Role) -> Result<i64> {
		match self {
			Principal::Employee { id, role, .. } if role.includes(required) => Ok(*id),
			Principal::Employee { role, .. } => Err(Error::PermissionDenied(format!(
				"This operation requires the {} role (current role: {})",
				required, role
			))),
			Principal::Guardian { .. } => Err(Error::PermissionDenied(
				"This operation is only available to staff".to_string(),
			)),
		}
	}

	/// Returns `(portal_user_id, customer_id)` for portal callers.
	pub fn require_guardian(&self) -> Result<(i64, i64)> {
		match self {
			Principal::Guardian {
				portal_user_id,
				customer_id,
				..
			} => Ok((*portal_user_id, *customer_id)),
			Principal::Employee { .. } => Err(Error::PermissionDenied(
				"This operation is only available to portal users".to_string(),
			)),
		}
	}
}
