//! Logins, sessions and credentials.

use cantina_auth::hasher::validate_password;
use cantina_auth::token::{self, SessionToken};
use cantina_auth::{LoginThrottle, Principal};
use cantina_core::enums::Role;
use cantina_core::{Error, Result};
use cantina_db::Database;
use cantina_db::repositories::accounts::{self, Employee, EmployeeChanges, PortalUser, REALM_EMPLOYEE, REALM_PORTAL};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::customers;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use validator::Validate;

use crate::state::AppState;

/// A freshly issued session.
#[derive(Debug, Clone, Serialize)]
pub struct Login {
	pub token: String,
	pub expires_at: DateTime<Utc>,
	pub principal: Principal,
}

fn throttle(state: &AppState) -> LoginThrottle {
	LoginThrottle::new(
		state.settings.business.max_failed_logins,
		state.settings.business.lockout_minutes,
	)
}

fn invalid_credentials() -> Error {
	Error::Authentication("Invalid credentials".to_string())
}

async fn check_lockout(conn: &mut SqliteConnection, state: &AppState, realm: &str, identity: &str) -> Result<()> {
	let throttle = throttle(state);
	let failures = accounts::recent_failures(conn, realm, identity, throttle.window_start(Utc::now())).await?;
	if throttle.is_locked(failures) {
		tracing::warn!(realm, identity, failures, "login refused while locked out");
		return Err(Error::Authentication(
			"Too many failed login attempts; try again later".to_string(),
		));
	}
	Ok(())
}

async fn open_session(
	conn: &mut SqliteConnection,
	state: &AppState,
	employee_id: Option<i64>,
	portal_user_id: Option<i64>,
) -> Result<(String, DateTime<Utc>)> {
	let token = SessionToken::generate();
	let expires_at = token::expires_at(Utc::now(), state.settings.business.session_ttl_hours);
	accounts::insert_session(conn, token.as_str(), employee_id, portal_user_id, expires_at).await?;
	Ok((token.into_inner(), expires_at))
}

/// Staff login by username.
pub async fn login_employee(state: &AppState, username: &str, password: &str) -> Result<Login> {
	let username = username.trim();
	let mut tx = state.db.begin().await?;
	check_lockout(&mut tx, state, REALM_EMPLOYEE, username).await?;

	let employee = accounts::find_employee_by_username(&mut tx, username).await?;
	let verified = match &employee {
		Some(employee) if employee.active => state.hasher.verify(password, &employee.password_hash)?,
		_ => false,
	};
	accounts::record_login_attempt(&mut tx, REALM_EMPLOYEE, username, verified).await?;

	let employee = match employee {
		Some(employee) if verified => employee,
		_ => {
			// The failed attempt must survive the rejection.
			tx.commit().await?;
			tracing::warn!(username, "employee login failed");
			return Err(invalid_credentials());
		}
	};

	let (token, expires_at) = open_session(&mut tx, state, Some(employee.id), None).await?;
	audit::record(&mut tx, Actor::Employee(employee.id), "LOGIN", "employee", employee.id, None).await?;
	tx.commit().await?;

	tracing::info!(employee_id = employee.id, username, "employee logged in");
	Ok(Login {
		token,
		expires_at,
		principal: Principal::Employee {
			id: employee.id,
			username: employee.username,
			role: employee.role,
		},
	})
}

/// Guardian login by e-mail.
pub async fn login_guardian(state: &AppState, email: &str, password: &str) -> Result<Login> {
	let email = email.trim().to_lowercase();
	let mut tx = state.db.begin().await?;
	check_lockout(&mut tx, state, REALM_PORTAL, &email).await?;

	let user = accounts::find_portal_user_by_email(&mut tx, &email).await?;
	let verified = match &user {
		Some(user) if user.active => state.hasher.verify(password, &user.password_hash)?,
		_ => false,
	};
	accounts::record_login_attempt(&mut tx, REALM_PORTAL, &email, verified).await?;

	let user = match user {
		Some(user) if verified => user,
		_ => {
			tx.commit().await?;
			tracing::warn!(email = %email, "portal login failed");
			return Err(invalid_credentials());
		}
	};

	let (token, expires_at) = open_session(&mut tx, state, None, Some(user.id)).await?;
	accounts::touch_portal_login(&mut tx, user.id).await?;
	audit::record(&mut tx, Actor::PortalUser(user.id), "LOGIN", "portal_user", user.id, None).await?;
	tx.commit().await?;

	tracing::info!(portal_user_id = user.id, "guardian logged in");
	Ok(Login {
		token,
		expires_at,
		principal: Principal::Guardian {
			portal_user_id: user.id,
			customer_id: user.customer_id,
			email: user.email,
		},
	})
}

/// Maps a live session token to its principal.
pub async fn resolve_session(db: &Database, token: &str) -> Result<Principal> {
	let mut conn = db.pool().acquire().await?;
	let session = accounts::find_live_session(&mut conn, token, Utc::now())
		.await?
		.ok_or_else(|| Error::Authentication("Invalid or expired token".to_string()))?;

	match (session.employee_id, session.portal_user_id) {
		(Some(id), _) => {
			let employee = accounts::get_employee(&mut conn, id).await?;
			if !employee.active {
				return Err(Error::Authentication("Account is disabled".to_string()));
			}
			Ok(Principal::Employee {
				id: employee.id,
				username: employee.username,
				role: employee.role,
			})
		}
		(None, Some(id)) => {
			let user = accounts::find_portal_user(&mut conn, id)
				.await?
				.filter(|user| user.active)
				.ok_or_else(|| Error::Authentication("Account is disabled".to_string()))?;
			Ok(Principal::Guardian {
				portal_user_id: user.id,
				customer_id: user.customer_id,
				email: user.email,
			})
		}
		(None, None) => Err(Error::Internal("Session has no owner".to_string())),
	}
}

pub async fn logout(db: &Database, token: &str) -> Result<()> {
	let mut conn = db.pool().acquire().await?;
	if accounts::delete_session(&mut conn, token).await? {
		tracing::info!("session closed");
	}
	Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewEmployeeInput {
	#[validate(length(min = 3, max = 50, message = "must be between 3 and 50 characters"))]
	pub username: String,
	pub password: String,
	#[validate(length(min = 1, message = "is required"))]
	pub first_name: String,
	#[validate(length(min = 1, message = "is required"))]
	pub last_name: String,
	pub role: Role,
}

pub async fn create_employee(state: &AppState, actor: Actor, input: &NewEmployeeInput) -> Result<Employee> {
	validate_password(&input.password)?;
	let hash = state.hasher.hash(&input.password)?;

	let mut tx = state.db.begin().await?;
	let employee = accounts::insert_employee(
		&mut tx,
		input.username.trim(),
		&hash,
		input.first_name.trim(),
		input.last_name.trim(),
		input.role,
	)
	.await?;
	audit::record(
		&mut tx,
		actor,
		"CREATE_EMPLOYEE",
		"employee",
		employee.id,
		Some(&format!("{} ({})", employee.username, employee.role)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(employee_id = employee.id, username = %employee.username, role = %employee.role, "employee created");
	Ok(employee)
}

pub async fn update_employee(
	state: &AppState,
	admin_id: i64,
	employee_id: i64,
	changes: &EmployeeChanges,
) -> Result<Employee> {
	if admin_id == employee_id && changes.active == Some(false) {
		return Err(Error::BusinessRule("You cannot deactivate your own account".to_string()));
	}
	let mut tx = state.db.begin().await?;
	let employee = accounts::update_employee(&mut tx, employee_id, changes).await?;
	audit::record(
		&mut tx,
		Actor::Employee(admin_id),
		"UPDATE_EMPLOYEE",
		"employee",
		employee.id,
		Some(&format!("role {}, active {}", employee.role, employee.active)),
	)
	.await?;
	tx.commit().await?;
	Ok(employee)
}

pub async fn reset_employee_password(state: &AppState, admin_id: i64, employee_id: i64, password: &str) -> Result<()> {
	validate_password(password)?;
	let hash = state.hasher.hash(password)?;

	let mut tx = state.db.begin().await?;
	accounts::get_employee(&mut tx, employee_id).await?;
	accounts::set_employee_password(&mut tx, employee_id, &hash).await?;
	audit::record(&mut tx, Actor::Employee(admin_id), "RESET_PASSWORD", "employee", employee_id, None).await?;
	tx.commit().await?;
	Ok(())
}

/// Gives a customer access to the parent portal.
pub async fn create_portal_user(
	state: &AppState,
	employee_id: i64,
	customer_id: i64,
	email: &str,
	password: &str,
) -> Result<PortalUser> {
	validate_password(password)?;
	let hash = state.hasher.hash(password)?;

	let mut tx = state.db.begin().await?;
	let customer = customers::get_customer(&mut tx, customer_id).await?;
	if customer.is_generic {
		return Err(Error::BusinessRule(
			"The generic customer cannot have a portal account".to_string(),
		));
	}
	let user = accounts::insert_portal_user(&mut tx, customer.id, &email.trim().to_lowercase(), &hash).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_PORTAL_USER",
		"portal_user",
		user.id,
		Some(&user.email),
	)
	.await?;
	tx.commit().await?;
	Ok(user)
}

/// A guardian changing their own password.
pub async fn change_portal_password(
	state: &AppState,
	portal_user_id: i64,
	current_password: &str,
	new_password: &str,
) -> Result<()> {
	validate_password(new_password)?;

	let mut tx = state.db.begin().await?;
	let user = accounts::find_portal_user(&mut tx, portal_user_id)
		.await?
		.ok_or_else(|| Error::NotFound(format!("Portal user {} not found", portal_user_id)))?;
	if !state.hasher.verify(current_password, &user.password_hash)? {
		return Err(Error::Authentication("Current password is incorrect".to_string()));
	}
	let hash = state.hasher.hash(new_password)?;
	accounts::set_portal_password(&mut tx, user.id, &hash).await?;
	audit::record(&mut tx, Actor::PortalUser(user.id), "CHANGE_PASSWORD", "portal_user", user.id, None).await?;
	tx.commit().await?;
	Ok(())
}

/// Starts a password recovery for a guardian.
///
/// Unknown or inactive addresses get the same silent answer as real ones.
/// Mail delivery is not wired in, so the token goes to the log. Returns the
/// token for callers that deliver it themselves.
pub async fn request_portal_password_reset(
	state: &AppState,
	email: &str,
	requested_ip: Option<&str>,
) -> Result<Option<String>> {
	let email = email.trim().to_lowercase();
	let mut tx = state.db.begin().await?;
	let user = accounts::find_portal_user_by_email(&mut tx, &email).await?;
	let Some(user) = user.filter(|user| user.active) else {
		tracing::info!(email = %email, "password recovery requested for unknown account");
		return Ok(None);
	};

	let token = SessionToken::generate();
	let expires_at = Utc::now() + Duration::minutes(state.settings.portal.recovery_token_ttl_minutes);
	accounts::insert_recovery_token(
		&mut tx,
		user.id,
		&token::recovery_digest(token.as_str()),
		expires_at,
		requested_ip,
	)
	.await?;
	audit::record(
		&mut tx,
		Actor::PortalUser(user.id),
		"REQUEST_PASSWORD_RESET",
		"portal_user",
		user.id,
		requested_ip,
	)
	.await?;
	tx.commit().await?;

	tracing::info!(
		portal_user_id = user.id,
		email = %user.email,
		token = %token,
		expires_at = %expires_at,
		"password recovery token issued"
	);
	Ok(Some(token.into_inner()))
}

/// Sets a new guardian password from a recovery token.
///
/// The token is single use: every outstanding token of the guardian is
/// consumed and their open sessions are closed.
pub async fn reset_portal_password(state: &AppState, token: &str, new_password: &str) -> Result<()> {
	validate_password(new_password)?;
	let digest = token::recovery_digest(token);

	let mut tx = state.db.begin().await?;
	let now = Utc::now();
	let stored = accounts::find_recovery_token(&mut tx, &digest)
		.await?
		.filter(|stored| stored.used_at.is_none() && stored.expires_at > now)
		.ok_or_else(|| Error::BadRequest("Invalid or expired recovery token".to_string()))?;
	let hash = state.hasher.hash(new_password)?;
	accounts::set_portal_password(&mut tx, stored.portal_user_id, &hash).await?;
	accounts::consume_recovery_tokens(&mut tx, stored.portal_user_id).await?;
	let sessions = accounts::delete_portal_sessions(&mut tx, stored.portal_user_id).await?;
	audit::record(
		&mut tx,
		Actor::PortalUser(stored.portal_user_id),
		"RESET_PASSWORD",
		"portal_user",
		stored.portal_user_id,
		None,
	)
	.await?;
	tx.commit().await?;

	tracing::info!(portal_user_id = stored.portal_user_id, sessions, "portal password reset");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::testing::{TestEnv, env};
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_employee_login_and_session(#[future] env: TestEnv) {
		let env = env.await;
		let login = login_employee(&env.state, "cajera", "cajera-2026").await.unwrap();

		let principal = resolve_session(&env.state.db, &login.token).await.unwrap();
		assert_eq!(principal.role(), Some(Role::Cashier));

		logout(&env.state.db, &login.token).await.unwrap();
		let error = resolve_session(&env.state.db, &login.token).await.unwrap_err();
		assert_eq!(error.status_code(), 401);
	}

	#[rstest]
	#[tokio::test]
	async fn test_lockout_after_repeated_failures(#[future] env: TestEnv) {
		let env = env.await;
		for _ in 0..env.state.settings.business.max_failed_logins {
			let error = login_employee(&env.state, "cajera", "wrong-password").await.unwrap_err();
			assert_eq!(error.to_string(), "Authentication failed: Invalid credentials");
		}

		let error = login_employee(&env.state, "cajera", "cajera-2026").await.unwrap_err();
		assert!(error.to_string().contains("Too many failed login attempts"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_guardian_login(#[future] env: TestEnv) {
		let env = env.await;
		let login = login_guardian(&env.state, "Familia@Example.com", "portal-2026").await.unwrap();

		match login.principal {
			Principal::Guardian { customer_id, .. } => assert_eq!(customer_id, env.customer_id),
			other => panic!("unexpected principal {:?}", other),
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_change_portal_password_checks_current(#[future] env: TestEnv) {
		let env = env.await;
		let error = change_portal_password(&env.state, env.portal_user_id, "nope-nope", "nueva-clave-1")
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 401);

		change_portal_password(&env.state, env.portal_user_id, "portal-2026", "nueva-clave-1")
			.await
			.unwrap();
		assert!(login_guardian(&env.state, "familia@example.com", "nueva-clave-1").await.is_ok());
	}

	#[rstest]
	#[tokio::test]
	async fn test_portal_password_recovery(#[future] env: TestEnv) {
		let env = env.await;
		let session = login_guardian(&env.state, "familia@example.com", "portal-2026").await.unwrap();
		let token = request_portal_password_reset(&env.state, " FAMILIA@example.com ", Some("10.0.0.8"))
			.await
			.unwrap()
			.unwrap();

		let error = reset_portal_password(&env.state, &token, "corta").await.unwrap_err();
		assert_eq!(error.status_code(), 400);

		reset_portal_password(&env.state, &token, "recuperada-2026").await.unwrap();
		assert!(login_guardian(&env.state, "familia@example.com", "recuperada-2026").await.is_ok());
		assert_eq!(resolve_session(&env.state.db, &session.token).await.unwrap_err().status_code(), 401);

		let error = reset_portal_password(&env.state, &token, "otra-clave-2026").await.unwrap_err();
		assert_eq!(error.status_code(), 400);
	}

	#[rstest]
	#[tokio::test]
	async fn test_recovery_for_unknown_email_is_silent(#[future] env: TestEnv) {
		let env = env.await;
		let token = request_portal_password_reset(&env.state, "nadie@example.com", None).await.unwrap();
		assert!(token.is_none());

		let error = reset_portal_password(&env.state, "not-a-token", "recuperada-2026").await.unwrap_err();
		assert_eq!(error.status_code(), 400);
	}

	#[rstest]
	#[tokio::test]
	async fn test_expired_recovery_token_is_rejected(#[future] env: TestEnv) {
		let env = env.await;
		{
			let mut conn = env.state.db.pool().acquire().await.unwrap();
			accounts::insert_recovery_token(
				&mut conn,
				env.portal_user_id,
				&token::recovery_digest("vencido"),
				Utc::now() - Duration::minutes(5),
				None,
			)
			.await
			.unwrap();
		}

		let error = reset_portal_password(&env.state, "vencido", "recuperada-2026").await.unwrap_err();
		assert_eq!(error.to_string(), "Bad request: Invalid or expired recovery token");
		assert!(login_guardian(&env.state, "familia@example.com", "portal-2026").await.is_ok());
	}

	#[rstest]
	#[tokio::test]
	async fn test_cannot_deactivate_self(#[future] env: TestEnv) {
		let env = env.await;
		let changes = EmployeeChanges {
			active: Some(false),
			..Default::default()
		};
		let error = update_employee(&env.state, env.admin_id, env.admin_id, &changes)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 422);
	}
}
