//! Cash register sessions.

use cantina_core::cash::{Reconciliation, reconcile};
use cantina_core::enums::CashSessionState;
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::cash::{self, CashSession};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::state::AppState;

/// The session a sale or recharge is booked into; it must still be open.
pub(crate) async fn require_open(conn: &mut SqliteConnection, session_id: i64) -> Result<CashSession> {
	let session = cash::get_session(conn, session_id).await?;
	if session.state != CashSessionState::Open {
		return Err(Error::BusinessRule(format!("Cash session {} is closed", session_id)));
	}
	Ok(session)
}

pub async fn open_session(
	state: &AppState,
	employee_id: i64,
	register_id: i64,
	opening_amount: Guaranies,
) -> Result<CashSession> {
	if opening_amount.is_negative() {
		return Err(Error::Validation("Opening amount cannot be negative".to_string()));
	}
	let mut tx = state.db.begin().await?;
	let register = cash::get_register(&mut tx, register_id).await?;
	if !register.active {
		return Err(Error::BusinessRule(format!("Cash register {} is inactive", register.name)));
	}
	if let Some(open) = cash::find_open_session(&mut tx, register_id).await? {
		return Err(Error::Conflict(format!(
			"Cash register {} already has open session {}",
			register.name, open.id
		)));
	}
	let session = cash::open_session(&mut tx, register_id, employee_id, opening_amount).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"OPEN_CASH_SESSION",
		"cash_session",
		session.id,
		Some(&format!("{} opening {}", register.name, opening_amount)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(session_id = session.id, register = %register.name, employee_id, "cash session opened");
	Ok(session)
}

/// Closes a session against the counted cash.
pub async fn close_session(
	state: &AppState,
	employee_id: i64,
	session_id: i64,
	counted: Guaranies,
	notes: Option<&str>,
) -> Result<CashSession> {
	if counted.is_negative() {
		return Err(Error::Validation("Counted amount cannot be negative".to_string()));
	}
	let mut tx = state.db.begin().await?;
	let session = require_open(&mut tx, session_id).await?;
	let (cash_sales, cash_recharges) = cash::session_cash_totals(&mut tx, session.id).await?;
	let reconciliation = reconcile(session.opening_amount, cash_sales, cash_recharges, counted);
	let closed = cash::close_session(&mut tx, session.id, employee_id, &reconciliation, notes).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CLOSE_CASH_SESSION",
		"cash_session",
		session.id,
		Some(&format!(
			"expected {}, counted {}, difference {}",
			reconciliation.expected, reconciliation.counted, reconciliation.difference
		)),
	)
	.await?;
	tx.commit().await?;

	if reconciliation.difference != Guaranies::ZERO {
		tracing::warn!(session_id, difference = %reconciliation.difference, "cash session closed with a difference");
	} else {
		tracing::info!(session_id, "cash session closed");
	}
	Ok(closed)
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
	pub session: CashSession,
	pub reconciliation: Reconciliation,
}

/// Running totals of a session. For a closed session `counted` is what was
/// declared at close; for an open one it is the expected amount.
pub async fn summary(state: &AppState, session_id: i64) -> Result<SessionSummary> {
	let mut conn = state.db.pool().acquire().await?;
	let session = cash::get_session(&mut conn, session_id).await?;
	let (cash_sales, cash_recharges) = cash::session_cash_totals(&mut conn, session.id).await?;
	let expected = session.opening_amount + cash_sales + cash_recharges;
	let counted = session.counted_amount.unwrap_or(expected);
	Ok(SessionSummary {
		reconciliation: reconcile(session.opening_amount, cash_sales, cash_recharges, counted),
		session,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::testing::{TestEnv, env};
	use rstest::rstest;

	async fn register(env: &TestEnv) -> i64 {
		let mut conn = env.state.db.pool().acquire().await.unwrap();
		cash::insert_register(&mut conn, "Caja 1", Some("Cantina")).await.unwrap().id
	}

	#[rstest]
	#[tokio::test]
	async fn test_one_open_session_per_register(#[future] env: TestEnv) {
		let env = env.await;
		let register_id = register(&env).await;

		open_session(&env.state, env.cashier_id, register_id, Guaranies(100_000)).await.unwrap();
		let error = open_session(&env.state, env.cashier_id, register_id, Guaranies(0))
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 409);
	}

	#[rstest]
	#[tokio::test]
	async fn test_close_reconciles_and_rejects_second_close(#[future] env: TestEnv) {
		let env = env.await;
		let register_id = register(&env).await;
		let session = open_session(&env.state, env.cashier_id, register_id, Guaranies(100_000))
			.await
			.unwrap();

		let closed = close_session(&env.state, env.manager_id, session.id, Guaranies(95_000), Some("faltante"))
			.await
			.unwrap();
		assert_eq!(closed.state, CashSessionState::Closed);
		assert_eq!(closed.expected_amount, Some(Guaranies(100_000)));
		assert_eq!(closed.difference, Some(Guaranies(-5_000)));

		let error = close_session(&env.state, env.manager_id, session.id, Guaranies(0), None)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 422);
	}
}
