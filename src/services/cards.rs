//! Student cards: issuing, state, credit policy, recharges and debits.
//!
//! Every balance change goes through [`apply_credit`] or [`charge`], which
//! keep the stored balance equal to confirmed recharges minus consumptions.

use cantina_auth::PasswordHasher;
use cantina_core::credit::{
	self, CreditDecision, CreditPolicy, RechargeOutcome, can_authorize_negative, validate_authorization_reason,
};
use cantina_core::enums::{CardState, NotificationKind, RechargeSource, RechargeState};
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::accounts::{self, Employee};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::authorizations::{self, NewAuthorization};
use cantina_db::repositories::cards::{self, Card, Consumption, Movement, NewRecharge, Recharge};
use cantina_db::repositories::customers;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::services::{cash, notifications};
use crate::state::AppState;

pub const DEFAULT_MOVEMENT_LIMIT: i64 = 50;

pub fn policy(card: &Card) -> CreditPolicy {
	CreditPolicy {
		balance: card.balance,
		allows_negative: card.allows_negative,
		credit_limit: card.credit_limit,
	}
}

/// A card together with its holder.
#[derive(Debug, Clone, Serialize)]
pub struct CardDetail {
	#[serde(flatten)]
	pub card: Card,
	pub student: String,
	pub customer_id: i64,
	pub unsettled_authorizations: usize,
}

pub async fn issue_card(
	state: &AppState,
	employee_id: i64,
	student_id: i64,
	card_number: &str,
	expires_on: Option<NaiveDate>,
	alert_threshold: Option<Guaranies>,
) -> Result<Card> {
	let card_number = card_number.trim();
	if card_number.is_empty() {
		return Err(Error::Validation("Card number is required".to_string()));
	}
	check_threshold(alert_threshold)?;

	let mut tx = state.db.begin().await?;
	let student = customers::get_student(&mut tx, student_id).await?;
	if let Some(existing) = cards::find_card_by_student(&mut tx, student.id).await? {
		return Err(Error::Conflict(format!(
			"{} already has card {}",
			student.full_name(),
			existing.card_number
		)));
	}
	let card = cards::insert_card(&mut tx, card_number, student.id, expires_on, alert_threshold).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"ISSUE_CARD",
		"card",
		&card.card_number,
		Some(&student.full_name()),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(card = %card.card_number, student_id, "card issued");
	Ok(card)
}

pub async fn card_detail(state: &AppState, card_number: &str) -> Result<CardDetail> {
	let mut conn = state.db.pool().acquire().await?;
	let card = cards::get_card(&mut conn, card_number).await?;
	let student = customers::get_student(&mut conn, card.student_id).await?;
	let unsettled = authorizations::list_unsettled(&mut conn, card_number).await?;
	Ok(CardDetail {
		student: student.full_name(),
		customer_id: student.customer_id,
		unsettled_authorizations: unsettled.len(),
		card,
	})
}

/// Blocks or reactivates a card.
pub async fn set_card_state(state: &AppState, employee_id: i64, card_number: &str, new_state: CardState) -> Result<Card> {
	let mut tx = state.db.begin().await?;
	let current = cards::get_card(&mut tx, card_number).await?;
	if current.state == new_state {
		return Err(Error::Conflict(format!("Card {} is already {}", card_number, new_state)));
	}
	let card = cards::set_state(&mut tx, card_number, new_state).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"SET_CARD_STATE",
		"card",
		card_number,
		Some(&format!("{} -> {}", current.state, new_state)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(card = %card_number, state = %new_state, "card state changed");
	Ok(card)
}

pub async fn configure_credit(
	state: &AppState,
	employee_id: i64,
	card_number: &str,
	allows_negative: bool,
	credit_limit: Guaranies,
) -> Result<Card> {
	if credit_limit.is_negative() {
		return Err(Error::Validation("Credit limit cannot be negative".to_string()));
	}
	let mut tx = state.db.begin().await?;
	let card = cards::set_credit(&mut tx, card_number, allows_negative, credit_limit).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CONFIGURE_CREDIT",
		"card",
		card_number,
		Some(&format!("allows_negative {}, limit {}", allows_negative, credit_limit)),
	)
	.await?;
	tx.commit().await?;
	Ok(card)
}

fn check_threshold(threshold: Option<Guaranies>) -> Result<()> {
	if threshold.is_some_and(Guaranies::is_negative) {
		return Err(Error::Validation("Alert threshold cannot be negative".to_string()));
	}
	Ok(())
}

/// Changes the low-balance threshold; `None` falls back to the default.
pub async fn set_alert_threshold(
	state: &AppState,
	actor: Actor,
	card_number: &str,
	threshold: Option<Guaranies>,
) -> Result<Card> {
	check_threshold(threshold)?;
	let mut tx = state.db.begin().await?;
	let card = cards::set_alert_threshold(&mut tx, card_number, threshold).await?;
	audit::record(
		&mut tx,
		actor,
		"SET_ALERT_THRESHOLD",
		"card",
		card_number,
		threshold.map(|t| t.to_string()).as_deref(),
	)
	.await?;
	tx.commit().await?;
	Ok(card)
}

pub async fn movements(state: &AppState, card_number: &str, limit: Option<i64>) -> Result<Vec<Movement>> {
	let limit = limit.unwrap_or(DEFAULT_MOVEMENT_LIMIT).clamp(1, 500);
	let mut conn = state.db.pool().acquire().await?;
	cards::get_card(&mut conn, card_number).await?;
	cards::list_movements(&mut conn, card_number, limit).await
}

/// Credits a card, paying debt first, settling open authorizations once the
/// balance is no longer negative and telling the guardian when the debt is
/// gone. Callers record the recharge row.
pub(crate) async fn apply_credit(conn: &mut SqliteConnection, card: &Card, amount: Guaranies) -> Result<RechargeOutcome> {
	let outcome = credit::apply_recharge(card.balance, amount)?;
	cards::set_balance(conn, &card.card_number, outcome.new_balance).await?;
	if credit::settles_authorizations(outcome.new_balance) {
		let settled = authorizations::settle_all(conn, &card.card_number).await?;
		if settled > 0 {
			tracing::info!(card = %card.card_number, settled, "negative balance authorizations settled");
		}
	}
	if outcome.debt_settled {
		notifications::notify_guardian(conn, card, NotificationKind::DebtSettled, outcome.new_balance).await?;
	}
	Ok(outcome)
}

pub async fn recharge_at_pos(
	state: &AppState,
	employee_id: i64,
	card_number: &str,
	amount: Guaranies,
	cash_session_id: Option<i64>,
	note: Option<&str>,
) -> Result<Recharge> {
	let mut tx = state.db.begin().await?;
	let card = cards::get_card(&mut tx, card_number).await?;
	card.check_can_recharge()?;
	if let Some(session_id) = cash_session_id {
		cash::require_open(&mut tx, session_id).await?;
	}

	let outcome = apply_credit(&mut tx, &card, amount).await?;
	let recharge = cards::insert_recharge(
		&mut tx,
		&NewRecharge {
			card_number: card.card_number.clone(),
			amount,
			source: RechargeSource::Cash,
			state: RechargeState::Confirmed,
			employee_id: Some(employee_id),
			portal_user_id: None,
			cash_session_id,
			pay_request_id: None,
			debt_paid: outcome.debt_paid,
			balance_after: Some(outcome.new_balance),
			note: note.map(str::to_string),
		},
	)
	.await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"RECHARGE",
		"card",
		card_number,
		Some(&format!("{} -> {}", amount, outcome.new_balance)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(card = %card_number, amount = %amount, balance = %outcome.new_balance, "card recharged at POS");
	Ok(recharge)
}

/// Credits back a voided card payment. Blocked cards are refunded too.
pub(crate) async fn refund(
	conn: &mut SqliteConnection,
	card_number: &str,
	amount: Guaranies,
	employee_id: i64,
	note: &str,
) -> Result<Recharge> {
	let card = cards::get_card(conn, card_number).await?;
	let outcome = apply_credit(conn, &card, amount).await?;
	cards::insert_recharge(
		conn,
		&NewRecharge {
			card_number: card.card_number.clone(),
			amount,
			source: RechargeSource::Refund,
			state: RechargeState::Confirmed,
			employee_id: Some(employee_id),
			portal_user_id: None,
			cash_session_id: None,
			pay_request_id: None,
			debt_paid: outcome.debt_paid,
			balance_after: Some(outcome.new_balance),
			note: Some(note.to_string()),
		},
	)
	.await
}

/// Supervisor credentials typed at the register to allow a negative balance.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorApproval {
	pub username: String,
	pub password: String,
	pub reason: String,
}

/// A verified approval, ready to be recorded.
#[derive(Debug, Clone)]
pub(crate) struct Approval {
	pub supervisor_id: i64,
	pub reason: String,
}

/// Checks the supervisor's credentials and role.
pub(crate) async fn verify_supervisor(
	conn: &mut SqliteConnection,
	hasher: &dyn PasswordHasher,
	username: &str,
	password: &str,
) -> Result<Employee> {
	let invalid = || Error::PermissionDenied("Invalid supervisor credentials".to_string());
	let employee = accounts::find_employee_by_username(conn, username.trim())
		.await?
		.ok_or_else(invalid)?;
	if !hasher.verify(password, &employee.password_hash)? {
		tracing::warn!(username = %employee.username, "supervisor password rejected");
		return Err(invalid());
	}
	if !can_authorize_negative(employee.role, employee.active) {
		return Err(Error::PermissionDenied(format!(
			"{} cannot authorize negative balances",
			employee.username
		)));
	}
	Ok(employee)
}

pub(crate) async fn approve(
	conn: &mut SqliteConnection,
	hasher: &dyn PasswordHasher,
	input: &SupervisorApproval,
) -> Result<Approval> {
	let reason = validate_authorization_reason(&input.reason)?.to_string();
	let supervisor = verify_supervisor(conn, hasher, &input.username, &input.password).await?;
	Ok(Approval {
		supervisor_id: supervisor.id,
		reason,
	})
}

/// Turns a credit decision into an error unless the card can be debited,
/// possibly with the given approval.
pub(crate) fn check_decision(card_number: &str, decision: &CreditDecision, approval: Option<&Approval>) -> Result<()> {
	match decision {
		CreditDecision::Sufficient { .. } => Ok(()),
		CreditDecision::RequiresAuthorization { .. } if approval.is_some() => Ok(()),
		CreditDecision::RequiresAuthorization { .. } => Err(Error::InsufficientBalance(format!(
			"Card {}: {}",
			card_number,
			decision.message()
		))),
		CreditDecision::Denied { reason, .. } => {
			Err(Error::InsufficientBalance(format!("Card {}: {}", card_number, reason)))
		}
	}
}

/// Debits a card under the credit rules.
///
/// A debit that leaves the card negative needs `approval` and records a
/// negative balance authorization.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn charge(
	conn: &mut SqliteConnection,
	card: &Card,
	amount: Guaranies,
	detail: &str,
	sale_id: Option<i64>,
	cashier_id: i64,
	approval: Option<&Approval>,
	today: NaiveDate,
) -> Result<Consumption> {
	card.check_can_consume(today)?;
	let decision = credit::validate_credit_limit(&policy(card), amount);
	check_decision(&card.card_number, &decision, approval)?;

	if let (CreditDecision::RequiresAuthorization { .. }, Some(approval)) = (&decision, approval) {
		let authorization = authorizations::insert_authorization(
			conn,
			&NewAuthorization {
				card_number: &card.card_number,
				sale_id,
				supervisor_id: approval.supervisor_id,
				cashier_id,
				previous_balance: card.balance,
				amount,
				reason: &approval.reason,
			},
		)
		.await?;
		tracing::warn!(
			card = %card.card_number,
			authorization_id = authorization.id,
			supervisor_id = approval.supervisor_id,
			resulting = %authorization.resulting_balance,
			"negative balance authorized"
		);
	}

	let consumption =
		cards::insert_consumption(conn, &card.card_number, sale_id, amount, detail, card.balance, Some(cashier_id))
			.await?;
	cards::set_balance(conn, &card.card_number, consumption.balance_after).await?;
	Ok(consumption)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::testing::{CARD, TestEnv, env};
	use rstest::rstest;

	async fn ledger(env: &TestEnv) -> Guaranies {
		let mut conn = env.state.db.pool().acquire().await.unwrap();
		cards::ledger_balance(&mut conn, CARD).await.unwrap()
	}

	#[rstest]
	#[tokio::test]
	async fn test_recharge_updates_balance_and_ledger(#[future] env: TestEnv) {
		let env = env.await;
		let recharge = recharge_at_pos(&env.state, env.cashier_id, CARD, Guaranies(20_000), None, None)
			.await
			.unwrap();

		assert_eq!(recharge.balance_after, Some(Guaranies(20_000)));
		assert_eq!(env.card().await.balance, Guaranies(20_000));
		assert_eq!(ledger(&env).await, Guaranies(20_000));
	}

	#[rstest]
	#[tokio::test]
	async fn test_blocked_card_cannot_be_recharged(#[future] env: TestEnv) {
		let env = env.await;
		set_card_state(&env.state, env.manager_id, CARD, CardState::Blocked).await.unwrap();

		let error = recharge_at_pos(&env.state, env.cashier_id, CARD, Guaranies(5_000), None, None)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 422);
		assert!(error.to_string().contains("blocked"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_second_card_for_student_conflicts(#[future] env: TestEnv) {
		let env = env.await;
		let error = issue_card(&env.state, env.manager_id, env.student_id, "2002", None, None)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 409);
	}

	#[rstest]
	#[tokio::test]
	async fn test_negative_debit_needs_approval_and_recharge_settles_it(#[future] env: TestEnv) {
		let env = env.await;
		configure_credit(&env.state, env.manager_id, CARD, true, Guaranies(30_000)).await.unwrap();
		recharge_at_pos(&env.state, env.cashier_id, CARD, Guaranies(5_000), None, None)
			.await
			.unwrap();
		let today = env.state.today();

		let mut tx = env.state.db.begin().await.unwrap();
		let card = cards::get_card(&mut tx, CARD).await.unwrap();
		let error = charge(&mut tx, &card, Guaranies(12_000), "Almuerzo", None, env.cashier_id, None, today)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 422);

		let approval = approve(
			&mut tx,
			env.state.hasher.as_ref(),
			&SupervisorApproval {
				username: "gerente".into(),
				password: "gerente-2026".into(),
				reason: "Olvidó la recarga semanal".into(),
			},
		)
		.await
		.unwrap();
		let consumption = charge(
			&mut tx,
			&card,
			Guaranies(12_000),
			"Almuerzo",
			None,
			env.cashier_id,
			Some(&approval),
			today,
		)
		.await
		.unwrap();
		assert_eq!(consumption.balance_after, Guaranies(-7_000));
		assert_eq!(authorizations::list_unsettled(&mut tx, CARD).await.unwrap().len(), 1);
		tx.commit().await.unwrap();

		recharge_at_pos(&env.state, env.cashier_id, CARD, Guaranies(10_000), None, None)
			.await
			.unwrap();
		let detail = card_detail(&env.state, CARD).await.unwrap();
		assert_eq!(detail.card.balance, Guaranies(3_000));
		assert_eq!(detail.unsettled_authorizations, 0);
		assert_eq!(ledger(&env).await, Guaranies(3_000));
	}

	#[rstest]
	#[tokio::test]
	async fn test_cashier_cannot_approve(#[future] env: TestEnv) {
		let env = env.await;
		let mut conn = env.state.db.pool().acquire().await.unwrap();
		let error = verify_supervisor(&mut conn, env.state.hasher.as_ref(), "cajera", "cajera-2026")
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 403);

		let error = verify_supervisor(&mut conn, env.state.hasher.as_ref(), "gerente", "wrong")
			.await
			.unwrap_err();
		assert_eq!(error.to_string(), "Permission denied: Invalid supervisor credentials");
	}

	#[rstest]
	#[case(CreditDecision::Sufficient { resulting: Guaranies(1) }, false, true)]
	#[case(CreditDecision::RequiresAuthorization { resulting: Guaranies(-1), shortfall: Guaranies(1) }, false, false)]
	#[case(CreditDecision::RequiresAuthorization { resulting: Guaranies(-1), shortfall: Guaranies(1) }, true, true)]
	#[case(CreditDecision::Denied { resulting: Guaranies(-1), reason: "no".into() }, true, false)]
	fn test_check_decision(#[case] decision: CreditDecision, #[case] approved: bool, #[case] allowed: bool) {
		let approval = Approval {
			supervisor_id: 1,
			reason: "reason long enough".into(),
		};
		let result = check_decision("1001", &decision, approved.then_some(&approval));
		assert_eq!(result.is_ok(), allowed);
	}
}
