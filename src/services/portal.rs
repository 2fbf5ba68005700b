//! Parent portal: a guardian's view of their children, online recharges and
//! the payment gateway callback.

use cantina_auth::signature;
use cantina_core::enums::{CardState, NotificationKind, RechargeSource, RechargeState};
use cantina_core::lunch::YearMonth;
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::cards::{self, Card, ChildCard, Movement, NewRecharge, Recharge};
use cantina_db::repositories::customers::{self, DietaryRestriction, Student};
use cantina_db::repositories::notifications::{self as notification_repo, Notification};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::services::cards::{DEFAULT_MOVEMENT_LIMIT, apply_credit};
use crate::services::lunch::{LunchStatement, statement};
use crate::services::notifications::notify_guardian;
use crate::state::AppState;

/// A student of `customer_id`. Other families' children look missing.
async fn own_student(conn: &mut SqliteConnection, customer_id: i64, student_id: i64) -> Result<Student> {
	match customers::find_student(conn, student_id).await? {
		Some(student) if student.customer_id == customer_id => Ok(student),
		_ => Err(Error::NotFound(format!("Student {} not found", student_id))),
	}
}

async fn own_card(conn: &mut SqliteConnection, customer_id: i64, card_number: &str) -> Result<Card> {
	let card = cards::find_card(conn, card_number)
		.await?
		.ok_or_else(|| Error::NotFound(format!("Card {} not found", card_number)))?;
	own_student(conn, customer_id, card.student_id)
		.await
		.map_err(|_| Error::NotFound(format!("Card {} not found", card_number)))?;
	Ok(card)
}

pub async fn children(state: &AppState, customer_id: i64) -> Result<Vec<ChildCard>> {
	let mut conn = state.db.pool().acquire().await?;
	cards::list_children_cards(&mut conn, customer_id).await
}

pub async fn card_movements(
	state: &AppState,
	customer_id: i64,
	card_number: &str,
	limit: Option<i64>,
) -> Result<Vec<Movement>> {
	let mut conn = state.db.pool().acquire().await?;
	let card = own_card(&mut conn, customer_id, card_number).await?;
	cards::list_movements(&mut conn, &card.card_number, limit.unwrap_or(DEFAULT_MOVEMENT_LIMIT).clamp(1, 500)).await
}

/// Lets a guardian pick the balance below which they get alerts.
pub async fn set_child_alert_threshold(
	state: &AppState,
	portal_user_id: i64,
	customer_id: i64,
	card_number: &str,
	threshold: Option<Guaranies>,
) -> Result<Card> {
	let card = {
		let mut conn = state.db.pool().acquire().await?;
		own_card(&mut conn, customer_id, card_number).await?
	};
	crate::services::cards::set_alert_threshold(state, Actor::PortalUser(portal_user_id), &card.card_number, threshold)
		.await
}

pub async fn recharge_history(state: &AppState, customer_id: i64) -> Result<Vec<Recharge>> {
	let mut conn = state.db.pool().acquire().await?;
	let numbers: Vec<String> = cards::list_children_cards(&mut conn, customer_id)
		.await?
		.into_iter()
		.filter_map(|child| child.card_number)
		.collect();
	cards::list_recharges_for_cards(&mut conn, &numbers).await
}

/// Opens an online recharge. The guardian is then sent to the gateway with
/// the returned `pay_request_id`.
pub async fn request_recharge(
	state: &AppState,
	portal_user_id: i64,
	customer_id: i64,
	card_number: &str,
	amount: Guaranies,
) -> Result<Recharge> {
	let limits = &state.settings.portal;
	if amount < Guaranies(limits.min_recharge) || amount > Guaranies(limits.max_recharge) {
		return Err(Error::Validation(format!(
			"Recharge amount must be between {} and {}",
			Guaranies(limits.min_recharge),
			Guaranies(limits.max_recharge)
		)));
	}
	let mut tx = state.db.begin().await?;
	let card = own_card(&mut tx, customer_id, card_number).await?;
	card.check_can_recharge()?;

	let recharge = cards::insert_recharge(
		&mut tx,
		&NewRecharge {
			card_number: card.card_number.clone(),
			amount,
			source: RechargeSource::Portal,
			state: RechargeState::Pending,
			employee_id: None,
			portal_user_id: Some(portal_user_id),
			cash_session_id: None,
			pay_request_id: Some(Uuid::new_v4().to_string()),
			debt_paid: Guaranies::ZERO,
			balance_after: None,
			note: None,
		},
	)
	.await?;
	audit::record(
		&mut tx,
		Actor::PortalUser(portal_user_id),
		"REQUEST_RECHARGE",
		"recharge",
		recharge.id,
		Some(&format!("{} {}", card.card_number, amount)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(recharge_id = recharge.id, card = %card.card_number, amount = %amount, "online recharge requested");
	Ok(recharge)
}

pub async fn cancel_recharge(
	state: &AppState,
	portal_user_id: i64,
	customer_id: i64,
	recharge_id: i64,
) -> Result<Recharge> {
	let mut tx = state.db.begin().await?;
	let recharge = cards::get_recharge(&mut tx, recharge_id).await?;
	own_card(&mut tx, customer_id, &recharge.card_number)
		.await
		.map_err(|_| Error::NotFound(format!("Recharge {} not found", recharge_id)))?;
	if recharge.state != RechargeState::Pending || recharge.source != RechargeSource::Portal {
		return Err(Error::BusinessRule(format!(
			"Recharge {} is {} and cannot be cancelled",
			recharge_id, recharge.state
		)));
	}
	let cancelled =
		cards::finish_recharge(&mut tx, recharge.id, RechargeState::Cancelled, None, Guaranies::ZERO, None).await?;
	audit::record(&mut tx, Actor::PortalUser(portal_user_id), "CANCEL_RECHARGE", "recharge", recharge.id, None).await?;
	tx.commit().await?;
	Ok(cancelled)
}

/// Outcome reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayStatus {
	Confirmed,
	Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
	pub pay_request_id: String,
	pub status: GatewayStatus,
	pub tx_id: Option<String>,
}

/// Handles a signed gateway callback. `body` is the raw request body the
/// signature was computed over.
///
/// Confirming an already confirmed recharge returns it unchanged. A confirmed
/// payment is credited even when the card was blocked after the request.
pub async fn gateway_callback(state: &AppState, body: &[u8], signature_hex: Option<&str>) -> Result<Recharge> {
	let secret = state.settings.portal.gateway_secret.as_bytes();
	let valid = signature_hex.is_some_and(|sig| signature::verify(secret, body, sig));
	if !valid {
		tracing::warn!("gateway callback with an invalid signature");
		return Err(Error::Authentication("Invalid gateway signature".to_string()));
	}
	let event: GatewayEvent =
		serde_json::from_slice(body).map_err(|e| Error::BadRequest(format!("Invalid gateway payload: {}", e)))?;

	let mut tx = state.db.begin().await?;
	let recharge = cards::find_recharge_by_request(&mut tx, &event.pay_request_id)
		.await?
		.ok_or_else(|| Error::NotFound(format!("Payment request {} not found", event.pay_request_id)))?;

	match (recharge.state, event.status) {
		(RechargeState::Confirmed, GatewayStatus::Confirmed) | (RechargeState::Failed, GatewayStatus::Failed) => {
			tracing::debug!(recharge_id = recharge.id, "repeated gateway callback");
			return Ok(recharge);
		}
		(RechargeState::Pending, _) => {}
		(current, _) => {
			return Err(Error::Conflict(format!("Recharge {} is already {}", recharge.id, current)));
		}
	}

	let finished = match event.status {
		GatewayStatus::Confirmed => {
			// The guardian has already paid, so a card blocked since the
			// request is still credited.
			let card = cards::get_card(&mut tx, &recharge.card_number).await?;
			if card.state == CardState::Blocked {
				tracing::warn!(recharge_id = recharge.id, card = %card.card_number, "crediting gateway payment to a blocked card");
			}
			let outcome = apply_credit(&mut tx, &card, recharge.amount).await?;
			let finished = cards::finish_recharge(
				&mut tx,
				recharge.id,
				RechargeState::Confirmed,
				event.tx_id.as_deref(),
				outcome.debt_paid,
				Some(outcome.new_balance),
			)
			.await?;
			notify_guardian(&mut tx, &card, NotificationKind::RechargeConfirmed, outcome.new_balance).await?;
			finished
		}
		GatewayStatus::Failed => {
			cards::finish_recharge(
				&mut tx,
				recharge.id,
				RechargeState::Failed,
				event.tx_id.as_deref(),
				Guaranies::ZERO,
				None,
			)
			.await?
		}
	};
	audit::record(
		&mut tx,
		Actor::System,
		"GATEWAY_CALLBACK",
		"recharge",
		recharge.id,
		Some(&format!("{:?} {}", event.status, event.tx_id.as_deref().unwrap_or("-"))),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(recharge_id = finished.id, state = %finished.state, "gateway callback applied");
	Ok(finished)
}

pub async fn notifications(state: &AppState, customer_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
	let mut conn = state.db.pool().acquire().await?;
	notification_repo::list_for_customer(&mut conn, customer_id, unread_only).await
}

pub async fn mark_notification_read(state: &AppState, customer_id: i64, notification_id: i64) -> Result<()> {
	let mut conn = state.db.pool().acquire().await?;
	notification_repo::mark_read(&mut conn, customer_id, notification_id).await
}

pub async fn child_restrictions(state: &AppState, customer_id: i64, student_id: i64) -> Result<Vec<DietaryRestriction>> {
	let mut conn = state.db.pool().acquire().await?;
	let student = own_student(&mut conn, customer_id, student_id).await?;
	customers::list_restrictions(&mut conn, student.id).await
}

pub async fn child_lunch_statement(
	state: &AppState,
	customer_id: i64,
	student_id: i64,
	month: YearMonth,
) -> Result<LunchStatement> {
	let mut conn = state.db.pool().acquire().await?;
	let student = own_student(&mut conn, customer_id, student_id).await?;
	statement(&mut conn, student.id, month).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::cards::set_card_state;
	use crate::services::testing::{CARD, TestEnv, env};
	use rstest::rstest;

	fn signed(env: &TestEnv, body: &str) -> String {
		signature::sign(env.state.settings.portal.gateway_secret.as_bytes(), body.as_bytes())
	}

	fn event(pay_request_id: &str, status: &str, tx_id: &str) -> String {
		serde_json::json!({ "pay_request_id": pay_request_id, "status": status, "tx_id": tx_id }).to_string()
	}

	async fn pending(env: &TestEnv, amount: i64) -> Recharge {
		request_recharge(&env.state, env.portal_user_id, env.customer_id, CARD, Guaranies(amount))
			.await
			.unwrap()
	}

	#[rstest]
	#[case(999)]
	#[case(5_000_001)]
	#[tokio::test]
	async fn test_recharge_limits(#[future] env: TestEnv, #[case] amount: i64) {
		let env = env.await;
		let error = request_recharge(&env.state, env.portal_user_id, env.customer_id, CARD, Guaranies(amount))
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 400);
	}

	#[rstest]
	#[tokio::test]
	async fn test_other_family_cannot_see_card(#[future] env: TestEnv) {
		let env = env.await;
		let error = card_movements(&env.state, env.customer_id + 100, CARD, None).await.unwrap_err();
		assert_eq!(error.status_code(), 404);
	}

	#[rstest]
	#[tokio::test]
	async fn test_guardian_sets_alert_threshold(#[future] env: TestEnv) {
		let env = env.await;
		let card = set_child_alert_threshold(&env.state, env.portal_user_id, env.customer_id, CARD, Some(Guaranies(25_000)))
			.await
			.unwrap();
		assert_eq!(card.alert_threshold, Some(Guaranies(25_000)));

		let error = set_child_alert_threshold(&env.state, env.portal_user_id, env.customer_id + 100, CARD, None)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 404);
	}

	#[rstest]
	#[tokio::test]
	async fn test_confirmed_callback_is_idempotent(#[future] env: TestEnv) {
		let env = env.await;
		env.set_balance(-4_000).await;
		let recharge = pending(&env, 50_000).await;
		let pay_request_id = recharge.pay_request_id.clone().unwrap();
		assert_eq!(recharge.state, RechargeState::Pending);

		let body = event(&pay_request_id, "CONFIRMED", "TX-981");
		let sig = signed(&env, &body);
		let confirmed = gateway_callback(&env.state, body.as_bytes(), Some(&sig)).await.unwrap();
		assert_eq!(confirmed.state, RechargeState::Confirmed);
		assert_eq!(confirmed.tx_id.as_deref(), Some("TX-981"));
		assert_eq!(confirmed.debt_paid, Guaranies(4_000));
		assert_eq!(env.card().await.balance, Guaranies(46_000));

		let again = gateway_callback(&env.state, body.as_bytes(), Some(&sig)).await.unwrap();
		assert_eq!(again.id, confirmed.id);
		assert_eq!(env.card().await.balance, Guaranies(46_000));

		let kinds: Vec<NotificationKind> = notifications(&env.state, env.customer_id, true)
			.await
			.unwrap()
			.into_iter()
			.map(|n| n.kind)
			.collect();
		assert!(kinds.contains(&NotificationKind::RechargeConfirmed));
		assert!(kinds.contains(&NotificationKind::DebtSettled));
	}

	#[rstest]
	#[tokio::test]
	async fn test_bad_signature_is_rejected(#[future] env: TestEnv) {
		let env = env.await;
		let recharge = pending(&env, 10_000).await;
		let body = event(recharge.pay_request_id.as_deref().unwrap(), "CONFIRMED", "TX-1");

		let error = gateway_callback(&env.state, body.as_bytes(), Some("00ff")).await.unwrap_err();
		assert_eq!(error.status_code(), 401);
		let error = gateway_callback(&env.state, body.as_bytes(), None).await.unwrap_err();
		assert_eq!(error.status_code(), 401);
		assert_eq!(env.card().await.balance, Guaranies::ZERO);
	}

	#[rstest]
	#[tokio::test]
	async fn test_failed_and_cancelled_recharges(#[future] env: TestEnv) {
		let env = env.await;
		let first = pending(&env, 10_000).await;
		let body = event(first.pay_request_id.as_deref().unwrap(), "FAILED", "TX-2");
		let failed = gateway_callback(&env.state, body.as_bytes(), Some(&signed(&env, &body)))
			.await
			.unwrap();
		assert_eq!(failed.state, RechargeState::Failed);

		let second = pending(&env, 10_000).await;
		let cancelled = cancel_recharge(&env.state, env.portal_user_id, env.customer_id, second.id)
			.await
			.unwrap();
		assert_eq!(cancelled.state, RechargeState::Cancelled);

		let body = event(second.pay_request_id.as_deref().unwrap(), "CONFIRMED", "TX-3");
		let error = gateway_callback(&env.state, body.as_bytes(), Some(&signed(&env, &body)))
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 409);
		assert_eq!(env.card().await.balance, Guaranies::ZERO);
		assert_eq!(recharge_history(&env.state, env.customer_id).await.unwrap().len(), 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_blocked_card_cannot_be_recharged_online(#[future] env: TestEnv) {
		let env = env.await;
		set_card_state(&env.state, env.manager_id, CARD, CardState::Blocked).await.unwrap();
		let error = request_recharge(&env.state, env.portal_user_id, env.customer_id, CARD, Guaranies(10_000))
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 422);
		let children = children(&env.state, env.customer_id).await.unwrap();
		assert_eq!(children[0].state.as_deref(), Some(CardState::Blocked.as_str()));
	}

	#[rstest]
	#[tokio::test]
	async fn test_paid_recharge_is_credited_after_block(#[future] env: TestEnv) {
		let env = env.await;
		let recharge = pending(&env, 20_000).await;
		set_card_state(&env.state, env.manager_id, CARD, CardState::Blocked).await.unwrap();

		let body = event(recharge.pay_request_id.as_deref().unwrap(), "CONFIRMED", "TX-44");
		let confirmed = gateway_callback(&env.state, body.as_bytes(), Some(&signed(&env, &body)))
			.await
			.unwrap();
		assert_eq!(confirmed.state, RechargeState::Confirmed);
		assert_eq!(confirmed.tx_id.as_deref(), Some("TX-44"));

		let card = env.card().await;
		assert_eq!(card.state, CardState::Blocked);
		assert_eq!(card.balance, Guaranies(20_000));
	}
}
