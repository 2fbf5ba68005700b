//! Guardian notifications: balance alerts, debt settlement, confirmed
//! recharges and overdue lunch fees.

use cantina_conf::BusinessSettings;
use cantina_core::enums::NotificationKind;
use cantina_core::notifications::{self, DEFAULT_ALERT_THRESHOLD};
use cantina_core::{Guaranies, Result};
use cantina_db::Database;
use cantina_db::repositories::cards::{self, Card};
use cantina_db::repositories::customers;
use cantina_db::repositories::lunch;
use cantina_db::repositories::notifications::{self as repo, NewNotification, Notification};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::SqliteConnection;

/// Writes a notification for the guardian of the card's student.
pub(crate) async fn notify_guardian(
	conn: &mut SqliteConnection,
	card: &Card,
	kind: NotificationKind,
	balance: Guaranies,
) -> Result<Notification> {
	let student = customers::get_student(conn, card.student_id).await?;
	let (title, message) = notifications::compose(kind, &student.full_name(), &card.card_number, balance);
	let notification = repo::insert_notification(
		conn,
		&NewNotification {
			customer_id: student.customer_id,
			student_id: Some(student.id),
			card_number: Some(&card.card_number),
			kind,
			title: &title,
			message: &message,
			balance,
		},
	)
	.await?;
	tracing::debug!(card = %card.card_number, kind = %kind, "guardian notified");
	Ok(notification)
}

fn threshold(card: &Card, business: &BusinessSettings) -> Guaranies {
	card.alert_threshold.unwrap_or(if business.alert_threshold > 0 {
		Guaranies(business.alert_threshold)
	} else {
		DEFAULT_ALERT_THRESHOLD
	})
}

/// Sends a low or negative balance alert unless one went out within the
/// cooldown. Returns whether a notification was written.
pub(crate) async fn evaluate_card(
	conn: &mut SqliteConnection,
	card: &Card,
	business: &BusinessSettings,
	now: DateTime<Utc>,
) -> Result<bool> {
	let Some(kind) = notifications::classify(card.balance, threshold(card, business)) else {
		return Ok(false);
	};
	let cooldown = Duration::hours(business.notification_cooldown_hours);
	if !notifications::should_notify(card.last_notified_at, now, cooldown) {
		return Ok(false);
	}
	notify_guardian(conn, card, kind, card.balance).await?;
	cards::mark_notified(conn, &card.card_number, now).await?;
	Ok(true)
}

/// Checks every active card against its alert threshold.
pub async fn scan_balances(db: &Database, business: &BusinessSettings) -> Result<usize> {
	let mut tx = db.begin().await?;
	let now = Utc::now();
	let mut sent = 0;
	for card in cards::list_active_cards(&mut tx).await? {
		if evaluate_card(&mut tx, &card, business, now).await? {
			sent += 1;
		}
	}
	tx.commit().await?;
	if sent > 0 {
		tracing::info!(sent, "balance alerts sent");
	}
	Ok(sent)
}

/// Marks unpaid lunch fees past their due date as overdue and tells the
/// guardians.
pub async fn flag_overdue_fees(db: &Database, today: NaiveDate) -> Result<usize> {
	let mut tx = db.begin().await?;
	let overdue = lunch::mark_overdue(&mut tx, today).await?;
	for fee in &overdue {
		let subscription = lunch::get_subscription(&mut tx, fee.subscription_id).await?;
		let student = customers::get_student(&mut tx, subscription.student_id).await?;
		let (title, message) = notifications::compose(
			NotificationKind::LunchPaymentOverdue,
			&student.full_name(),
			"",
			fee.amount,
		);
		repo::insert_notification(
			&mut tx,
			&NewNotification {
				customer_id: student.customer_id,
				student_id: Some(student.id),
				card_number: None,
				kind: NotificationKind::LunchPaymentOverdue,
				title: &title,
				message: &message,
				balance: fee.amount,
			},
		)
		.await?;
	}
	tx.commit().await?;
	if !overdue.is_empty() {
		tracing::info!(count = overdue.len(), "lunch fees flagged overdue");
	}
	Ok(overdue.len())
}
