//! Balance alerts for guardians.

use chrono::{DateTime, Duration, Utc};

use crate::enums::NotificationKind;
use crate::money::Guaranies;

/// Threshold used when a card has no alert threshold of its own.
pub const DEFAULT_ALERT_THRESHOLD: Guaranies = Guaranies(10_000);

/// Which balance alert, if any, a card should trigger.
///
/// # Examples
///
/// ```
/// use cantina_core::enums::NotificationKind;
/// use cantina_core::notifications::classify;
/// use cantina_core::Guaranies;
///
/// assert_eq!(classify(Guaranies(-1), Guaranies(10_000)), Some(NotificationKind::NegativeBalance));
/// assert_eq!(classify(Guaranies(9_999), Guaranies(10_000)), Some(NotificationKind::LowBalance));
/// assert_eq!(classify(Guaranies(10_000), Guaranies(10_000)), None);
/// ```
pub fn classify(balance: Guaranies, threshold: Guaranies) -> Option<NotificationKind> {
	if balance.is_negative() {
		Some(NotificationKind::NegativeBalance)
	} else if balance < threshold {
		Some(NotificationKind::LowBalance)
	} else {
		None
	}
}

/// False while the previous alert is younger than `cooldown`.
pub fn should_notify(last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown: Duration) -> bool {
	match last_sent {
		None => true,
		Some(sent) => now - sent >= cooldown,
	}
}

/// Title and body of a notification.
pub fn compose(kind: NotificationKind, student: &str, card_number: &str, balance: Guaranies) -> (String, String) {
	match kind {
		NotificationKind::NegativeBalance => (
			"Saldo negativo".to_string(),
			format!(
				"La tarjeta {} de {} tiene saldo negativo: {}. Por favor regularice con una recarga.",
				card_number, student, balance
			),
		),
		NotificationKind::LowBalance => (
			"Saldo bajo".to_string(),
			format!(
				"La tarjeta {} de {} tiene saldo bajo: {}.",
				card_number, student, balance
			),
		),
		NotificationKind::DebtSettled => (
			"Deuda regularizada".to_string(),
			format!(
				"La deuda de la tarjeta {} de {} fue cancelada. Saldo actual: {}.",
				card_number, student, balance
			),
		),
		NotificationKind::RechargeConfirmed => (
			"Recarga confirmada".to_string(),
			format!(
				"La recarga de la tarjeta {} de {} fue acreditada. Saldo actual: {}.",
				card_number, student, balance
			),
		),
		NotificationKind::LunchPaymentOverdue => (
			"Cuota de almuerzo vencida".to_string(),
			format!("La cuota de almuerzo de {} está vencida: {}.", student, balance),
		),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use rstest::rstest;

	#[rstest]
	#[case(None, true)]
	#[case(Some(1), false)]
	#[case(Some(23), false)]
	#[case(Some(24), true)]
	#[case(Some(30), true)]
	fn test_cooldown(#[case] hours_ago: Option<i64>, #[case] expected: bool) {
		let now = Utc.with_ymd_and_hms(2026, 5, 2, 12, 0, 0).unwrap();
		let last = hours_ago.map(|h| now - Duration::hours(h));
		assert_eq!(should_notify(last, now, Duration::hours(24)), expected);
	}

	#[rstest]
	fn test_compose_includes_formatted_balance() {
		let (title, body) = compose(
			NotificationKind::NegativeBalance,
			"Ana Benítez",
			"0001234",
			Guaranies(-15_000),
		);
		assert_eq!(title, "Saldo negativo");
		assert!(body.contains("Gs. -15.000"));
		assert!(body.contains("Ana Benítez"));
	}

	#[rstest]
	fn test_low_balance_uses_strict_threshold() {
		assert_eq!(classify(Guaranies(0), DEFAULT_ALERT_THRESHOLD), Some(NotificationKind::LowBalance));
		assert_eq!(classify(Guaranies(50_000), DEFAULT_ALERT_THRESHOLD), None);
	}
}
