//! Cards, recharges and consumptions.

use cantina_core::enums::{CardState, RechargeSource, RechargeState};
use cantina_core::{Error, Guaranies, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Card {
	pub card_number: String,
	pub student_id: i64,
	pub balance: Guaranies,
	#[sqlx(try_from = "String")]
	pub state: CardState,
	pub expires_on: Option<NaiveDate>,
	pub alert_threshold: Option<Guaranies>,
	pub allows_negative: bool,
	pub credit_limit: Guaranies,
	pub last_notified_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl Card {
	pub fn is_expired_on(&self, date: NaiveDate) -> bool {
		self.state == CardState::Expired || self.expires_on.is_some_and(|expiry| expiry < date)
	}

	/// Consumption needs an active, unexpired card.
	pub fn check_can_consume(&self, today: NaiveDate) -> Result<()> {
		match self.state {
			CardState::Blocked => Err(Error::BusinessRule(format!("Card {} is blocked", self.card_number))),
			_ if self.is_expired_on(today) => {
				Err(Error::BusinessRule(format!("Card {} is expired", self.card_number)))
			}
			_ => Ok(()),
		}
	}

	/// Recharges are refused only for blocked cards.
	pub fn check_can_recharge(&self) -> Result<()> {
		if self.state == CardState::Blocked {
			return Err(Error::BusinessRule(format!(
				"Card {} is blocked and cannot be recharged",
				self.card_number
			)));
		}
		Ok(())
	}
}

const CARD_COLUMNS: &str = "card_number, student_id, balance, state, expires_on, alert_threshold, \
	allows_negative, credit_limit, last_notified_at, created_at";

pub async fn insert_card(
	conn: &mut SqliteConnection,
	card_number: &str,
	student_id: i64,
	expires_on: Option<NaiveDate>,
	alert_threshold: Option<Guaranies>,
) -> Result<Card> {
	let sql = format!(
		"INSERT INTO cards (card_number, student_id, expires_on, alert_threshold, created_at)
		 VALUES (?, ?, ?, ?, ?) RETURNING {}",
		CARD_COLUMNS
	);
	Ok(sqlx::query_as::<_, Card>(&sql)
		.bind(card_number)
		.bind(student_id)
		.bind(expires_on)
		.bind(alert_threshold)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn find_card(conn: &mut SqliteConnection, card_number: &str) -> Result<Option<Card>> {
	let sql = format!("SELECT {} FROM cards WHERE card_number = ?", CARD_COLUMNS);
	Ok(sqlx::query_as::<_, Card>(&sql).bind(card_number).fetch_optional(&mut *conn).await?)
}

pub async fn get_card(conn: &mut SqliteConnection, card_number: &str) -> Result<Card> {
	find_card(conn, card_number).await?.ok_or_else(|| not_found("Card", card_number))
}

pub async fn find_card_by_student(conn: &mut SqliteConnection, student_id: i64) -> Result<Option<Card>> {
	let sql = format!("SELECT {} FROM cards WHERE student_id = ?", CARD_COLUMNS);
	Ok(sqlx::query_as::<_, Card>(&sql).bind(student_id).fetch_optional(&mut *conn).await?)
}

pub async fn list_active_cards(conn: &mut SqliteConnection) -> Result<Vec<Card>> {
	let sql = format!("SELECT {} FROM cards WHERE state = 'ACTIVE' ORDER BY card_number", CARD_COLUMNS);
	Ok(sqlx::query_as::<_, Card>(&sql).fetch_all(&mut *conn).await?)
}

pub async fn set_balance(conn: &mut SqliteConnection, card_number: &str, balance: Guaranies) -> Result<()> {
	sqlx::query("UPDATE cards SET balance = ? WHERE card_number = ?")
		.bind(balance)
		.bind(card_number)
		.execute(&mut *conn)
		.await?;
	Ok(())
}

pub async fn set_state(conn: &mut SqliteConnection, card_number: &str, state: CardState) -> Result<Card> {
	let sql = format!("UPDATE cards SET state = ? WHERE card_number = ? RETURNING {}", CARD_COLUMNS);
	sqlx::query_as::<_, Card>(&sql)
		.bind(state.as_str())
		.bind(card_number)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Card", card_number))
}

pub async fn set_credit(
	conn: &mut SqliteConnection,
	card_number: &str,
	allows_negative: bool,
	credit_limit: Guaranies,
) -> Result<Card> {
	let sql = format!(
		"UPDATE cards SET allows_negative = ?, credit_limit = ? WHERE card_number = ? RETURNING {}",
		CARD_COLUMNS
	);
	sqlx::query_as::<_, Card>(&sql)
		.bind(allows_negative)
		.bind(credit_limit)
		.bind(card_number)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Card", card_number))
}

pub async fn set_alert_threshold(
	conn: &mut SqliteConnection,
	card_number: &str,
	alert_threshold: Option<Guaranies>,
) -> Result<Card> {
	let sql = format!(
		"UPDATE cards SET alert_threshold = ? WHERE card_number = ? RETURNING {}",
		CARD_COLUMNS
	);
	sqlx::query_as::<_, Card>(&sql)
		.bind(alert_threshold)
		.bind(card_number)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Card", card_number))
}

pub async fn mark_notified(conn: &mut SqliteConnection, card_number: &str, at: DateTime<Utc>) -> Result<()> {
	sqlx::query("UPDATE cards SET last_notified_at = ? WHERE card_number = ?")
		.bind(at)
		.bind(card_number)
		.execute(&mut *conn)
		.await?;
	Ok(())
}

/// Cards of the students of a customer, with the student's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ChildCard {
	pub student_id: i64,
	pub first_name: String,
	pub last_name: String,
	pub grade: String,
	pub card_number: Option<String>,
	pub state: Option<String>,
	pub balance: Option<Guaranies>,
	pub alert_threshold: Option<Guaranies>,
}

pub async fn list_children_cards(conn: &mut SqliteConnection, customer_id: i64) -> Result<Vec<ChildCard>> {
	Ok(sqlx::query_as::<_, ChildCard>(
		"SELECT s.id AS student_id, s.first_name, s.last_name, s.grade,
				c.card_number, c.state, c.balance, c.alert_threshold
		 FROM students s LEFT JOIN cards c ON c.student_id = s.id
		 WHERE s.customer_id = ? AND s.active = 1
		 ORDER BY s.first_name, s.id",
	)
	.bind(customer_id)
	.fetch_all(&mut *conn)
	.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Recharge {
	pub id: i64,
	pub card_number: String,
	pub amount: Guaranies,
	#[sqlx(try_from = "String")]
	pub source: RechargeSource,
	#[sqlx(try_from = "String")]
	pub state: RechargeState,
	pub employee_id: Option<i64>,
	pub portal_user_id: Option<i64>,
	pub cash_session_id: Option<i64>,
	pub pay_request_id: Option<String>,
	pub tx_id: Option<String>,
	pub debt_paid: Guaranies,
	pub balance_after: Option<Guaranies>,
	pub note: Option<String>,
	pub created_at: DateTime<Utc>,
	pub confirmed_at: Option<DateTime<Utc>>,
}

const RECHARGE_COLUMNS: &str = "id, card_number, amount, source, state, employee_id, portal_user_id, \
	cash_session_id, pay_request_id, tx_id, debt_paid, balance_after, note, created_at, confirmed_at";

#[derive(Debug, Clone)]
pub struct NewRecharge {
	pub card_number: String,
	pub amount: Guaranies,
	pub source: RechargeSource,
	pub state: RechargeState,
	pub employee_id: Option<i64>,
	pub portal_user_id: Option<i64>,
	pub cash_session_id: Option<i64>,
	pub pay_request_id: Option<String>,
	pub debt_paid: Guaranies,
	pub balance_after: Option<Guaranies>,
	pub note: Option<String>,
}

pub async fn insert_recharge(conn: &mut SqliteConnection, new: &NewRecharge) -> Result<Recharge> {
	let now = Utc::now();
	let confirmed_at = (new.state == RechargeState::Confirmed).then_some(now);
	let sql = format!(
		"INSERT INTO recharges (card_number, amount, source, state, employee_id, portal_user_id,
			cash_session_id, pay_request_id, debt_paid, balance_after, note, created_at, confirmed_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
		RECHARGE_COLUMNS
	);
	Ok(sqlx::query_as::<_, Recharge>(&sql)
		.bind(&new.card_number)
		.bind(new.amount)
		.bind(new.source.as_str())
		.bind(new.state.as_str())
		.bind(new.employee_id)
		.bind(new.portal_user_id)
		.bind(new.cash_session_id)
		.bind(&new.pay_request_id)
		.bind(new.debt_paid)
		.bind(new.balance_after)
		.bind(&new.note)
		.bind(now)
		.bind(confirmed_at)
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn find_recharge_by_request(conn: &mut SqliteConnection, pay_request_id: &str) -> Result<Option<Recharge>> {
	let sql = format!("SELECT {} FROM recharges WHERE pay_request_id = ?", RECHARGE_COLUMNS);
	Ok(sqlx::query_as::<_, Recharge>(&sql)
		.bind(pay_request_id)
		.fetch_optional(&mut *conn)
		.await?)
}

pub async fn get_recharge(conn: &mut SqliteConnection, id: i64) -> Result<Recharge> {
	let sql = format!("SELECT {} FROM recharges WHERE id = ?", RECHARGE_COLUMNS);
	sqlx::query_as::<_, Recharge>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Recharge", id))
}

/// Moves a pending recharge to a final state.
pub async fn finish_recharge(
	conn: &mut SqliteConnection,
	id: i64,
	state: RechargeState,
	tx_id: Option<&str>,
	debt_paid: Guaranies,
	balance_after: Option<Guaranies>,
) -> Result<Recharge> {
	let confirmed_at = (state == RechargeState::Confirmed).then(Utc::now);
	let sql = format!(
		"UPDATE recharges SET state = ?, tx_id = COALESCE(?, tx_id), debt_paid = ?, balance_after = ?,
			confirmed_at = ?
		 WHERE id = ? RETURNING {}",
		RECHARGE_COLUMNS
	);
	sqlx::query_as::<_, Recharge>(&sql)
		.bind(state.as_str())
		.bind(tx_id)
		.bind(debt_paid)
		.bind(balance_after)
		.bind(confirmed_at)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Recharge", id))
}

pub async fn list_recharges_for_cards(conn: &mut SqliteConnection, card_numbers: &[String]) -> Result<Vec<Recharge>> {
	if card_numbers.is_empty() {
		return Ok(Vec::new());
	}
	let placeholders = vec!["?"; card_numbers.len()].join(", ");
	let sql = format!(
		"SELECT {} FROM recharges WHERE card_number IN ({}) ORDER BY created_at DESC, id DESC",
		RECHARGE_COLUMNS, placeholders
	);
	let mut query = sqlx::query_as::<_, Recharge>(&sql);
	for number in card_numbers {
		query = query.bind(number);
	}
	Ok(query.fetch_all(&mut *conn).await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Consumption {
	pub id: i64,
	pub card_number: String,
	pub sale_id: Option<i64>,
	pub amount: Guaranies,
	pub detail: String,
	pub balance_before: Guaranies,
	pub balance_after: Guaranies,
	pub employee_id: Option<i64>,
	pub created_at: DateTime<Utc>,
}

pub async fn insert_consumption(
	conn: &mut SqliteConnection,
	card_number: &str,
	sale_id: Option<i64>,
	amount: Guaranies,
	detail: &str,
	balance_before: Guaranies,
	employee_id: Option<i64>,
) -> Result<Consumption> {
	Ok(sqlx::query_as::<_, Consumption>(
		"INSERT INTO card_consumptions
			(card_number, sale_id, amount, detail, balance_before, balance_after, employee_id, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
		 RETURNING id, card_number, sale_id, amount, detail, balance_before, balance_after, employee_id, created_at",
	)
	.bind(card_number)
	.bind(sale_id)
	.bind(amount)
	.bind(detail)
	.bind(balance_before)
	.bind(balance_before - amount)
	.bind(employee_id)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn list_consumptions_for_sale(conn: &mut SqliteConnection, sale_id: i64) -> Result<Vec<Consumption>> {
	Ok(sqlx::query_as::<_, Consumption>(
		"SELECT id, card_number, sale_id, amount, detail, balance_before, balance_after, employee_id, created_at
		 FROM card_consumptions WHERE sale_id = ? ORDER BY id",
	)
	.bind(sale_id)
	.fetch_all(&mut *conn)
	.await?)
}

/// One line of a card statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Movement {
	/// `RECHARGE` or `CONSUMPTION`.
	pub movement: String,
	pub id: i64,
	/// Positive for recharges, negative for consumptions.
	pub amount: Guaranies,
	pub detail: String,
	pub balance_after: Option<Guaranies>,
	pub created_at: DateTime<Utc>,
}

/// Confirmed recharges and consumptions of a card, newest first.
pub async fn list_movements(conn: &mut SqliteConnection, card_number: &str, limit: i64) -> Result<Vec<Movement>> {
	Ok(sqlx::query_as::<_, Movement>(
		"SELECT movement, id, amount, detail, balance_after, created_at FROM (
			SELECT 'RECHARGE' AS movement, id, amount, 'Recarga ' || source AS detail, balance_after, created_at
			FROM recharges WHERE card_number = ?1 AND state = 'CONFIRMED'
			UNION ALL
			SELECT 'CONSUMPTION' AS movement, id, -amount AS amount, detail, balance_after, created_at
			FROM card_consumptions WHERE card_number = ?1
		 )
		 ORDER BY created_at DESC, id DESC
		 LIMIT ?2",
	)
	.bind(card_number)
	.bind(limit)
	.fetch_all(&mut *conn)
	.await?)
}

/// Confirmed recharges minus consumptions; equals the stored balance.
pub async fn ledger_balance(conn: &mut SqliteConnection, card_number: &str) -> Result<Guaranies> {
	let (balance,): (i64,) = sqlx::query_as(
		"SELECT
			COALESCE((SELECT SUM(amount) FROM recharges WHERE card_number = ?1 AND state = 'CONFIRMED'), 0)
			- COALESCE((SELECT SUM(amount) FROM card_consumptions WHERE card_number = ?1), 0)",
	)
	.bind(card_number)
	.fetch_one(&mut *conn)
	.await?;
	Ok(Guaranies(balance))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;
	use crate::repositories::customers::{NewStudent, insert_student};
	use rstest::rstest;

	async fn card_fixture(db: &Database) -> Card {
		let mut conn = db.pool().acquire().await.unwrap();
		let student = insert_student(
			&mut conn,
			&NewStudent {
				customer_id: 1,
				first_name: "Sofía".into(),
				last_name: "Acosta".into(),
				grade: "5B".into(),
				birth_date: None,
			},
		)
		.await
		.unwrap();
		insert_card(&mut conn, "0001001", student.id, None, None).await.unwrap()
	}

	#[tokio::test]
	async fn test_ledger_matches_movements() {
		let db = Database::in_memory().await.unwrap();
		let card = card_fixture(&db).await;
		let mut conn = db.pool().acquire().await.unwrap();
		assert_eq!(card.balance, Guaranies::ZERO);
		assert_eq!(card.state, CardState::Active);

		insert_recharge(
			&mut conn,
			&NewRecharge {
				card_number: card.card_number.clone(),
				amount: Guaranies(50_000),
				source: RechargeSource::Cash,
				state: RechargeState::Confirmed,
				employee_id: None,
				portal_user_id: None,
				cash_session_id: None,
				pay_request_id: None,
				debt_paid: Guaranies::ZERO,
				balance_after: Some(Guaranies(50_000)),
				note: None,
			},
		)
		.await
		.unwrap();
		let consumption = insert_consumption(&mut conn, &card.card_number, None, Guaranies(12_000), "Almuerzo", Guaranies(50_000), None)
			.await
			.unwrap();
		assert_eq!(consumption.balance_after, Guaranies(38_000));

		assert_eq!(ledger_balance(&mut conn, &card.card_number).await.unwrap(), Guaranies(38_000));
		let movements = list_movements(&mut conn, &card.card_number, 50).await.unwrap();
		assert_eq!(movements.len(), 2);
		assert!(movements.iter().any(|m| m.movement == "CONSUMPTION" && m.amount == Guaranies(-12_000)));
	}

	#[tokio::test]
	async fn test_one_card_per_student() {
		let db = Database::in_memory().await.unwrap();
		let card = card_fixture(&db).await;
		let mut conn = db.pool().acquire().await.unwrap();
		let err = insert_card(&mut conn, "0001002", card.student_id, None, None).await.unwrap_err();
		assert!(matches!(err, Error::Conflict(_)));
	}

	fn card_with(state: CardState, expires_on: Option<NaiveDate>) -> Card {
		Card {
			card_number: "0009".into(),
			student_id: 1,
			balance: Guaranies::ZERO,
			state,
			expires_on,
			alert_threshold: None,
			allows_negative: false,
			credit_limit: Guaranies::ZERO,
			last_notified_at: None,
			created_at: Utc::now(),
		}
	}

	#[rstest]
	#[case(CardState::Active, None, true, true)]
	#[case(CardState::Blocked, None, false, false)]
	#[case(CardState::Expired, None, false, true)]
	#[case(CardState::Active, Some((2026, 1, 31)), false, true)]
	#[case(CardState::Active, Some((2026, 2, 1)), true, true)]
	fn test_card_usage_rules(
		#[case] state: CardState,
		#[case] expiry: Option<(i32, u32, u32)>,
		#[case] can_consume: bool,
		#[case] can_recharge: bool,
	) {
		let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
		let expires_on = expiry.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
		let card = card_with(state, expires_on);
		assert_eq!(card.check_can_consume(today).is_ok(), can_consume);
		assert_eq!(card.check_can_recharge().is_ok(), can_recharge);
	}
}
