//! Lunch types, plans, subscriptions, served lunches and monthly accounts.

use cantina_core::enums::{AccountState, LunchPaymentMethod, MonthlyPaymentState, SubscriptionState};
use cantina_core::lunch::{YearMonth, account_state, pending_amount};
use cantina_core::{Guaranies, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LunchType {
	pub id: i64,
	pub name: String,
	pub main_course: String,
	pub includes_dessert: bool,
	pub includes_drink: bool,
	pub price: Guaranies,
	pub active: bool,
}

impl LunchType {
	pub fn components(&self) -> Vec<String> {
		cantina_core::lunch::components(&self.main_course, self.includes_dessert, self.includes_drink)
	}
}

const TYPE_COLUMNS: &str = "id, name, main_course, includes_dessert, includes_drink, price, active";

pub async fn insert_lunch_type(
	conn: &mut SqliteConnection,
	name: &str,
	main_course: &str,
	includes_dessert: bool,
	includes_drink: bool,
	price: Guaranies,
) -> Result<LunchType> {
	let sql = format!(
		"INSERT INTO lunch_types (name, main_course, includes_dessert, includes_drink, price)
		 VALUES (?, ?, ?, ?, ?) RETURNING {}",
		TYPE_COLUMNS
	);
	Ok(sqlx::query_as::<_, LunchType>(&sql)
		.bind(name)
		.bind(main_course)
		.bind(includes_dessert)
		.bind(includes_drink)
		.bind(price)
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn list_lunch_types(conn: &mut SqliteConnection) -> Result<Vec<LunchType>> {
	let sql = format!("SELECT {} FROM lunch_types ORDER BY name", TYPE_COLUMNS);
	Ok(sqlx::query_as::<_, LunchType>(&sql).fetch_all(&mut *conn).await?)
}

pub async fn get_lunch_type(conn: &mut SqliteConnection, id: i64) -> Result<LunchType> {
	let sql = format!("SELECT {} FROM lunch_types WHERE id = ?", TYPE_COLUMNS);
	sqlx::query_as::<_, LunchType>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Lunch type", id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LunchPlan {
	pub id: i64,
	pub name: String,
	pub lunch_type_id: i64,
	pub lunch_type: String,
	pub days_per_week: i64,
	pub monthly_price: Guaranies,
	pub active: bool,
}

const PLAN_SELECT: &str = "SELECT p.id, p.name, p.lunch_type_id, t.name AS lunch_type, p.days_per_week, \
	p.monthly_price, p.active FROM lunch_plans p JOIN lunch_types t ON t.id = p.lunch_type_id";

pub async fn insert_plan(
	conn: &mut SqliteConnection,
	name: &str,
	lunch_type_id: i64,
	days_per_week: i64,
	monthly_price: Guaranies,
) -> Result<LunchPlan> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO lunch_plans (name, lunch_type_id, days_per_week, monthly_price) VALUES (?, ?, ?, ?) RETURNING id",
	)
	.bind(name)
	.bind(lunch_type_id)
	.bind(days_per_week)
	.bind(monthly_price)
	.fetch_one(&mut *conn)
	.await?;
	get_plan(conn, id).await
}

pub async fn get_plan(conn: &mut SqliteConnection, id: i64) -> Result<LunchPlan> {
	let sql = format!("{} WHERE p.id = ?", PLAN_SELECT);
	sqlx::query_as::<_, LunchPlan>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Lunch plan", id))
}

pub async fn list_plans(conn: &mut SqliteConnection) -> Result<Vec<LunchPlan>> {
	let sql = format!("{} ORDER BY p.name", PLAN_SELECT);
	Ok(sqlx::query_as::<_, LunchPlan>(&sql).fetch_all(&mut *conn).await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Subscription {
	pub id: i64,
	pub student_id: i64,
	pub student: String,
	pub plan_id: i64,
	pub plan: String,
	pub monthly_price: Guaranies,
	pub start_date: NaiveDate,
	pub end_date: Option<NaiveDate>,
	#[sqlx(try_from = "String")]
	pub state: SubscriptionState,
	pub created_at: DateTime<Utc>,
}

const SUBSCRIPTION_SELECT: &str = "SELECT s.id, s.student_id, st.first_name || ' ' || st.last_name AS student, \
	s.plan_id, p.name AS plan, p.monthly_price, s.start_date, s.end_date, s.state, s.created_at \
	FROM lunch_subscriptions s \
	JOIN students st ON st.id = s.student_id \
	JOIN lunch_plans p ON p.id = s.plan_id";

pub async fn insert_subscription(
	conn: &mut SqliteConnection,
	student_id: i64,
	plan_id: i64,
	start_date: NaiveDate,
	end_date: Option<NaiveDate>,
) -> Result<Subscription> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO lunch_subscriptions (student_id, plan_id, start_date, end_date, created_at)
		 VALUES (?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(student_id)
	.bind(plan_id)
	.bind(start_date)
	.bind(end_date)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?;
	get_subscription(conn, id).await
}

pub async fn get_subscription(conn: &mut SqliteConnection, id: i64) -> Result<Subscription> {
	let sql = format!("{} WHERE s.id = ?", SUBSCRIPTION_SELECT);
	sqlx::query_as::<_, Subscription>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Subscription", id))
}

pub async fn list_subscriptions(
	conn: &mut SqliteConnection,
	student_id: Option<i64>,
	state: Option<SubscriptionState>,
) -> Result<Vec<Subscription>> {
	let sql = format!(
		"{} WHERE (?1 IS NULL OR s.student_id = ?1) AND (?2 IS NULL OR s.state = ?2) ORDER BY s.id",
		SUBSCRIPTION_SELECT
	);
	Ok(sqlx::query_as::<_, Subscription>(&sql)
		.bind(student_id)
		.bind(state.map(|s| s.as_str()))
		.fetch_all(&mut *conn)
		.await?)
}

pub async fn set_subscription_state(
	conn: &mut SqliteConnection,
	id: i64,
	state: SubscriptionState,
	end_date: Option<NaiveDate>,
) -> Result<Subscription> {
	let result = sqlx::query("UPDATE lunch_subscriptions SET state = ?, end_date = COALESCE(?, end_date) WHERE id = ?")
		.bind(state.as_str())
		.bind(end_date)
		.bind(id)
		.execute(&mut *conn)
		.await?;
	if result.rows_affected() == 0 {
		return Err(not_found("Subscription", id));
	}
	get_subscription(conn, id).await
}

/// Active subscriptions whose dates overlap `month`.
pub async fn subscriptions_billable_in(conn: &mut SqliteConnection, month: YearMonth) -> Result<Vec<Subscription>> {
	let sql = format!(
		"{} WHERE s.state = 'ACTIVE' AND s.start_date < ?1 AND (s.end_date IS NULL OR s.end_date >= ?2)
		 ORDER BY s.id",
		SUBSCRIPTION_SELECT
	);
	Ok(sqlx::query_as::<_, Subscription>(&sql)
		.bind(month.next_first_day())
		.bind(month.first_day())
		.fetch_all(&mut *conn)
		.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct MonthlyPayment {
	pub id: i64,
	pub subscription_id: i64,
	pub year: i64,
	pub month: i64,
	pub amount: Guaranies,
	pub due_date: NaiveDate,
	#[sqlx(try_from = "String")]
	pub state: MonthlyPaymentState,
	pub method: Option<String>,
	pub paid_at: Option<DateTime<Utc>>,
	pub employee_id: Option<i64>,
}

const PAYMENT_COLUMNS: &str = "id, subscription_id, year, month, amount, due_date, state, method, paid_at, employee_id";

/// Inserts the fee of a subscription for a month unless it already exists.
///
/// Returns `None` when the fee was generated before.
pub async fn insert_monthly_payment(
	conn: &mut SqliteConnection,
	subscription_id: i64,
	month: YearMonth,
	amount: Guaranies,
) -> Result<Option<MonthlyPayment>> {
	let sql = format!(
		"INSERT INTO lunch_monthly_payments (subscription_id, year, month, amount, due_date)
		 VALUES (?, ?, ?, ?, ?)
		 ON CONFLICT (subscription_id, year, month) DO NOTHING
		 RETURNING {}",
		PAYMENT_COLUMNS
	);
	Ok(sqlx::query_as::<_, MonthlyPayment>(&sql)
		.bind(subscription_id)
		.bind(month.year)
		.bind(i64::from(month.month))
		.bind(amount)
		.bind(month.due_date())
		.fetch_optional(&mut *conn)
		.await?)
}

pub async fn get_monthly_payment(conn: &mut SqliteConnection, id: i64) -> Result<MonthlyPayment> {
	let sql = format!("SELECT {} FROM lunch_monthly_payments WHERE id = ?", PAYMENT_COLUMNS);
	sqlx::query_as::<_, MonthlyPayment>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Monthly payment", id))
}

pub async fn list_monthly_payments(
	conn: &mut SqliteConnection,
	subscription_id: Option<i64>,
	month: Option<YearMonth>,
) -> Result<Vec<MonthlyPayment>> {
	let sql = format!(
		"SELECT {} FROM lunch_monthly_payments
		 WHERE (?1 IS NULL OR subscription_id = ?1) AND (?2 IS NULL OR year = ?2) AND (?3 IS NULL OR month = ?3)
		 ORDER BY year, month, id",
		PAYMENT_COLUMNS
	);
	Ok(sqlx::query_as::<_, MonthlyPayment>(&sql)
		.bind(subscription_id)
		.bind(month.map(|m| m.year))
		.bind(month.map(|m| i64::from(m.month)))
		.fetch_all(&mut *conn)
		.await?)
}

pub async fn mark_monthly_paid(
	conn: &mut SqliteConnection,
	id: i64,
	method: LunchPaymentMethod,
	employee_id: i64,
) -> Result<MonthlyPayment> {
	let sql = format!(
		"UPDATE lunch_monthly_payments SET state = 'PAID', method = ?, paid_at = ?, employee_id = ?
		 WHERE id = ? RETURNING {}",
		PAYMENT_COLUMNS
	);
	sqlx::query_as::<_, MonthlyPayment>(&sql)
		.bind(method.as_str())
		.bind(Utc::now())
		.bind(employee_id)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Monthly payment", id))
}

/// Flags pending fees whose due date passed and returns them.
pub async fn mark_overdue(conn: &mut SqliteConnection, today: NaiveDate) -> Result<Vec<MonthlyPayment>> {
	let sql = format!(
		"UPDATE lunch_monthly_payments SET state = 'OVERDUE'
		 WHERE state = 'PENDING' AND due_date < ? RETURNING {}",
		PAYMENT_COLUMNS
	);
	Ok(sqlx::query_as::<_, MonthlyPayment>(&sql).bind(today).fetch_all(&mut *conn).await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LunchRecord {
	pub id: i64,
	pub student_id: i64,
	pub lunch_type_id: i64,
	pub lunch_type: String,
	pub served_on: NaiveDate,
	pub amount: Guaranies,
	pub charged_to_card: bool,
	pub card_consumption_id: Option<i64>,
	pub employee_id: Option<i64>,
	pub notes: Option<String>,
	pub created_at: DateTime<Utc>,
}

const RECORD_SELECT: &str = "SELECT r.id, r.student_id, r.lunch_type_id, t.name AS lunch_type, r.served_on, \
	r.amount, r.charged_to_card, r.card_consumption_id, r.employee_id, r.notes, r.created_at \
	FROM lunch_records r JOIN lunch_types t ON t.id = r.lunch_type_id";

#[derive(Debug, Clone)]
pub struct NewLunchRecord {
	pub student_id: i64,
	pub lunch_type_id: i64,
	pub served_on: NaiveDate,
	pub amount: Guaranies,
	pub card_consumption_id: Option<i64>,
	pub employee_id: i64,
	pub notes: Option<String>,
}

pub async fn insert_lunch_record(conn: &mut SqliteConnection, new: &NewLunchRecord) -> Result<LunchRecord> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO lunch_records
			(student_id, lunch_type_id, served_on, amount, charged_to_card, card_consumption_id, employee_id, notes, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(new.student_id)
	.bind(new.lunch_type_id)
	.bind(new.served_on)
	.bind(new.amount)
	.bind(new.card_consumption_id.is_some())
	.bind(new.card_consumption_id)
	.bind(new.employee_id)
	.bind(&new.notes)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?;
	let sql = format!("{} WHERE r.id = ?", RECORD_SELECT);
	Ok(sqlx::query_as::<_, LunchRecord>(&sql).bind(id).fetch_one(&mut *conn).await?)
}

pub async fn list_records(conn: &mut SqliteConnection, student_id: i64, month: YearMonth) -> Result<Vec<LunchRecord>> {
	let sql = format!(
		"{} WHERE r.student_id = ? AND r.served_on >= ? AND r.served_on < ? ORDER BY r.served_on",
		RECORD_SELECT
	);
	Ok(sqlx::query_as::<_, LunchRecord>(&sql)
		.bind(student_id)
		.bind(month.first_day())
		.bind(month.next_first_day())
		.fetch_all(&mut *conn)
		.await?)
}

/// Students with lunches billable to their monthly account in `month`.
pub async fn students_with_records(conn: &mut SqliteConnection, month: YearMonth) -> Result<Vec<i64>> {
	let rows: Vec<(i64,)> = sqlx::query_as(
		"SELECT DISTINCT student_id FROM lunch_records
		 WHERE charged_to_card = 0 AND served_on >= ? AND served_on < ? ORDER BY student_id",
	)
	.bind(month.first_day())
	.bind(month.next_first_day())
	.fetch_all(&mut *conn)
	.await?;
	Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LunchAccount {
	pub id: i64,
	pub student_id: i64,
	pub year: i64,
	pub month: i64,
	pub lunches: i64,
	pub total_amount: Guaranies,
	pub paid_amount: Guaranies,
	#[sqlx(try_from = "String")]
	pub state: AccountState,
	pub generated_at: DateTime<Utc>,
}

impl LunchAccount {
	pub fn pending_balance(&self) -> Guaranies {
		pending_amount(self.total_amount, self.paid_amount)
	}
}

const ACCOUNT_COLUMNS: &str = "id, student_id, year, month, lunches, total_amount, paid_amount, state, generated_at";

/// Creates or refreshes the account of a student for a month from the lunches
/// that were not charged to the card.
pub async fn generate_account(conn: &mut SqliteConnection, student_id: i64, month: YearMonth) -> Result<LunchAccount> {
	let (lunches, total): (i64, i64) = sqlx::query_as(
		"SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM lunch_records
		 WHERE student_id = ? AND charged_to_card = 0 AND served_on >= ? AND served_on < ?",
	)
	.bind(student_id)
	.bind(month.first_day())
	.bind(month.next_first_day())
	.fetch_one(&mut *conn)
	.await?;

	let sql = format!(
		"INSERT INTO lunch_accounts (student_id, year, month, lunches, total_amount, generated_at)
		 VALUES (?, ?, ?, ?, ?, ?)
		 ON CONFLICT (student_id, year, month)
		 DO UPDATE SET lunches = excluded.lunches, total_amount = excluded.total_amount,
			generated_at = excluded.generated_at
		 RETURNING {}",
		ACCOUNT_COLUMNS
	);
	let account = sqlx::query_as::<_, LunchAccount>(&sql)
		.bind(student_id)
		.bind(month.year)
		.bind(i64::from(month.month))
		.bind(lunches)
		.bind(Guaranies(total))
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?;
	refresh_account_state(conn, account).await
}

async fn refresh_account_state(conn: &mut SqliteConnection, account: LunchAccount) -> Result<LunchAccount> {
	let state = account_state(account.total_amount, account.paid_amount);
	if state == account.state {
		return Ok(account);
	}
	let sql = format!("UPDATE lunch_accounts SET state = ? WHERE id = ? RETURNING {}", ACCOUNT_COLUMNS);
	Ok(sqlx::query_as::<_, LunchAccount>(&sql)
		.bind(state.as_str())
		.bind(account.id)
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn get_account(conn: &mut SqliteConnection, id: i64) -> Result<LunchAccount> {
	let sql = format!("SELECT {} FROM lunch_accounts WHERE id = ?", ACCOUNT_COLUMNS);
	sqlx::query_as::<_, LunchAccount>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Lunch account", id))
}

pub async fn find_account(
	conn: &mut SqliteConnection,
	student_id: i64,
	month: YearMonth,
) -> Result<Option<LunchAccount>> {
	let sql = format!(
		"SELECT {} FROM lunch_accounts WHERE student_id = ? AND year = ? AND month = ?",
		ACCOUNT_COLUMNS
	);
	Ok(sqlx::query_as::<_, LunchAccount>(&sql)
		.bind(student_id)
		.bind(month.year)
		.bind(i64::from(month.month))
		.fetch_optional(&mut *conn)
		.await?)
}

pub async fn list_accounts(
	conn: &mut SqliteConnection,
	month: Option<YearMonth>,
	student_id: Option<i64>,
	state: Option<AccountState>,
) -> Result<Vec<LunchAccount>> {
	let sql = format!(
		"SELECT {} FROM lunch_accounts
		 WHERE (?1 IS NULL OR year = ?1) AND (?2 IS NULL OR month = ?2)
			AND (?3 IS NULL OR student_id = ?3) AND (?4 IS NULL OR state = ?4)
		 ORDER BY year DESC, month DESC, student_id",
		ACCOUNT_COLUMNS
	);
	Ok(sqlx::query_as::<_, LunchAccount>(&sql)
		.bind(month.map(|m| m.year))
		.bind(month.map(|m| i64::from(m.month)))
		.bind(student_id)
		.bind(state.map(|s| s.as_str()))
		.fetch_all(&mut *conn)
		.await?)
}

/// Records a payment against an account and updates its paid amount and state.
pub async fn pay_account(
	conn: &mut SqliteConnection,
	account_id: i64,
	amount: Guaranies,
	method: LunchPaymentMethod,
	reference: Option<&str>,
	employee_id: i64,
) -> Result<LunchAccount> {
	sqlx::query(
		"INSERT INTO lunch_account_payments (account_id, amount, method, reference, employee_id, created_at)
		 VALUES (?, ?, ?, ?, ?, ?)",
	)
	.bind(account_id)
	.bind(amount)
	.bind(method.as_str())
	.bind(reference)
	.bind(employee_id)
	.bind(Utc::now())
	.execute(&mut *conn)
	.await?;

	let sql = format!(
		"UPDATE lunch_accounts SET paid_amount = paid_amount + ? WHERE id = ? RETURNING {}",
		ACCOUNT_COLUMNS
	);
	let account = sqlx::query_as::<_, LunchAccount>(&sql)
		.bind(amount)
		.bind(account_id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Lunch account", account_id))?;
	refresh_account_state(conn, account).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;
	use crate::repositories::accounts::insert_employee;
	use crate::repositories::customers::{NewStudent, insert_student};
	use cantina_core::enums::Role;

	async fn setup(conn: &mut SqliteConnection) -> (i64, i64, LunchType) {
		let employee = insert_employee(conn, "cocina", "hash", "Rosa", "Villalba", Role::Cashier)
			.await
			.unwrap();
		let student = insert_student(
			conn,
			&NewStudent {
				customer_id: 1,
				first_name: "Sofía".to_string(),
				last_name: "Acosta".to_string(),
				grade: "5A".to_string(),
				birth_date: None,
			},
		)
		.await
		.unwrap();
		let lunch_type = insert_lunch_type(conn, "Completo", "Milanesa con puré", true, true, Guaranies::new(25_000))
			.await
			.unwrap();
		(employee.id, student.id, lunch_type)
	}

	fn day(d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
	}

	#[tokio::test]
	async fn test_monthly_fee_generation_is_idempotent() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let (_, student_id, lunch_type) = setup(&mut conn).await;
		let plan = insert_plan(&mut conn, "Lunes a viernes", lunch_type.id, 5, Guaranies::new(400_000))
			.await
			.unwrap();
		let subscription = insert_subscription(&mut conn, student_id, plan.id, day(1), None).await.unwrap();
		let march = YearMonth::new(2026, 3).unwrap();

		let billable = subscriptions_billable_in(&mut conn, march).await.unwrap();
		assert_eq!(billable.len(), 1);
		assert_eq!(billable[0].student, "Sofía Acosta");

		let first = insert_monthly_payment(&mut conn, subscription.id, march, plan.monthly_price)
			.await
			.unwrap();
		assert_eq!(first.unwrap().due_date, day(10));
		let second = insert_monthly_payment(&mut conn, subscription.id, march, plan.monthly_price)
			.await
			.unwrap();
		assert!(second.is_none());

		let overdue = mark_overdue(&mut conn, day(11)).await.unwrap();
		assert_eq!(overdue.len(), 1);
		assert_eq!(overdue[0].state, MonthlyPaymentState::Overdue);
		assert!(mark_overdue(&mut conn, day(12)).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_account_totals_follow_records_and_payments() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let (employee_id, student_id, lunch_type) = setup(&mut conn).await;
		let march = YearMonth::new(2026, 3).unwrap();

		for d in [2, 3, 4] {
			insert_lunch_record(
				&mut conn,
				&NewLunchRecord {
					student_id,
					lunch_type_id: lunch_type.id,
					served_on: day(d),
					amount: lunch_type.price,
					card_consumption_id: None,
					employee_id,
					notes: None,
				},
			)
			.await
			.unwrap();
		}
		let duplicate = insert_lunch_record(
			&mut conn,
			&NewLunchRecord {
				student_id,
				lunch_type_id: lunch_type.id,
				served_on: day(2),
				amount: lunch_type.price,
				card_consumption_id: None,
				employee_id,
				notes: None,
			},
		)
		.await;
		assert!(duplicate.is_err());

		let account = generate_account(&mut conn, student_id, march).await.unwrap();
		assert_eq!(account.lunches, 3);
		assert_eq!(account.total_amount, Guaranies::new(75_000));
		assert_eq!(account.state, AccountState::Pending);

		let account = pay_account(&mut conn, account.id, Guaranies::new(50_000), LunchPaymentMethod::Cash, None, employee_id)
			.await
			.unwrap();
		assert_eq!(account.state, AccountState::Partial);
		assert_eq!(account.pending_balance(), Guaranies::new(25_000));

		let regenerated = generate_account(&mut conn, student_id, march).await.unwrap();
		assert_eq!(regenerated.id, account.id);
		assert_eq!(regenerated.paid_amount, Guaranies::new(50_000));
		assert_eq!(list_records(&mut conn, student_id, march).await.unwrap().len(), 3);
		assert_eq!(students_with_records(&mut conn, march).await.unwrap(), vec![student_id]);
	}
}
