//! Lunch service: subscriptions and their monthly fees, served lunches and
//! monthly accounts.
//!
//! A served lunch is either debited from the student's card on the spot or
//! accumulated in the student's account for the month. Accounts are
//! regenerated from the records, so generating one twice yields the same
//! totals and keeps whatever was already paid.

use cantina_core::enums::{LunchPaymentMethod, MonthlyPaymentState, SubscriptionState};
use cantina_core::lunch::YearMonth;
use cantina_core::restrictions::{self, ProductProfile};
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::cards;
use cantina_db::repositories::customers;
use cantina_db::repositories::lunch::{
	self, LunchAccount, LunchPlan, LunchRecord, LunchType, MonthlyPayment, NewLunchRecord, Subscription,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::services::cards::{SupervisorApproval, approve, charge};
use crate::services::catalog::restriction_profiles;
use crate::services::notifications;
use crate::state::AppState;

pub async fn create_lunch_type(
	state: &AppState,
	employee_id: i64,
	name: &str,
	main_course: &str,
	includes_dessert: bool,
	includes_drink: bool,
	price: Guaranies,
) -> Result<LunchType> {
	if !price.is_positive() {
		return Err(Error::Validation("Lunch price must be greater than zero".to_string()));
	}
	let mut tx = state.db.begin().await?;
	let lunch_type =
		lunch::insert_lunch_type(&mut tx, name.trim(), main_course.trim(), includes_dessert, includes_drink, price)
			.await?;
	audit::record(&mut tx, Actor::Employee(employee_id), "CREATE_LUNCH_TYPE", "lunch_type", lunch_type.id, Some(name))
		.await?;
	tx.commit().await?;
	Ok(lunch_type)
}

pub async fn create_plan(
	state: &AppState,
	employee_id: i64,
	name: &str,
	lunch_type_id: i64,
	days_per_week: i64,
	monthly_price: Guaranies,
) -> Result<LunchPlan> {
	if !(1..=7).contains(&days_per_week) {
		return Err(Error::Validation("Days per week must be between 1 and 7".to_string()));
	}
	if !monthly_price.is_positive() {
		return Err(Error::Validation("Monthly price must be greater than zero".to_string()));
	}
	let mut tx = state.db.begin().await?;
	lunch::get_lunch_type(&mut tx, lunch_type_id).await?;
	let plan = lunch::insert_plan(&mut tx, name.trim(), lunch_type_id, days_per_week, monthly_price).await?;
	audit::record(&mut tx, Actor::Employee(employee_id), "CREATE_LUNCH_PLAN", "lunch_plan", plan.id, Some(name)).await?;
	tx.commit().await?;
	Ok(plan)
}

pub async fn subscribe(
	state: &AppState,
	employee_id: i64,
	student_id: i64,
	plan_id: i64,
	start_date: NaiveDate,
	end_date: Option<NaiveDate>,
) -> Result<Subscription> {
	if end_date.is_some_and(|end| end < start_date) {
		return Err(Error::Validation("Subscription ends before it starts".to_string()));
	}
	let mut tx = state.db.begin().await?;
	let student = customers::get_student(&mut tx, student_id).await?;
	if !student.active {
		return Err(Error::BusinessRule(format!("Student {} is inactive", student.full_name())));
	}
	let plan = lunch::get_plan(&mut tx, plan_id).await?;
	if !plan.active {
		return Err(Error::BusinessRule(format!("Lunch plan '{}' is inactive", plan.name)));
	}
	let current = lunch::list_subscriptions(&mut tx, Some(student_id), None).await?;
	if let Some(open) = current.iter().find(|s| s.state != SubscriptionState::Cancelled) {
		return Err(Error::Conflict(format!(
			"{} already has subscription {} ({})",
			student.full_name(),
			open.id,
			open.state
		)));
	}

	let subscription = lunch::insert_subscription(&mut tx, student_id, plan_id, start_date, end_date).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_SUBSCRIPTION",
		"lunch_subscription",
		subscription.id,
		Some(&format!("{} -> {}", subscription.student, subscription.plan)),
	)
	.await?;
	tx.commit().await?;
	Ok(subscription)
}

fn transition_allowed(from: SubscriptionState, to: SubscriptionState) -> bool {
	use SubscriptionState::*;
	matches!((from, to), (Active, Suspended) | (Suspended, Active) | (Active | Suspended, Cancelled))
}

/// Suspends, reactivates or cancels a subscription.
pub async fn change_subscription(
	state: &AppState,
	employee_id: i64,
	subscription_id: i64,
	target: SubscriptionState,
) -> Result<Subscription> {
	let mut tx = state.db.begin().await?;
	let subscription = lunch::get_subscription(&mut tx, subscription_id).await?;
	if !transition_allowed(subscription.state, target) {
		return Err(Error::BusinessRule(format!(
			"Subscription {} cannot go from {} to {}",
			subscription_id, subscription.state, target
		)));
	}
	let end_date = (target == SubscriptionState::Cancelled).then(|| state.today());
	let updated = lunch::set_subscription_state(&mut tx, subscription_id, target, end_date).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CHANGE_SUBSCRIPTION",
		"lunch_subscription",
		subscription_id,
		Some(&format!("{} -> {}", subscription.state, target)),
	)
	.await?;
	tx.commit().await?;
	Ok(updated)
}

/// Creates the fees of `month` for every billable subscription. Fees that
/// already exist are left alone; only the new ones are returned.
pub async fn generate_monthly_fees(state: &AppState, employee_id: i64, month: YearMonth) -> Result<Vec<MonthlyPayment>> {
	let mut tx = state.db.begin().await?;
	let mut created = Vec::new();
	for subscription in lunch::subscriptions_billable_in(&mut tx, month).await? {
		if let Some(fee) =
			lunch::insert_monthly_payment(&mut tx, subscription.id, month, subscription.monthly_price).await?
		{
			created.push(fee);
		}
	}
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"GENERATE_MONTHLY_FEES",
		"lunch_monthly_payment",
		month,
		Some(&format!("{} new", created.len())),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(month = %month, created = created.len(), "monthly lunch fees generated");
	Ok(created)
}

pub async fn pay_monthly_fee(
	state: &AppState,
	employee_id: i64,
	payment_id: i64,
	method: LunchPaymentMethod,
) -> Result<MonthlyPayment> {
	let mut tx = state.db.begin().await?;
	let fee = lunch::get_monthly_payment(&mut tx, payment_id).await?;
	if fee.state == MonthlyPaymentState::Paid {
		return Err(Error::Conflict(format!("Monthly fee {} is already paid", payment_id)));
	}
	let paid = lunch::mark_monthly_paid(&mut tx, payment_id, method, employee_id).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"PAY_MONTHLY_FEE",
		"lunch_monthly_payment",
		payment_id,
		Some(&format!("{} {}", paid.amount, method)),
	)
	.await?;
	tx.commit().await?;
	Ok(paid)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServeLunch {
	pub student_id: i64,
	pub lunch_type_id: i64,
	/// Today when absent.
	pub served_on: Option<NaiveDate>,
	#[serde(default)]
	pub charge_card: bool,
	#[serde(default)]
	pub acknowledge_restrictions: bool,
	pub supervisor: Option<SupervisorApproval>,
	pub notes: Option<String>,
}

fn lunch_profile(lunch_type: &LunchType) -> ProductProfile {
	ProductProfile {
		id: lunch_type.id,
		description: lunch_type.name.clone(),
		category_id: None,
		category: None,
		active: lunch_type.active,
		components: lunch_type.components(),
	}
}

/// Registers a served lunch.
pub async fn serve_lunch(state: &AppState, employee_id: i64, input: &ServeLunch) -> Result<LunchRecord> {
	let today = state.today();
	let served_on = input.served_on.unwrap_or(today);
	let month = YearMonth::new(served_on.year(), served_on.month())?;
	let mut tx = state.db.begin().await?;

	let student = customers::get_student(&mut tx, input.student_id).await?;
	if !student.active {
		return Err(Error::BusinessRule(format!("Student {} is inactive", student.full_name())));
	}
	let lunch_type = lunch::get_lunch_type(&mut tx, input.lunch_type_id).await?;
	if !lunch_type.active {
		return Err(Error::BusinessRule(format!("Lunch type '{}' is inactive", lunch_type.name)));
	}
	if lunch::list_records(&mut tx, student.id, month)
		.await?
		.iter()
		.any(|r| r.served_on == served_on)
	{
		return Err(Error::Conflict(format!(
			"{} already had lunch on {}",
			student.full_name(),
			served_on
		)));
	}

	let restrictions = customers::list_restrictions(&mut tx, student.id).await?;
	let conflicts = restrictions::analyze_cart(&[lunch_profile(&lunch_type)], &restriction_profiles(&restrictions));
	if conflicts.iter().any(|c| c.requires_authorization) && !input.acknowledge_restrictions {
		return Err(Error::Conflict(format!(
			"Dietary restriction conflict: {} for {}",
			lunch_type.name,
			student.full_name()
		)));
	}

	let consumption_id = if input.charge_card {
		let card = cards::find_card_by_student(&mut tx, student.id)
			.await?
			.ok_or_else(|| Error::BusinessRule(format!("{} has no card", student.full_name())))?;
		let approval = match &input.supervisor {
			Some(supervisor) => Some(approve(&mut tx, state.hasher.as_ref(), supervisor).await?),
			None => None,
		};
		let detail = format!("Almuerzo {} {}", lunch_type.name, served_on);
		let consumption = charge(
			&mut tx,
			&card,
			lunch_type.price,
			&detail,
			None,
			employee_id,
			approval.as_ref(),
			today,
		)
		.await?;
		let card = cards::get_card(&mut tx, &card.card_number).await?;
		notifications::evaluate_card(&mut tx, &card, &state.settings.business, Utc::now()).await?;
		Some(consumption.id)
	} else {
		None
	};

	let record = lunch::insert_lunch_record(
		&mut tx,
		&NewLunchRecord {
			student_id: student.id,
			lunch_type_id: lunch_type.id,
			served_on,
			amount: lunch_type.price,
			card_consumption_id: consumption_id,
			employee_id,
			notes: input.notes.clone(),
		},
	)
	.await?;
	if consumption_id.is_none() {
		lunch::generate_account(&mut tx, student.id, month).await?;
	}
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"SERVE_LUNCH",
		"lunch_record",
		record.id,
		Some(&format!(
			"{} {} {}",
			student.full_name(),
			lunch_type.name,
			if record.charged_to_card { "card" } else { "account" }
		)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(student_id = student.id, served_on = %served_on, card = record.charged_to_card, "lunch served");
	Ok(record)
}

/// Builds or refreshes the accounts of every student with lunches in `month`.
pub async fn generate_accounts(state: &AppState, employee_id: i64, month: YearMonth) -> Result<Vec<LunchAccount>> {
	let mut tx = state.db.begin().await?;
	let mut accounts = Vec::new();
	for student_id in lunch::students_with_records(&mut tx, month).await? {
		accounts.push(lunch::generate_account(&mut tx, student_id, month).await?);
	}
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"GENERATE_LUNCH_ACCOUNTS",
		"lunch_account",
		month,
		Some(&format!("{} accounts", accounts.len())),
	)
	.await?;
	tx.commit().await?;
	Ok(accounts)
}

pub async fn pay_account(
	state: &AppState,
	employee_id: i64,
	account_id: i64,
	amount: Guaranies,
	method: LunchPaymentMethod,
	reference: Option<&str>,
) -> Result<LunchAccount> {
	let mut tx = state.db.begin().await?;
	let account = lunch::get_account(&mut tx, account_id).await?;
	let pending = account.pending_balance();
	if !amount.is_positive() || amount > pending {
		return Err(Error::Validation(format!(
			"Payment must be between 1 and the pending balance of {}",
			pending
		)));
	}
	let updated = lunch::pay_account(&mut tx, account_id, amount, method, reference, employee_id).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"PAY_LUNCH_ACCOUNT",
		"lunch_account",
		account_id,
		Some(&format!("{} {}", amount, method)),
	)
	.await?;
	tx.commit().await?;
	Ok(updated)
}

/// A student's lunches in a month and the account they produced.
#[derive(Debug, Clone, Serialize)]
pub struct LunchStatement {
	pub student_id: i64,
	pub month: String,
	pub label: String,
	pub records: Vec<LunchRecord>,
	pub account: Option<LunchAccount>,
	pub pending_balance: Guaranies,
}

pub(crate) async fn statement(conn: &mut SqliteConnection, student_id: i64, month: YearMonth) -> Result<LunchStatement> {
	let records = lunch::list_records(conn, student_id, month).await?;
	let account = lunch::find_account(conn, student_id, month).await?;
	Ok(LunchStatement {
		student_id,
		month: month.to_string(),
		label: month.label(),
		pending_balance: account.as_ref().map_or(Guaranies::ZERO, LunchAccount::pending_balance),
		records,
		account,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::cards::recharge_at_pos;
	use crate::services::testing::{CARD, TestEnv, env};
	use cantina_core::enums::{AccountState, RestrictionKind};
	use rstest::rstest;

	async fn lunch_type(env: &TestEnv) -> LunchType {
		create_lunch_type(&env.state, env.manager_id, "Completo", "Pollo al horno", true, true, Guaranies(25_000))
			.await
			.unwrap()
	}

	fn serve(env: &TestEnv, lunch_type_id: i64, day: NaiveDate, charge_card: bool) -> ServeLunch {
		ServeLunch {
			student_id: env.student_id,
			lunch_type_id,
			served_on: Some(day),
			charge_card,
			acknowledge_restrictions: false,
			supervisor: None,
			notes: None,
		}
	}

	#[rstest]
	#[case(SubscriptionState::Active, SubscriptionState::Suspended, true)]
	#[case(SubscriptionState::Suspended, SubscriptionState::Active, true)]
	#[case(SubscriptionState::Suspended, SubscriptionState::Cancelled, true)]
	#[case(SubscriptionState::Cancelled, SubscriptionState::Active, false)]
	#[case(SubscriptionState::Active, SubscriptionState::Active, false)]
	fn test_subscription_transitions(
		#[case] from: SubscriptionState,
		#[case] to: SubscriptionState,
		#[case] allowed: bool,
	) {
		assert_eq!(transition_allowed(from, to), allowed);
	}

	#[rstest]
	#[tokio::test]
	async fn test_fees_are_generated_once(#[future] env: TestEnv) {
		let env = env.await;
		let lunch_type = lunch_type(&env).await;
		let plan = create_plan(&env.state, env.manager_id, "Mensual", lunch_type.id, 5, Guaranies(400_000))
			.await
			.unwrap();
		let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
		subscribe(&env.state, env.manager_id, env.student_id, plan.id, start, None)
			.await
			.unwrap();
		let error = subscribe(&env.state, env.manager_id, env.student_id, plan.id, start, None)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 409);

		let march = YearMonth::new(2026, 3).unwrap();
		let fees = generate_monthly_fees(&env.state, env.manager_id, march).await.unwrap();
		assert_eq!(fees.len(), 1);
		assert!(generate_monthly_fees(&env.state, env.manager_id, march).await.unwrap().is_empty());

		let paid = pay_monthly_fee(&env.state, env.cashier_id, fees[0].id, LunchPaymentMethod::Transfer)
			.await
			.unwrap();
		assert_eq!(paid.state, MonthlyPaymentState::Paid);
		let error = pay_monthly_fee(&env.state, env.cashier_id, fees[0].id, LunchPaymentMethod::Cash)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 409);
	}

	#[rstest]
	#[tokio::test]
	async fn test_lunches_accumulate_in_account(#[future] env: TestEnv) {
		let env = env.await;
		let lunch_type = lunch_type(&env).await;
		let month = YearMonth::new(2026, 4).unwrap();
		for day in [6, 7] {
			let date = NaiveDate::from_ymd_opt(2026, 4, day).unwrap();
			serve_lunch(&env.state, env.cashier_id, &serve(&env, lunch_type.id, date, false))
				.await
				.unwrap();
		}
		let again = NaiveDate::from_ymd_opt(2026, 4, 7).unwrap();
		let error = serve_lunch(&env.state, env.cashier_id, &serve(&env, lunch_type.id, again, false))
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 409);

		let accounts = generate_accounts(&env.state, env.manager_id, month).await.unwrap();
		assert_eq!(accounts.len(), 1);
		assert_eq!(accounts[0].total_amount, Guaranies(50_000));

		let error = pay_account(&env.state, env.cashier_id, accounts[0].id, Guaranies(60_000), LunchPaymentMethod::Cash, None)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 400);
		let account = pay_account(&env.state, env.cashier_id, accounts[0].id, Guaranies(50_000), LunchPaymentMethod::Cash, None)
			.await
			.unwrap();
		assert_eq!(account.state, AccountState::Paid);

		let mut conn = env.state.db.pool().acquire().await.unwrap();
		let statement = statement(&mut conn, env.student_id, month).await.unwrap();
		assert_eq!(statement.records.len(), 2);
		assert_eq!(statement.label, "Abril 2026");
		assert_eq!(statement.pending_balance, Guaranies::ZERO);
	}

	#[rstest]
	#[tokio::test]
	async fn test_lunch_charged_to_card(#[future] env: TestEnv) {
		let env = env.await;
		let lunch_type = lunch_type(&env).await;
		let today = env.state.today();

		let error = serve_lunch(&env.state, env.cashier_id, &serve(&env, lunch_type.id, today, true))
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 422);

		recharge_at_pos(&env.state, env.cashier_id, CARD, Guaranies(30_000), None, None)
			.await
			.unwrap();
		let record = serve_lunch(&env.state, env.cashier_id, &serve(&env, lunch_type.id, today, true))
			.await
			.unwrap();
		assert!(record.charged_to_card);
		assert_eq!(env.card().await.balance, Guaranies(5_000));

		let month = YearMonth::new(today.year(), today.month()).unwrap();
		let mut conn = env.state.db.pool().acquire().await.unwrap();
		assert!(lunch::find_account(&mut conn, env.student_id, month).await.unwrap().is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_lunch_restriction_conflict(#[future] env: TestEnv) {
		let env = env.await;
		let lunch_type =
			create_lunch_type(&env.state, env.manager_id, "Fideos al pesto", "Fideos con pan de ajo", false, false, Guaranies(20_000))
				.await
				.unwrap();
		{
			let mut conn = env.state.db.pool().acquire().await.unwrap();
			customers::insert_restriction(&mut conn, env.student_id, RestrictionKind::Celiac, Some("celiaquía, sin harina"))
				.await
				.unwrap();
		}
		let mut input = serve(&env, lunch_type.id, env.state.today(), false);
		let error = serve_lunch(&env.state, env.cashier_id, &input).await.unwrap_err();
		assert_eq!(error.status_code(), 409);

		input.acknowledge_restrictions = true;
		serve_lunch(&env.state, env.cashier_id, &input).await.unwrap();
	}
}
