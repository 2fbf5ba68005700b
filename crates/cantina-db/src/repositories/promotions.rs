//! Promotions and their targets.

use cantina_core::enums::{PromotionKind, PromotionScope};
use cantina_core::promotions::{PromotionRule, parse_weekdays};
use cantina_core::{Guaranies, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::{join_list, not_found, split_list};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Promotion {
	pub id: i64,
	pub name: String,
	pub description: Option<String>,
	#[sqlx(try_from = "String")]
	pub kind: PromotionKind,
	#[sqlx(try_from = "String")]
	pub scope: PromotionScope,
	pub value: i64,
	pub buy_quantity: Option<i64>,
	pub pay_quantity: Option<i64>,
	pub active: bool,
	pub valid_from: Option<NaiveDate>,
	pub valid_until: Option<NaiveDate>,
	pub start_time: Option<NaiveTime>,
	pub end_time: Option<NaiveTime>,
	pub weekdays: String,
	pub max_uses: Option<i64>,
	pub uses: i64,
	pub code: Option<String>,
	pub minimum_amount: Option<Guaranies>,
	pub minimum_quantity: Option<i64>,
	pub grades: String,
	pub created_at: DateTime<Utc>,
	#[sqlx(skip)]
	pub product_ids: Vec<i64>,
	#[sqlx(skip)]
	pub category_ids: Vec<i64>,
}

impl Promotion {
	pub fn to_rule(&self) -> PromotionRule {
		PromotionRule {
			id: self.id,
			name: self.name.clone(),
			kind: self.kind,
			scope: self.scope,
			value: self.value,
			buy_quantity: self.buy_quantity,
			pay_quantity: self.pay_quantity,
			active: self.active,
			valid_from: self.valid_from,
			valid_until: self.valid_until,
			start_time: self.start_time,
			end_time: self.end_time,
			weekdays: parse_weekdays(&self.weekdays),
			max_uses: self.max_uses,
			uses: self.uses,
			code: self.code.clone(),
			minimum_amount: self.minimum_amount,
			minimum_quantity: self.minimum_quantity,
			product_ids: self.product_ids.clone(),
			category_ids: self.category_ids.clone(),
			grades: split_list(&self.grades),
		}
	}
}

const PROMOTION_COLUMNS: &str = "id, name, description, kind, scope, value, buy_quantity, pay_quantity, active, \
	valid_from, valid_until, start_time, end_time, weekdays, max_uses, uses, code, minimum_amount, \
	minimum_quantity, grades, created_at";

/// Writable fields of a promotion.
#[derive(Debug, Clone)]
pub struct PromotionData {
	pub name: String,
	pub description: Option<String>,
	pub kind: PromotionKind,
	pub scope: PromotionScope,
	pub value: i64,
	pub buy_quantity: Option<i64>,
	pub pay_quantity: Option<i64>,
	pub valid_from: Option<NaiveDate>,
	pub valid_until: Option<NaiveDate>,
	pub start_time: Option<NaiveTime>,
	pub end_time: Option<NaiveTime>,
	pub weekdays: Vec<u32>,
	pub max_uses: Option<i64>,
	pub code: Option<String>,
	pub minimum_amount: Option<Guaranies>,
	pub minimum_quantity: Option<i64>,
	pub grades: Vec<String>,
	pub product_ids: Vec<i64>,
	pub category_ids: Vec<i64>,
}

pub async fn insert_promotion(conn: &mut SqliteConnection, data: &PromotionData) -> Result<Promotion> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO promotions (name, description, kind, scope, value, buy_quantity, pay_quantity,
			valid_from, valid_until, start_time, end_time, weekdays, max_uses, code, minimum_amount,
			minimum_quantity, grades, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(&data.name)
	.bind(&data.description)
	.bind(data.kind.as_str())
	.bind(data.scope.as_str())
	.bind(data.value)
	.bind(data.buy_quantity)
	.bind(data.pay_quantity)
	.bind(data.valid_from)
	.bind(data.valid_until)
	.bind(data.start_time)
	.bind(data.end_time)
	.bind(join_list(&data.weekdays))
	.bind(data.max_uses)
	.bind(&data.code)
	.bind(data.minimum_amount)
	.bind(data.minimum_quantity)
	.bind(join_list(&data.grades))
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?;
	replace_targets(conn, id, &data.product_ids, &data.category_ids).await?;
	get_promotion(conn, id).await
}

pub async fn update_promotion(conn: &mut SqliteConnection, id: i64, data: &PromotionData) -> Result<Promotion> {
	let result = sqlx::query(
		"UPDATE promotions SET name = ?, description = ?, kind = ?, scope = ?, value = ?, buy_quantity = ?,
			pay_quantity = ?, valid_from = ?, valid_until = ?, start_time = ?, end_time = ?, weekdays = ?,
			max_uses = ?, code = ?, minimum_amount = ?, minimum_quantity = ?, grades = ?
		 WHERE id = ?",
	)
	.bind(&data.name)
	.bind(&data.description)
	.bind(data.kind.as_str())
	.bind(data.scope.as_str())
	.bind(data.value)
	.bind(data.buy_quantity)
	.bind(data.pay_quantity)
	.bind(data.valid_from)
	.bind(data.valid_until)
	.bind(data.start_time)
	.bind(data.end_time)
	.bind(join_list(&data.weekdays))
	.bind(data.max_uses)
	.bind(&data.code)
	.bind(data.minimum_amount)
	.bind(data.minimum_quantity)
	.bind(join_list(&data.grades))
	.bind(id)
	.execute(&mut *conn)
	.await?;
	if result.rows_affected() == 0 {
		return Err(not_found("Promotion", id));
	}
	replace_targets(conn, id, &data.product_ids, &data.category_ids).await?;
	get_promotion(conn, id).await
}

async fn replace_targets(
	conn: &mut SqliteConnection,
	promotion_id: i64,
	product_ids: &[i64],
	category_ids: &[i64],
) -> Result<()> {
	sqlx::query("DELETE FROM promotion_products WHERE promotion_id = ?")
		.bind(promotion_id)
		.execute(&mut *conn)
		.await?;
	sqlx::query("DELETE FROM promotion_categories WHERE promotion_id = ?")
		.bind(promotion_id)
		.execute(&mut *conn)
		.await?;
	for product_id in product_ids {
		sqlx::query("INSERT OR IGNORE INTO promotion_products (promotion_id, product_id) VALUES (?, ?)")
			.bind(promotion_id)
			.bind(product_id)
			.execute(&mut *conn)
			.await?;
	}
	for category_id in category_ids {
		sqlx::query("INSERT OR IGNORE INTO promotion_categories (promotion_id, category_id) VALUES (?, ?)")
			.bind(promotion_id)
			.bind(category_id)
			.execute(&mut *conn)
			.await?;
	}
	Ok(())
}

async fn load_targets(conn: &mut SqliteConnection, promotion: &mut Promotion) -> Result<()> {
	let products: Vec<(i64,)> =
		sqlx::query_as("SELECT product_id FROM promotion_products WHERE promotion_id = ? ORDER BY product_id")
			.bind(promotion.id)
			.fetch_all(&mut *conn)
			.await?;
	let categories: Vec<(i64,)> =
		sqlx::query_as("SELECT category_id FROM promotion_categories WHERE promotion_id = ? ORDER BY category_id")
			.bind(promotion.id)
			.fetch_all(&mut *conn)
			.await?;
	promotion.product_ids = products.into_iter().map(|(id,)| id).collect();
	promotion.category_ids = categories.into_iter().map(|(id,)| id).collect();
	Ok(())
}

pub async fn get_promotion(conn: &mut SqliteConnection, id: i64) -> Result<Promotion> {
	let sql = format!("SELECT {} FROM promotions WHERE id = ?", PROMOTION_COLUMNS);
	let mut promotion = sqlx::query_as::<_, Promotion>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Promotion", id))?;
	load_targets(conn, &mut promotion).await?;
	Ok(promotion)
}

pub async fn list_promotions(conn: &mut SqliteConnection, active_only: bool) -> Result<Vec<Promotion>> {
	let sql = format!(
		"SELECT {} FROM promotions WHERE (? = 0 OR active = 1) ORDER BY id",
		PROMOTION_COLUMNS
	);
	let mut promotions = sqlx::query_as::<_, Promotion>(&sql)
		.bind(active_only)
		.fetch_all(&mut *conn)
		.await?;
	for promotion in &mut promotions {
		load_targets(conn, promotion).await?;
	}
	Ok(promotions)
}

/// Active promotions in the shape the pricing engine consumes.
pub async fn load_active_rules(conn: &mut SqliteConnection) -> Result<Vec<PromotionRule>> {
	Ok(list_promotions(conn, true).await?.iter().map(Promotion::to_rule).collect())
}

pub async fn set_promotion_active(conn: &mut SqliteConnection, id: i64, active: bool) -> Result<Promotion> {
	let result = sqlx::query("UPDATE promotions SET active = ? WHERE id = ?")
		.bind(active)
		.bind(id)
		.execute(&mut *conn)
		.await?;
	if result.rows_affected() == 0 {
		return Err(not_found("Promotion", id));
	}
	get_promotion(conn, id).await
}

/// Links a promotion to a sale and counts the use.
pub async fn record_applied(
	conn: &mut SqliteConnection,
	sale_id: i64,
	promotion_id: i64,
	discount: Guaranies,
) -> Result<()> {
	sqlx::query("INSERT INTO applied_promotions (sale_id, promotion_id, discount, created_at) VALUES (?, ?, ?, ?)")
		.bind(sale_id)
		.bind(promotion_id)
		.bind(discount)
		.bind(Utc::now())
		.execute(&mut *conn)
		.await?;
	sqlx::query("UPDATE promotions SET uses = uses + 1 WHERE id = ?")
		.bind(promotion_id)
		.execute(&mut *conn)
		.await?;
	Ok(())
}
