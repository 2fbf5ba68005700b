//! Categories, products, stock and price history.

use cantina_core::enums::StockMovementKind;
use cantina_core::{Error, Guaranies, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Category {
	pub id: i64,
	pub name: String,
	pub parent_id: Option<i64>,
	pub active: bool,
}

pub async fn insert_category(conn: &mut SqliteConnection, name: &str, parent_id: Option<i64>) -> Result<Category> {
	Ok(sqlx::query_as::<_, Category>(
		"INSERT INTO categories (name, parent_id) VALUES (?, ?) RETURNING id, name, parent_id, active",
	)
	.bind(name)
	.bind(parent_id)
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn list_categories(conn: &mut SqliteConnection) -> Result<Vec<Category>> {
	Ok(sqlx::query_as::<_, Category>("SELECT id, name, parent_id, active FROM categories ORDER BY name")
		.fetch_all(&mut *conn)
		.await?)
}

/// A product with its category name and current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Product {
	pub id: i64,
	pub category_id: i64,
	pub category: String,
	pub barcode: Option<String>,
	pub description: String,
	pub price: Guaranies,
	pub cost: Option<Guaranies>,
	pub vat_rate: i64,
	pub minimum_stock: i64,
	pub allows_negative_stock: bool,
	pub active: bool,
	pub stock: i64,
	pub created_at: DateTime<Utc>,
}

impl Product {
	/// Stock available for a sale of `quantity` units.
	pub fn check_stock(&self, quantity: i64) -> Result<()> {
		if !self.allows_negative_stock && self.stock < quantity {
			return Err(Error::BusinessRule(format!(
				"Insufficient stock for '{}': available {}, requested {}",
				self.description, self.stock, quantity
			)));
		}
		Ok(())
	}
}

const PRODUCT_SELECT: &str = "SELECT p.id, p.category_id, c.name AS category, p.barcode, p.description, \
	p.price, p.cost, p.vat_rate, p.minimum_stock, p.allows_negative_stock, p.active, \
	COALESCE(s.quantity, 0) AS stock, p.created_at \
	FROM products p JOIN categories c ON c.id = p.category_id \
	LEFT JOIN stock s ON s.product_id = p.id";

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
	pub category_id: i64,
	pub barcode: Option<String>,
	pub description: String,
	pub price: Guaranies,
	pub cost: Option<Guaranies>,
	pub vat_rate: i64,
	pub minimum_stock: i64,
	pub allows_negative_stock: bool,
}

pub async fn insert_product(conn: &mut SqliteConnection, new: &NewProduct) -> Result<Product> {
	let now = Utc::now();
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO products
			(category_id, barcode, description, price, cost, vat_rate, minimum_stock, allows_negative_stock, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(new.category_id)
	.bind(&new.barcode)
	.bind(&new.description)
	.bind(new.price)
	.bind(new.cost)
	.bind(new.vat_rate)
	.bind(new.minimum_stock)
	.bind(new.allows_negative_stock)
	.bind(now)
	.fetch_one(&mut *conn)
	.await?;
	sqlx::query("INSERT INTO stock (product_id, quantity, updated_at) VALUES (?, 0, ?)")
		.bind(id)
		.bind(now)
		.execute(&mut *conn)
		.await?;
	get_product(conn, id).await
}

pub async fn find_product(conn: &mut SqliteConnection, id: i64) -> Result<Option<Product>> {
	let sql = format!("{} WHERE p.id = ?", PRODUCT_SELECT);
	Ok(sqlx::query_as::<_, Product>(&sql).bind(id).fetch_optional(&mut *conn).await?)
}

pub async fn get_product(conn: &mut SqliteConnection, id: i64) -> Result<Product> {
	find_product(conn, id).await?.ok_or_else(|| not_found("Product", id))
}

pub async fn find_product_by_barcode(conn: &mut SqliteConnection, barcode: &str) -> Result<Option<Product>> {
	let sql = format!("{} WHERE p.barcode = ?", PRODUCT_SELECT);
	Ok(sqlx::query_as::<_, Product>(&sql).bind(barcode).fetch_optional(&mut *conn).await?)
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
	pub search: Option<String>,
	pub category_id: Option<i64>,
	pub active_only: bool,
}

pub async fn list_products(conn: &mut SqliteConnection, filter: &ProductFilter) -> Result<Vec<Product>> {
	let pattern = format!("%{}%", filter.search.as_deref().unwrap_or("").trim().to_lowercase());
	let sql = format!(
		"{} WHERE (lower(p.description) LIKE ?1 OR COALESCE(p.barcode, '') LIKE ?1)
			AND (?2 IS NULL OR p.category_id = ?2)
			AND (?3 = 0 OR p.active = 1)
		 ORDER BY p.description, p.id",
		PRODUCT_SELECT
	);
	Ok(sqlx::query_as::<_, Product>(&sql)
		.bind(pattern)
		.bind(filter.category_id)
		.bind(filter.active_only)
		.fetch_all(&mut *conn)
		.await?)
}

/// Products by id, in the order requested. Missing ids are an error.
pub async fn get_products(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<Product>> {
	let mut products = Vec::with_capacity(ids.len());
	for id in ids {
		products.push(get_product(conn, *id).await?);
	}
	Ok(products)
}

#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
	pub category_id: Option<i64>,
	pub barcode: Option<String>,
	pub description: Option<String>,
	pub cost: Option<Guaranies>,
	pub vat_rate: Option<i64>,
	pub minimum_stock: Option<i64>,
	pub allows_negative_stock: Option<bool>,
	pub active: Option<bool>,
}

/// Updates everything but the price, which goes through [`change_price`].
pub async fn update_product(conn: &mut SqliteConnection, id: i64, changes: &ProductChanges) -> Result<Product> {
	let result = sqlx::query(
		"UPDATE products SET
			category_id = COALESCE(?, category_id),
			barcode = COALESCE(?, barcode),
			description = COALESCE(?, description),
			cost = COALESCE(?, cost),
			vat_rate = COALESCE(?, vat_rate),
			minimum_stock = COALESCE(?, minimum_stock),
			allows_negative_stock = COALESCE(?, allows_negative_stock),
			active = COALESCE(?, active)
		 WHERE id = ?",
	)
	.bind(changes.category_id)
	.bind(&changes.barcode)
	.bind(&changes.description)
	.bind(changes.cost)
	.bind(changes.vat_rate)
	.bind(changes.minimum_stock)
	.bind(changes.allows_negative_stock)
	.bind(changes.active)
	.bind(id)
	.execute(&mut *conn)
	.await?;
	if result.rows_affected() == 0 {
		return Err(not_found("Product", id));
	}
	get_product(conn, id).await
}

pub async fn set_cost(conn: &mut SqliteConnection, id: i64, cost: Guaranies) -> Result<()> {
	sqlx::query("UPDATE products SET cost = ? WHERE id = ?")
		.bind(cost)
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PriceChange {
	pub id: i64,
	pub product_id: i64,
	pub old_price: Guaranies,
	pub new_price: Guaranies,
	pub employee_id: Option<i64>,
	pub reason: Option<String>,
	pub changed_at: DateTime<Utc>,
}

/// Sets a new price and records the change.
pub async fn change_price(
	conn: &mut SqliteConnection,
	id: i64,
	new_price: Guaranies,
	employee_id: i64,
	reason: Option<&str>,
) -> Result<PriceChange> {
	let product = get_product(conn, id).await?;
	sqlx::query("UPDATE products SET price = ? WHERE id = ?")
		.bind(new_price)
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(sqlx::query_as::<_, PriceChange>(
		"INSERT INTO price_history (product_id, old_price, new_price, employee_id, reason, changed_at)
		 VALUES (?, ?, ?, ?, ?, ?)
		 RETURNING id, product_id, old_price, new_price, employee_id, reason, changed_at",
	)
	.bind(id)
	.bind(product.price)
	.bind(new_price)
	.bind(employee_id)
	.bind(reason)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn price_history(conn: &mut SqliteConnection, product_id: i64) -> Result<Vec<PriceChange>> {
	Ok(sqlx::query_as::<_, PriceChange>(
		"SELECT id, product_id, old_price, new_price, employee_id, reason, changed_at
		 FROM price_history WHERE product_id = ? ORDER BY changed_at DESC, id DESC",
	)
	.bind(product_id)
	.fetch_all(&mut *conn)
	.await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct StockMovement {
	pub id: i64,
	pub product_id: i64,
	#[sqlx(try_from = "String")]
	pub kind: StockMovementKind,
	/// Signed change applied to the stock.
	pub quantity: i64,
	pub resulting_stock: i64,
	pub reference: Option<String>,
	pub employee_id: Option<i64>,
	pub created_at: DateTime<Utc>,
}

/// Applies a signed change to a product's stock and records the movement.
pub async fn move_stock(
	conn: &mut SqliteConnection,
	product_id: i64,
	kind: StockMovementKind,
	delta: i64,
	reference: Option<&str>,
	employee_id: Option<i64>,
) -> Result<StockMovement> {
	let now = Utc::now();
	let (resulting,): (i64,) = sqlx::query_as(
		"INSERT INTO stock (product_id, quantity, updated_at) VALUES (?1, ?2, ?3)
		 ON CONFLICT(product_id) DO UPDATE SET quantity = quantity + ?2, updated_at = ?3
		 RETURNING quantity",
	)
	.bind(product_id)
	.bind(delta)
	.bind(now)
	.fetch_one(&mut *conn)
	.await?;

	Ok(sqlx::query_as::<_, StockMovement>(
		"INSERT INTO stock_movements (product_id, kind, quantity, resulting_stock, reference, employee_id, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?)
		 RETURNING id, product_id, kind, quantity, resulting_stock, reference, employee_id, created_at",
	)
	.bind(product_id)
	.bind(kind.as_str())
	.bind(delta)
	.bind(resulting)
	.bind(reference)
	.bind(employee_id)
	.bind(now)
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn list_movements(conn: &mut SqliteConnection, product_id: Option<i64>, limit: i64) -> Result<Vec<StockMovement>> {
	Ok(sqlx::query_as::<_, StockMovement>(
		"SELECT id, product_id, kind, quantity, resulting_stock, reference, employee_id, created_at
		 FROM stock_movements WHERE (?1 IS NULL OR product_id = ?1)
		 ORDER BY created_at DESC, id DESC LIMIT ?2",
	)
	.bind(product_id)
	.bind(limit)
	.fetch_all(&mut *conn)
	.await?)
}

/// Active products at or below their minimum stock.
pub async fn low_stock(conn: &mut SqliteConnection) -> Result<Vec<Product>> {
	let sql = format!(
		"{} WHERE p.active = 1 AND COALESCE(s.quantity, 0) <= p.minimum_stock ORDER BY stock, p.description",
		PRODUCT_SELECT
	);
	Ok(sqlx::query_as::<_, Product>(&sql).fetch_all(&mut *conn).await?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;

	async fn product_fixture(conn: &mut SqliteConnection) -> Product {
		let category = insert_category(conn, "Bebidas", None).await.unwrap();
		insert_product(
			conn,
			&NewProduct {
				category_id: category.id,
				barcode: Some("7840001000011".into()),
				description: "Jugo de naranja 500ml".into(),
				price: Guaranies(6_000),
				vat_rate: 10,
				minimum_stock: 5,
				..Default::default()
			},
		)
		.await
		.unwrap()
	}

	#[tokio::test]
	async fn test_stock_movements_track_resulting_stock() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let product = product_fixture(&mut conn).await;
		assert_eq!(product.stock, 0);
		assert_eq!(product.category, "Bebidas");

		move_stock(&mut conn, product.id, StockMovementKind::Entry, 24, Some("compra"), None).await.unwrap();
		let exit = move_stock(&mut conn, product.id, StockMovementKind::Exit, -3, None, None).await.unwrap();
		assert_eq!(exit.resulting_stock, 21);

		let product = get_product(&mut conn, product.id).await.unwrap();
		assert_eq!(product.stock, 21);
		assert!(product.check_stock(21).is_ok());
		assert!(product.check_stock(22).is_err());
		assert_eq!(list_movements(&mut conn, Some(product.id), 10).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_price_change_keeps_history() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let product = product_fixture(&mut conn).await;
		sqlx::query(
			"INSERT INTO employees (username, password_hash, first_name, last_name, role, created_at)
			 VALUES ('admin', 'x', 'A', 'B', 'ADMINISTRATOR', '2026-01-01T00:00:00Z')",
		)
		.execute(&mut *conn)
		.await
		.unwrap();

		let change = change_price(&mut conn, product.id, Guaranies(7_000), 1, Some("Ajuste proveedor"))
			.await
			.unwrap();
		assert_eq!(change.old_price, Guaranies(6_000));
		assert_eq!(get_product(&mut conn, product.id).await.unwrap().price, Guaranies(7_000));
		assert_eq!(price_history(&mut conn, product.id).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_low_stock_and_search() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let product = product_fixture(&mut conn).await;

		assert_eq!(low_stock(&mut conn).await.unwrap().len(), 1);
		move_stock(&mut conn, product.id, StockMovementKind::Entry, 6, None, None).await.unwrap();
		assert!(low_stock(&mut conn).await.unwrap().is_empty());

		let found = list_products(
			&mut conn,
			&ProductFilter {
				search: Some("naranja".into()),
				..Default::default()
			},
		)
		.await
		.unwrap();
		assert_eq!(found.len(), 1);
		assert!(find_product_by_barcode(&mut conn, "7840001000011").await.unwrap().is_some());
	}
}
