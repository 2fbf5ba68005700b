//! Customers (guardians), their students and dietary restrictions.

use cantina_core::Result;
use cantina_core::enums::RestrictionKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Customer {
	pub id: i64,
	pub first_name: String,
	pub last_name: String,
	pub tax_id: String,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub address: Option<String>,
	pub is_generic: bool,
	pub active: bool,
	pub created_at: DateTime<Utc>,
}

impl Customer {
	pub fn full_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name)
	}
}

#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
	pub first_name: String,
	pub last_name: String,
	pub tax_id: String,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub address: Option<String>,
}

const CUSTOMER_COLUMNS: &str =
	"id, first_name, last_name, tax_id, email, phone, address, is_generic, active, created_at";

pub async fn insert_customer(conn: &mut SqliteConnection, new: &NewCustomer) -> Result<Customer> {
	let sql = format!(
		"INSERT INTO customers (first_name, last_name, tax_id, email, phone, address, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {}",
		CUSTOMER_COLUMNS
	);
	Ok(sqlx::query_as::<_, Customer>(&sql)
		.bind(&new.first_name)
		.bind(&new.last_name)
		.bind(&new.tax_id)
		.bind(&new.email)
		.bind(&new.phone)
		.bind(&new.address)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn find_customer(conn: &mut SqliteConnection, id: i64) -> Result<Option<Customer>> {
	let sql = format!("SELECT {} FROM customers WHERE id = ?", CUSTOMER_COLUMNS);
	Ok(sqlx::query_as::<_, Customer>(&sql).bind(id).fetch_optional(&mut *conn).await?)
}

pub async fn get_customer(conn: &mut SqliteConnection, id: i64) -> Result<Customer> {
	find_customer(conn, id).await?.ok_or_else(|| not_found("Customer", id))
}

/// The walk-in customer used for anonymous sales.
pub async fn generic_customer(conn: &mut SqliteConnection) -> Result<Customer> {
	let sql = format!(
		"SELECT {} FROM customers WHERE is_generic = 1 ORDER BY id LIMIT 1",
		CUSTOMER_COLUMNS
	);
	sqlx::query_as::<_, Customer>(&sql)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Customer", "generic"))
}

/// Lists customers, optionally filtered by a name or tax id fragment.
pub async fn list_customers(conn: &mut SqliteConnection, search: Option<&str>) -> Result<Vec<Customer>> {
	let pattern = format!("%{}%", search.unwrap_or("").trim().to_lowercase());
	let sql = format!(
		"SELECT {} FROM customers
		 WHERE lower(first_name || ' ' || last_name) LIKE ?1 OR lower(tax_id) LIKE ?1
		 ORDER BY last_name, first_name, id",
		CUSTOMER_COLUMNS
	);
	Ok(sqlx::query_as::<_, Customer>(&sql).bind(pattern).fetch_all(&mut *conn).await?)
}

#[derive(Debug, Clone, Default)]
pub struct CustomerChanges {
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub email: Option<String>,
	pub phone: Option<String>,
	pub address: Option<String>,
	pub active: Option<bool>,
}

pub async fn update_customer(conn: &mut SqliteConnection, id: i64, changes: &CustomerChanges) -> Result<Customer> {
	let sql = format!(
		"UPDATE customers SET
			first_name = COALESCE(?, first_name),
			last_name = COALESCE(?, last_name),
			email = COALESCE(?, email),
			phone = COALESCE(?, phone),
			address = COALESCE(?, address),
			active = COALESCE(?, active)
		 WHERE id = ? RETURNING {}",
		CUSTOMER_COLUMNS
	);
	sqlx::query_as::<_, Customer>(&sql)
		.bind(&changes.first_name)
		.bind(&changes.last_name)
		.bind(&changes.email)
		.bind(&changes.phone)
		.bind(&changes.address)
		.bind(changes.active)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Customer", id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Student {
	pub id: i64,
	pub customer_id: i64,
	pub first_name: String,
	pub last_name: String,
	pub grade: String,
	pub birth_date: Option<NaiveDate>,
	pub active: bool,
	pub created_at: DateTime<Utc>,
}

impl Student {
	pub fn full_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name)
	}
}

#[derive(Debug, Clone, Default)]
pub struct NewStudent {
	pub customer_id: i64,
	pub first_name: String,
	pub last_name: String,
	pub grade: String,
	pub birth_date: Option<NaiveDate>,
}

const STUDENT_COLUMNS: &str = "id, customer_id, first_name, last_name, grade, birth_date, active, created_at";

pub async fn insert_student(conn: &mut SqliteConnection, new: &NewStudent) -> Result<Student> {
	let sql = format!(
		"INSERT INTO students (customer_id, first_name, last_name, grade, birth_date, created_at)
		 VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
		STUDENT_COLUMNS
	);
	Ok(sqlx::query_as::<_, Student>(&sql)
		.bind(new.customer_id)
		.bind(&new.first_name)
		.bind(&new.last_name)
		.bind(&new.grade)
		.bind(new.birth_date)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn find_student(conn: &mut SqliteConnection, id: i64) -> Result<Option<Student>> {
	let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
	Ok(sqlx::query_as::<_, Student>(&sql).bind(id).fetch_optional(&mut *conn).await?)
}

pub async fn get_student(conn: &mut SqliteConnection, id: i64) -> Result<Student> {
	find_student(conn, id).await?.ok_or_else(|| not_found("Student", id))
}

pub async fn list_students(conn: &mut SqliteConnection, customer_id: i64) -> Result<Vec<Student>> {
	let sql = format!(
		"SELECT {} FROM students WHERE customer_id = ? ORDER BY first_name, id",
		STUDENT_COLUMNS
	);
	Ok(sqlx::query_as::<_, Student>(&sql).bind(customer_id).fetch_all(&mut *conn).await?)
}

#[derive(Debug, Clone, Default)]
pub struct StudentChanges {
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub grade: Option<String>,
	pub birth_date: Option<NaiveDate>,
	pub active: Option<bool>,
}

pub async fn update_student(conn: &mut SqliteConnection, id: i64, changes: &StudentChanges) -> Result<Student> {
	let sql = format!(
		"UPDATE students SET
			first_name = COALESCE(?, first_name),
			last_name = COALESCE(?, last_name),
			grade = COALESCE(?, grade),
			birth_date = COALESCE(?, birth_date),
			active = COALESCE(?, active)
		 WHERE id = ? RETURNING {}",
		STUDENT_COLUMNS
	);
	sqlx::query_as::<_, Student>(&sql)
		.bind(&changes.first_name)
		.bind(&changes.last_name)
		.bind(&changes.grade)
		.bind(changes.birth_date)
		.bind(changes.active)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Student", id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DietaryRestriction {
	pub id: i64,
	pub student_id: i64,
	#[sqlx(try_from = "String")]
	pub kind: RestrictionKind,
	pub notes: Option<String>,
	pub created_at: DateTime<Utc>,
}

pub async fn insert_restriction(
	conn: &mut SqliteConnection,
	student_id: i64,
	kind: RestrictionKind,
	notes: Option<&str>,
) -> Result<DietaryRestriction> {
	Ok(sqlx::query_as::<_, DietaryRestriction>(
		"INSERT INTO dietary_restrictions (student_id, kind, notes, created_at)
		 VALUES (?, ?, ?, ?) RETURNING id, student_id, kind, notes, created_at",
	)
	.bind(student_id)
	.bind(kind.as_str())
	.bind(notes)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn list_restrictions(conn: &mut SqliteConnection, student_id: i64) -> Result<Vec<DietaryRestriction>> {
	Ok(sqlx::query_as::<_, DietaryRestriction>(
		"SELECT id, student_id, kind, notes, created_at FROM dietary_restrictions
		 WHERE student_id = ? ORDER BY id",
	)
	.bind(student_id)
	.fetch_all(&mut *conn)
	.await?)
}

pub async fn delete_restriction(conn: &mut SqliteConnection, student_id: i64, id: i64) -> Result<()> {
	let result = sqlx::query("DELETE FROM dietary_restrictions WHERE id = ? AND student_id = ?")
		.bind(id)
		.bind(student_id)
		.execute(&mut *conn)
		.await?;
	if result.rows_affected() == 0 {
		return Err(not_found("Restriction", id));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Database;

	#[tokio::test]
	async fn test_customer_search_and_students() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();

		let customer = insert_customer(
			&mut conn,
			&NewCustomer {
				first_name: "María".into(),
				last_name: "González".into(),
				tax_id: "1234567-3".into(),
				..Default::default()
			},
		)
		.await
		.unwrap();

		let found = list_customers(&mut conn, Some("gonz")).await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].full_name(), "María González");
		assert_eq!(list_customers(&mut conn, Some("1234567")).await.unwrap().len(), 1);

		let student = insert_student(
			&mut conn,
			&NewStudent {
				customer_id: customer.id,
				first_name: "Lucas".into(),
				last_name: "González".into(),
				grade: "3A".into(),
				birth_date: None,
			},
		)
		.await
		.unwrap();
		assert_eq!(list_students(&mut conn, customer.id).await.unwrap(), vec![student.clone()]);

		let changed = update_student(
			&mut conn,
			student.id,
			&StudentChanges {
				grade: Some("4A".into()),
				..Default::default()
			},
		)
		.await
		.unwrap();
		assert_eq!(changed.grade, "4A");
		assert_eq!(changed.first_name, "Lucas");
	}

	#[tokio::test]
	async fn test_duplicate_tax_id_conflicts() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let new = NewCustomer {
			first_name: "A".into(),
			last_name: "B".into(),
			tax_id: "44444401-7".into(),
			..Default::default()
		};
		let err = insert_customer(&mut conn, &new).await.unwrap_err();
		assert!(matches!(err, cantina_core::Error::Conflict(_)));
	}

	#[tokio::test]
	async fn test_restrictions() {
		let db = Database::in_memory().await.unwrap();
		let mut conn = db.pool().acquire().await.unwrap();
		let customer = generic_customer(&mut conn).await.unwrap();
		let student = insert_student(
			&mut conn,
			&NewStudent {
				customer_id: customer.id,
				first_name: "Ana".into(),
				last_name: "Ruiz".into(),
				..Default::default()
			},
		)
		.await
		.unwrap();

		let r = insert_restriction(&mut conn, student.id, RestrictionKind::Celiac, Some("estricta"))
			.await
			.unwrap();
		assert_eq!(r.kind, RestrictionKind::Celiac);
		assert_eq!(list_restrictions(&mut conn, student.id).await.unwrap().len(), 1);

		delete_restriction(&mut conn, student.id, r.id).await.unwrap();
		assert!(delete_restriction(&mut conn, student.id, r.id).await.is_err());
	}
}
