//! Fiscal stamps, issued documents and customer credit notes.

use cantina_core::enums::{CreditNoteState, DocumentState};
use cantina_core::fiscal::{StampWindow, VatBreakdown};
use cantina_core::{Guaranies, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use super::not_found;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Stamp {
	pub id: i64,
	pub number: String,
	pub establishment: String,
	pub expedition_point: String,
	pub valid_from: NaiveDate,
	pub valid_until: NaiveDate,
	pub first_number: i64,
	pub last_number: i64,
	pub next_number: i64,
	pub active: bool,
	pub created_at: DateTime<Utc>,
}

impl Stamp {
	pub fn window(&self) -> StampWindow {
		StampWindow {
			valid_from: self.valid_from,
			valid_until: self.valid_until,
			next_number: self.next_number,
			last_number: self.last_number,
			active: self.active,
		}
	}
}

const STAMP_COLUMNS: &str = "id, number, establishment, expedition_point, valid_from, valid_until, \
	first_number, last_number, next_number, active, created_at";

#[derive(Debug, Clone)]
pub struct NewStamp {
	pub number: String,
	pub establishment: String,
	pub expedition_point: String,
	pub valid_from: NaiveDate,
	pub valid_until: NaiveDate,
	pub first_number: i64,
	pub last_number: i64,
}

pub async fn insert_stamp(conn: &mut SqliteConnection, new: &NewStamp) -> Result<Stamp> {
	let sql = format!(
		"INSERT INTO fiscal_stamps (number, establishment, expedition_point, valid_from, valid_until,
			first_number, last_number, next_number, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
		STAMP_COLUMNS
	);
	Ok(sqlx::query_as::<_, Stamp>(&sql)
		.bind(&new.number)
		.bind(&new.establishment)
		.bind(&new.expedition_point)
		.bind(new.valid_from)
		.bind(new.valid_until)
		.bind(new.first_number)
		.bind(new.last_number)
		.bind(new.first_number)
		.bind(Utc::now())
		.fetch_one(&mut *conn)
		.await?)
}

pub async fn list_stamps(conn: &mut SqliteConnection) -> Result<Vec<Stamp>> {
	let sql = format!("SELECT {} FROM fiscal_stamps ORDER BY valid_from DESC, id DESC", STAMP_COLUMNS);
	Ok(sqlx::query_as::<_, Stamp>(&sql).fetch_all(&mut *conn).await?)
}

/// The active stamp covering `date` with numbers left, preferring the newest.
pub async fn find_usable_stamp(conn: &mut SqliteConnection, date: NaiveDate) -> Result<Option<Stamp>> {
	let sql = format!(
		"SELECT {} FROM fiscal_stamps
		 WHERE active = 1 AND valid_from <= ?1 AND valid_until >= ?1 AND next_number <= last_number
		 ORDER BY valid_from DESC, id DESC LIMIT 1",
		STAMP_COLUMNS
	);
	Ok(sqlx::query_as::<_, Stamp>(&sql).bind(date).fetch_optional(&mut *conn).await?)
}

/// Takes the next number of a stamp.
///
/// The increment is conditional on the number the caller read, so a number
/// is handed out once even if two issuers race.
pub async fn take_number(conn: &mut SqliteConnection, stamp: &Stamp) -> Result<Option<i64>> {
	let taken: Option<(i64,)> = sqlx::query_as(
		"UPDATE fiscal_stamps SET next_number = next_number + 1
		 WHERE id = ? AND next_number = ? AND next_number <= last_number
		 RETURNING next_number - 1",
	)
	.bind(stamp.id)
	.bind(stamp.next_number)
	.fetch_optional(&mut *conn)
	.await?;
	Ok(taken.map(|(number,)| number))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct FiscalDocument {
	pub id: i64,
	pub stamp_id: i64,
	pub stamp_number: String,
	pub sale_id: i64,
	pub number: i64,
	pub document_number: String,
	pub customer_name: String,
	pub customer_tax_id: String,
	pub exempt: Guaranies,
	pub taxed_5: Guaranies,
	pub vat_5: Guaranies,
	pub taxed_10: Guaranies,
	pub vat_10: Guaranies,
	pub total: Guaranies,
	#[sqlx(try_from = "String")]
	pub state: DocumentState,
	pub issued_at: DateTime<Utc>,
	pub voided_at: Option<DateTime<Utc>>,
}

const DOCUMENT_SELECT: &str = "SELECT d.id, d.stamp_id, s.number AS stamp_number, d.sale_id, d.number, \
	d.document_number, d.customer_name, d.customer_tax_id, d.exempt, d.taxed_5, d.vat_5, d.taxed_10, \
	d.vat_10, d.total, d.state, d.issued_at, d.voided_at \
	FROM fiscal_documents d JOIN fiscal_stamps s ON s.id = d.stamp_id";

#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
	pub stamp_id: i64,
	pub sale_id: i64,
	pub number: i64,
	pub document_number: &'a str,
	pub customer_name: &'a str,
	pub customer_tax_id: &'a str,
	pub breakdown: &'a VatBreakdown,
}

pub async fn insert_document(conn: &mut SqliteConnection, new: &NewDocument<'_>) -> Result<FiscalDocument> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO fiscal_documents (stamp_id, sale_id, number, document_number, customer_name,
			customer_tax_id, exempt, taxed_5, vat_5, taxed_10, vat_10, total, issued_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(new.stamp_id)
	.bind(new.sale_id)
	.bind(new.number)
	.bind(new.document_number)
	.bind(new.customer_name)
	.bind(new.customer_tax_id)
	.bind(new.breakdown.exempt)
	.bind(new.breakdown.taxed_5)
	.bind(new.breakdown.vat_5)
	.bind(new.breakdown.taxed_10)
	.bind(new.breakdown.vat_10)
	.bind(new.breakdown.total())
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?;
	get_document(conn, id).await
}

pub async fn get_document(conn: &mut SqliteConnection, id: i64) -> Result<FiscalDocument> {
	let sql = format!("{} WHERE d.id = ?", DOCUMENT_SELECT);
	sqlx::query_as::<_, FiscalDocument>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Fiscal document", id))
}

pub async fn find_document_for_sale(conn: &mut SqliteConnection, sale_id: i64) -> Result<Option<FiscalDocument>> {
	let sql = format!("{} WHERE d.sale_id = ?", DOCUMENT_SELECT);
	Ok(sqlx::query_as::<_, FiscalDocument>(&sql)
		.bind(sale_id)
		.fetch_optional(&mut *conn)
		.await?)
}

pub async fn void_document(conn: &mut SqliteConnection, id: i64) -> Result<()> {
	sqlx::query("UPDATE fiscal_documents SET state = 'VOIDED', voided_at = ? WHERE id = ? AND state = 'ISSUED'")
		.bind(Utc::now())
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CreditNote {
	pub id: i64,
	pub document_id: i64,
	/// Number of the invoice the note corrects.
	pub document_number: String,
	pub sale_id: i64,
	pub customer_id: i64,
	pub total: Guaranies,
	pub applied_amount: Guaranies,
	pub reason: String,
	#[sqlx(try_from = "String")]
	pub state: CreditNoteState,
	pub employee_id: Option<i64>,
	pub created_at: DateTime<Utc>,
	pub voided_at: Option<DateTime<Utc>>,
}

const CREDIT_NOTE_SELECT: &str = "SELECT n.id, n.document_id, d.document_number, n.sale_id, n.customer_id, \
	n.total, n.applied_amount, n.reason, n.state, n.employee_id, n.created_at, n.voided_at \
	FROM credit_notes n JOIN fiscal_documents d ON d.id = n.document_id";

#[derive(Debug, Clone)]
pub struct NewCreditNote<'a> {
	pub document_id: i64,
	pub sale_id: i64,
	pub customer_id: i64,
	pub total: Guaranies,
	pub applied_amount: Guaranies,
	pub state: CreditNoteState,
	pub reason: &'a str,
	pub employee_id: i64,
}

pub async fn insert_credit_note(conn: &mut SqliteConnection, new: &NewCreditNote<'_>) -> Result<CreditNote> {
	let (id,): (i64,) = sqlx::query_as(
		"INSERT INTO credit_notes (document_id, sale_id, customer_id, total, applied_amount, reason, state,
			employee_id, created_at)
		 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(new.document_id)
	.bind(new.sale_id)
	.bind(new.customer_id)
	.bind(new.total)
	.bind(new.applied_amount)
	.bind(new.reason)
	.bind(new.state.as_str())
	.bind(new.employee_id)
	.bind(Utc::now())
	.fetch_one(&mut *conn)
	.await?;
	get_credit_note(conn, id).await
}

pub async fn get_credit_note(conn: &mut SqliteConnection, id: i64) -> Result<CreditNote> {
	let sql = format!("{} WHERE n.id = ?", CREDIT_NOTE_SELECT);
	sqlx::query_as::<_, CreditNote>(&sql)
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?
		.ok_or_else(|| not_found("Credit note", id))
}

pub async fn list_credit_notes_for_sale(conn: &mut SqliteConnection, sale_id: i64) -> Result<Vec<CreditNote>> {
	let sql = format!("{} WHERE n.sale_id = ? ORDER BY n.id", CREDIT_NOTE_SELECT);
	Ok(sqlx::query_as::<_, CreditNote>(&sql).bind(sale_id).fetch_all(&mut *conn).await?)
}

/// Marks an unapplied note voided. Returns false when it was not `ISSUED`.
pub async fn void_credit_note(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
	let result =
		sqlx::query("UPDATE credit_notes SET state = 'VOIDED', voided_at = ? WHERE id = ? AND state = 'ISSUED'")
			.bind(Utc::now())
			.bind(id)
			.execute(&mut *conn)
			.await?;
	Ok(result.rows_affected() == 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CreditNoteItem {
	pub id: i64,
	pub credit_note_id: i64,
	pub product_id: i64,
	pub quantity: i64,
	pub unit_price: Guaranies,
	pub subtotal: Guaranies,
}

pub async fn insert_credit_note_item(
	conn: &mut SqliteConnection,
	credit_note_id: i64,
	product_id: i64,
	quantity: i64,
	unit_price: Guaranies,
	subtotal: Guaranies,
) -> Result<CreditNoteItem> {
	Ok(sqlx::query_as::<_, CreditNoteItem>(
		"INSERT INTO credit_note_items (credit_note_id, product_id, quantity, unit_price, subtotal)
		 VALUES (?, ?, ?, ?, ?)
		 RETURNING id, credit_note_id, product_id, quantity, unit_price, subtotal",
	)
	.bind(credit_note_id)
	.bind(product_id)
	.bind(quantity)
	.bind(unit_price)
	.bind(subtotal)
	.fetch_one(&mut *conn)
	.await?)
}

pub async fn list_credit_note_items(conn: &mut SqliteConnection, credit_note_id: i64) -> Result<Vec<CreditNoteItem>> {
	Ok(sqlx::query_as::<_, CreditNoteItem>(
		"SELECT id, credit_note_id, product_id, quantity, unit_price, subtotal FROM credit_note_items
		 WHERE credit_note_id = ? ORDER BY id",
	)
	.bind(credit_note_id)
	.fetch_all(&mut *conn)
	.await?)
}

/// Units of each product already returned on live notes of a sale.
pub async fn returned_quantities(conn: &mut SqliteConnection, sale_id: i64) -> Result<Vec<(i64, i64)>> {
	Ok(sqlx::query_as(
		"SELECT i.product_id, SUM(i.quantity) FROM credit_note_items i
		 JOIN credit_notes n ON n.id = i.credit_note_id
		 WHERE n.sale_id = ? AND n.state <> 'VOIDED'
		 GROUP BY i.product_id",
	)
	.bind(sale_id)
	.fetch_all(&mut *conn)
	.await?)
}
