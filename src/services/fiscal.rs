//! Stamps, invoices and customer credit notes.

use std::collections::{HashMap, HashSet};

use cantina_core::enums::{CreditNoteState, DocumentState, SaleState, StockMovementKind};
use cantina_core::fiscal::{format_document_number, vat_breakdown};
use cantina_core::sales::{check_returnable, credit_applied, payment_state_for, validate_sale};
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::catalog;
use cantina_db::repositories::customers::{self, Customer};
use cantina_db::repositories::fiscal::{
	self, CreditNote, CreditNoteItem, FiscalDocument, NewCreditNote, NewDocument, NewStamp, Stamp,
};
use cantina_db::repositories::sales::{self, Sale};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::state::AppState;

pub async fn create_stamp(state: &AppState, employee_id: i64, new: &NewStamp) -> Result<Stamp> {
	if new.valid_until < new.valid_from {
		return Err(Error::Validation("Stamp validity ends before it starts".to_string()));
	}
	if new.first_number < 1 || new.last_number < new.first_number {
		return Err(Error::Validation("Invalid stamp number range".to_string()));
	}
	for (field, value) in [("establishment", &new.establishment), ("expedition_point", &new.expedition_point)] {
		if value.len() != 3 || !value.chars().all(|c| c.is_ascii_digit()) {
			return Err(Error::Validation(format!("{} must be three digits", field)));
		}
	}

	let mut tx = state.db.begin().await?;
	let stamp = fiscal::insert_stamp(&mut tx, new).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_STAMP",
		"fiscal_stamp",
		stamp.id,
		Some(&format!("{} ({}-{})", stamp.number, stamp.first_number, stamp.last_number)),
	)
	.await?;
	tx.commit().await?;
	Ok(stamp)
}

/// Numbers and stores the invoice of a sale inside the caller's transaction.
pub(crate) async fn issue_for_sale(
	conn: &mut SqliteConnection,
	sale: &Sale,
	customer: &Customer,
	today: NaiveDate,
) -> Result<FiscalDocument> {
	if sale.state != SaleState::Processed {
		return Err(Error::BusinessRule(format!("Sale {} is voided", sale.id)));
	}
	if let Some(existing) = fiscal::find_document_for_sale(conn, sale.id).await? {
		return Err(Error::Conflict(format!(
			"Sale {} already has document {}",
			sale.id, existing.document_number
		)));
	}
	let stamp = fiscal::find_usable_stamp(conn, today)
		.await?
		.ok_or_else(|| Error::BusinessRule(format!("No valid fiscal stamp for {}", today)))?;
	let number = fiscal::take_number(conn, &stamp)
		.await?
		.ok_or_else(|| Error::Conflict(format!("Stamp {} number was taken concurrently", stamp.number)))?;

	let items = sales::list_sale_items(conn, sale.id).await?;
	let lines: Vec<_> = items.iter().map(|item| (item.vat_rate, item.subtotal)).collect();
	let breakdown = vat_breakdown(&lines, sale.discount);
	let document_number = format_document_number(&stamp.establishment, &stamp.expedition_point, number);

	let document = fiscal::insert_document(
		conn,
		&NewDocument {
			stamp_id: stamp.id,
			sale_id: sale.id,
			number,
			document_number: &document_number,
			customer_name: &customer.full_name(),
			customer_tax_id: &customer.tax_id,
			breakdown: &breakdown,
		},
	)
	.await?;
	tracing::info!(sale_id = sale.id, document = %document.document_number, total = %document.total, "invoice issued");
	Ok(document)
}

/// Invoices an existing sale.
pub async fn issue_invoice(state: &AppState, employee_id: i64, sale_id: i64) -> Result<FiscalDocument> {
	let mut tx = state.db.begin().await?;
	let sale = sales::get_sale(&mut tx, sale_id).await?;
	let customer = customers::get_customer(&mut tx, sale.customer_id).await?;
	let document = issue_for_sale(&mut tx, &sale, &customer, state.today()).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"ISSUE_INVOICE",
		"fiscal_document",
		document.id,
		Some(&document.document_number),
	)
	.await?;
	tx.commit().await?;
	Ok(document)
}

/// Units of one product taken back on a credit note.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ReturnLine {
	pub product_id: i64,
	pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditNoteDetail {
	pub note: CreditNote,
	pub items: Vec<CreditNoteItem>,
}

/// Issues a credit note against the invoice of a sale.
///
/// Returned units are priced as sold and go back to stock. Notes of one sale
/// never add up to more than its total. When the sale still has a pending
/// balance the note settles it first and is stored `APPLIED`.
pub async fn issue_credit_note(
	state: &AppState,
	employee_id: i64,
	sale_id: i64,
	lines: &[ReturnLine],
	reason: &str,
) -> Result<CreditNoteDetail> {
	let reason = reason.trim();
	if reason.is_empty() {
		return Err(Error::Validation("A reason is required for a credit note".to_string()));
	}
	if lines.is_empty() {
		return Err(Error::Validation("A credit note needs at least one item".to_string()));
	}
	let mut seen = HashSet::new();
	if let Some(line) = lines.iter().find(|line| !seen.insert(line.product_id)) {
		return Err(Error::Validation(format!("Product {} appears more than once", line.product_id)));
	}

	let mut tx = state.db.begin().await?;
	let sale = sales::get_sale(&mut tx, sale_id).await?;
	if sale.state != SaleState::Processed {
		return Err(Error::BusinessRule(format!("Sale {} is voided", sale.id)));
	}
	let document = fiscal::find_document_for_sale(&mut tx, sale.id)
		.await?
		.filter(|document| document.state == DocumentState::Issued)
		.ok_or_else(|| Error::BusinessRule(format!("Sale {} has no issued invoice", sale.id)))?;

	let sold = sales::list_sale_items(&mut tx, sale.id).await?;
	let returned: HashMap<i64, i64> = fiscal::returned_quantities(&mut tx, sale.id).await?.into_iter().collect();
	let mut priced = Vec::with_capacity(lines.len());
	for line in lines {
		let Some(item) = sold.iter().find(|item| item.product_id == line.product_id) else {
			return Err(Error::BusinessRule(format!(
				"Product {} is not on sale {}",
				line.product_id, sale.id
			)));
		};
		let already = returned.get(&line.product_id).copied().unwrap_or(0);
		check_returnable(item.quantity, already, line.quantity)?;
		priced.push((line, item.unit_price, item.unit_price.checked_times(line.quantity)?));
	}
	let total = Guaranies::checked_sum(priced.iter().map(|(_, _, subtotal)| *subtotal))?;
	let credited = Guaranies::checked_sum(
		fiscal::list_credit_notes_for_sale(&mut tx, sale.id)
			.await?
			.iter()
			.filter(|note| note.state != CreditNoteState::Voided)
			.map(|note| note.total),
	)?;
	if credited.checked_add(total)? > sale.total_amount {
		return Err(Error::BusinessRule(format!(
			"Credit notes of sale {} would exceed its total of {}",
			sale.id, sale.total_amount
		)));
	}

	let applied = credit_applied(sale.pending_balance, total);
	if applied.is_positive() {
		let pending = sale.pending_balance - applied;
		let updated =
			sales::set_pending(&mut tx, sale.id, pending, payment_state_for(sale.total_amount, pending)).await?;
		validate_sale(&updated.snapshot())?;
	}
	let note = fiscal::insert_credit_note(
		&mut tx,
		&NewCreditNote {
			document_id: document.id,
			sale_id: sale.id,
			customer_id: sale.customer_id,
			total,
			applied_amount: applied,
			state: if applied.is_positive() { CreditNoteState::Applied } else { CreditNoteState::Issued },
			reason,
			employee_id,
		},
	)
	.await?;

	let reference = format!("Nota de crédito #{}", note.id);
	let mut items = Vec::with_capacity(priced.len());
	for (line, unit_price, subtotal) in priced {
		items.push(
			fiscal::insert_credit_note_item(&mut tx, note.id, line.product_id, line.quantity, unit_price, subtotal)
				.await?,
		);
		catalog::move_stock(
			&mut tx,
			line.product_id,
			StockMovementKind::Entry,
			line.quantity,
			Some(&reference),
			Some(employee_id),
		)
		.await?;
	}
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"ISSUE_CREDIT_NOTE",
		"credit_note",
		note.id,
		Some(&format!("{} on {}: {}", total, document.document_number, reason)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(
		credit_note_id = note.id,
		sale_id = sale.id,
		document = %document.document_number,
		total = %total,
		applied = %applied,
		"credit note issued"
	);
	Ok(CreditNoteDetail { note, items })
}

pub async fn credit_note_detail(state: &AppState, credit_note_id: i64) -> Result<CreditNoteDetail> {
	let mut conn = state.db.pool().acquire().await?;
	Ok(CreditNoteDetail {
		note: fiscal::get_credit_note(&mut conn, credit_note_id).await?,
		items: fiscal::list_credit_note_items(&mut conn, credit_note_id).await?,
	})
}

pub async fn credit_notes_for_sale(state: &AppState, sale_id: i64) -> Result<Vec<CreditNote>> {
	let mut conn = state.db.pool().acquire().await?;
	sales::get_sale(&mut conn, sale_id).await?;
	fiscal::list_credit_notes_for_sale(&mut conn, sale_id).await
}

/// Voids a credit note that settled no debt, taking its units out of stock
/// again.
pub async fn void_credit_note(state: &AppState, manager_id: i64, credit_note_id: i64) -> Result<CreditNote> {
	let mut tx = state.db.begin().await?;
	let note = fiscal::get_credit_note(&mut tx, credit_note_id).await?;
	match note.state {
		CreditNoteState::Issued => {}
		CreditNoteState::Applied => {
			return Err(Error::BusinessRule(format!(
				"Credit note {} already settled a debt and cannot be voided",
				note.id
			)));
		}
		CreditNoteState::Voided => {
			return Err(Error::Conflict(format!("Credit note {} is already voided", note.id)));
		}
	}
	if !fiscal::void_credit_note(&mut tx, note.id).await? {
		return Err(Error::Conflict(format!("Credit note {} changed concurrently", note.id)));
	}
	let reference = format!("Anulación nota de crédito #{}", note.id);
	for item in fiscal::list_credit_note_items(&mut tx, note.id).await? {
		catalog::move_stock(
			&mut tx,
			item.product_id,
			StockMovementKind::Exit,
			-item.quantity,
			Some(&reference),
			Some(manager_id),
		)
		.await?;
	}
	let voided = fiscal::get_credit_note(&mut tx, note.id).await?;
	audit::record(&mut tx, Actor::Employee(manager_id), "VOID_CREDIT_NOTE", "credit_note", note.id, None).await?;
	tx.commit().await?;

	tracing::warn!(credit_note_id = note.id, manager_id, "credit note voided");
	Ok(voided)
}
