//! Point of sale: pricing, checks, sales, voids and credit payments.

use std::collections::HashSet;

use cantina_core::commissions::{CommissionRate, commission_for};
use cantina_core::credit::{self, CheckoutOption, CreditDecision};
use cantina_core::enums::{
	CreditNoteState, PaymentMethodKind, RestrictionKind, SaleKind, SaleState, StockMovementKind,
};
use cantina_core::promotions::{AppliedDiscount, CartContext, CartLine, PromotionRule, best_promotion, cart_subtotal};
use cantina_core::restrictions::{self, Conflict};
use cantina_core::sales::{line_subtotal, payment_state_for, pending_after_payments, validate_sale};
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::accounts;
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::cards::{self, Card};
use cantina_db::repositories::catalog::{self, Product, ProductFilter};
use cantina_db::repositories::customers::{self, Customer, Student};
use cantina_db::repositories::fiscal::{self as fiscal_repo, CreditNote, FiscalDocument};
use cantina_db::repositories::payments::{self, PaymentMethod};
use cantina_db::repositories::promotions;
use cantina_db::repositories::sales::{self as repo, NewSale, Sale, SaleItem, SalePayment};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use validator::Validate;

use crate::services::cards::{Approval, SupervisorApproval, approve, charge, check_decision, policy, refund};
use crate::services::catalog::{profile, restriction_profiles};
use crate::services::{cash, fiscal, notifications};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ItemInput {
	pub product_id: i64,
	pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
	pub payment_method_id: i64,
	pub amount: Guaranies,
	pub card_number: Option<String>,
	pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaleRequest {
	#[validate(length(min = 1, message = "must contain at least one item"))]
	pub items: Vec<ItemInput>,
	#[serde(default)]
	pub payments: Vec<PaymentInput>,
	/// `CASH` when absent.
	pub kind: Option<SaleKind>,
	pub student_id: Option<i64>,
	pub customer_id: Option<i64>,
	pub cash_session_id: Option<i64>,
	pub promotion_code: Option<String>,
	#[serde(default)]
	pub acknowledge_restrictions: bool,
	pub supervisor: Option<SupervisorApproval>,
	#[serde(default)]
	pub issue_invoice: bool,
}

/// A cart with prices, promotion and total.
#[derive(Debug, Clone)]
pub(crate) struct PricedCart {
	pub products: Vec<Product>,
	pub quantities: Vec<i64>,
	pub subtotal: Guaranies,
	pub promotion: Option<AppliedDiscount>,
	pub total: Guaranies,
}

impl PricedCart {
	pub fn discount(&self) -> Guaranies {
		self.promotion.as_ref().map_or(Guaranies::ZERO, |p| p.discount)
	}
}

fn check_items(items: &[ItemInput]) -> Result<()> {
	if items.is_empty() {
		return Err(Error::Validation("items: must contain at least one item".to_string()));
	}
	let mut seen = HashSet::new();
	for item in items {
		if item.quantity <= 0 {
			return Err(Error::Validation(format!(
				"Quantity of product {} must be greater than zero",
				item.product_id
			)));
		}
		if !seen.insert(item.product_id) {
			return Err(Error::Validation(format!(
				"Product {} appears more than once",
				item.product_id
			)));
		}
	}
	Ok(())
}

/// The promotion matching `code`, or the best one when no code is given.
fn select_promotion(
	rules: &[PromotionRule],
	lines: &[CartLine],
	ctx: &CartContext<'_>,
) -> Result<Option<AppliedDiscount>> {
	let Some(code) = ctx.code else {
		return Ok(best_promotion(rules, lines, ctx));
	};
	let coded: Vec<PromotionRule> = rules
		.iter()
		.filter(|rule| rule.code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(code.trim())))
		.cloned()
		.collect();
	best_promotion(&coded, lines, ctx)
		.map(Some)
		.ok_or_else(|| Error::BusinessRule(format!("Promotion code '{}' does not apply to this sale", code)))
}

/// Loads, checks and prices the items of a cart.
pub(crate) async fn price_cart(
	conn: &mut SqliteConnection,
	items: &[ItemInput],
	student: Option<&Student>,
	code: Option<&str>,
	now: DateTime<Local>,
) -> Result<PricedCart> {
	check_items(items)?;
	let ids: Vec<i64> = items.iter().map(|item| item.product_id).collect();
	let products = catalog::get_products(conn, &ids).await?;

	let mut lines = Vec::with_capacity(items.len());
	for (product, item) in products.iter().zip(items) {
		if !product.active {
			return Err(Error::BusinessRule(format!("Product '{}' is inactive", product.description)));
		}
		product.check_stock(item.quantity)?;
		line_subtotal(item.quantity, product.price)?;
		lines.push(CartLine {
			product_id: product.id,
			category_id: Some(product.category_id),
			quantity: item.quantity,
			unit_price: product.price,
		});
	}
	let subtotal = cart_subtotal(&lines)?;

	let rules = promotions::load_active_rules(conn).await?;
	let ctx = CartContext {
		date: now.date_naive(),
		time: now.time(),
		student_grade: student.map(|s| s.grade.as_str()),
		code: code.map(str::trim).filter(|c| !c.is_empty()),
	};
	let promotion = select_promotion(&rules, &lines, &ctx)?;
	let discount = promotion.as_ref().map_or(Guaranies::ZERO, |p| p.discount);

	Ok(PricedCart {
		quantities: items.iter().map(|item| item.quantity).collect(),
		products,
		subtotal,
		promotion,
		total: subtotal.checked_sub(discount)?,
	})
}

async fn restriction_conflicts(
	conn: &mut SqliteConnection,
	student: &Student,
	products: &[Product],
) -> Result<Vec<Conflict>> {
	let restrictions = customers::list_restrictions(conn, student.id).await?;
	if restrictions.is_empty() {
		return Ok(Vec::new());
	}
	let profiles: Vec<_> = products.iter().map(profile).collect();
	Ok(restrictions::analyze_cart(&profiles, &restriction_profiles(&restrictions)))
}

/// A payment checked against its method and card.
struct ResolvedPayment<'a> {
	input: &'a PaymentInput,
	method: PaymentMethod,
	card: Option<Card>,
}

/// Everything a processed sale produced.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
	pub sale: Sale,
	pub items: Vec<SaleItem>,
	pub payments: Vec<SalePayment>,
	pub promotion: Option<AppliedDiscount>,
	pub conflicts: Vec<Conflict>,
	pub document: Option<FiscalDocument>,
}

/// Runs a sale as a single transaction.
pub async fn process_sale(state: &AppState, cashier_id: i64, request: &SaleRequest) -> Result<SaleReceipt> {
	let now = state.now();
	let today = now.date_naive();
	let kind = request.kind.unwrap_or(SaleKind::Cash);
	let mut tx = state.db.begin().await?;
	let cashier = accounts::get_employee(&mut tx, cashier_id).await?;

	let mut resolved = Vec::with_capacity(request.payments.len());
	let mut card_numbers = HashSet::new();
	for input in &request.payments {
		if !input.amount.is_positive() {
			return Err(Error::Validation("Payment amounts must be greater than zero".to_string()));
		}
		let method = payments::get_payment_method(&mut tx, input.payment_method_id).await?;
		if !method.active {
			return Err(Error::BusinessRule(format!("Payment method '{}' is inactive", method.name)));
		}
		let card = match (method.kind, input.card_number.as_deref().map(str::trim)) {
			(PaymentMethodKind::StudentCard, Some(number)) if !number.is_empty() => {
				if !card_numbers.insert(number.to_string()) {
					return Err(Error::Validation(format!("Card {} is used in more than one payment", number)));
				}
				let card = cards::get_card(&mut tx, number).await?;
				card.check_can_consume(today)?;
				Some(card)
			}
			(PaymentMethodKind::StudentCard, _) => {
				return Err(Error::Validation("Student card payments require a card number".to_string()));
			}
			_ => None,
		};
		resolved.push(ResolvedPayment { input, method, card });
	}

	let student_id = request
		.student_id
		.or_else(|| resolved.iter().find_map(|p| p.card.as_ref().map(|c| c.student_id)));
	let student = match student_id {
		Some(id) => Some(customers::get_student(&mut tx, id).await?),
		None => None,
	};
	if let Some(student) = &student {
		for card in resolved.iter().filter_map(|p| p.card.as_ref()) {
			if card.student_id != student.id {
				return Err(Error::BusinessRule(format!(
					"Card {} does not belong to {}",
					card.card_number,
					student.full_name()
				)));
			}
		}
	}

	let cart = price_cart(&mut tx, &request.items, student.as_ref(), request.promotion_code.as_deref(), now).await?;

	let conflicts = match &student {
		Some(student) => restriction_conflicts(&mut tx, student, &cart.products).await?,
		None => Vec::new(),
	};
	if conflicts.iter().any(|c| c.requires_authorization) && !request.acknowledge_restrictions {
		let products: Vec<&str> = conflicts
			.iter()
			.filter(|c| c.requires_authorization)
			.map(|c| c.product.as_str())
			.collect();
		tracing::warn!(student_id, ?products, "sale blocked by dietary restrictions");
		return Err(Error::Conflict(format!(
			"Dietary restriction conflict: {}",
			products.join(", ")
		)));
	}

	let customer: Customer = match (&student, request.customer_id) {
		(Some(student), _) => customers::get_customer(&mut tx, student.customer_id).await?,
		(None, Some(id)) => customers::get_customer(&mut tx, id).await?,
		(None, None) => customers::generic_customer(&mut tx).await?,
	};

	let approval: Option<Approval> = match &request.supervisor {
		Some(input) => Some(approve(&mut tx, state.hasher.as_ref(), input).await?),
		None => None,
	};

	let paid = Guaranies::checked_sum(resolved.iter().map(|p| p.input.amount))?;
	let pending = pending_after_payments(kind, cart.total, paid)?;
	let authorized_by = match kind {
		SaleKind::Cash => None,
		SaleKind::Credit => {
			if customer.is_generic {
				return Err(Error::BusinessRule(
					"Credit sales require an identified customer".to_string(),
				));
			}
			if credit::can_authorize_negative(cashier.role, cashier.active) {
				Some(cashier.id)
			} else {
				let approval = approval.as_ref().ok_or_else(|| {
					Error::PermissionDenied("Credit sales need a supervisor authorization".to_string())
				})?;
				Some(approval.supervisor_id)
			}
		}
	};

	for payment in &resolved {
		if let Some(card) = &payment.card {
			let decision = credit::validate_credit_limit(&policy(card), payment.input.amount);
			check_decision(&card.card_number, &decision, approval.as_ref())?;
		}
	}

	let session_id = match request.cash_session_id {
		Some(id) => Some(cash::require_open(&mut tx, id).await?.id),
		None => None,
	};

	let new_sale = NewSale {
		customer_id: customer.id,
		employee_id: cashier.id,
		student_id: student.as_ref().map(|s| s.id),
		cash_session_id: session_id,
		kind,
		subtotal: cart.subtotal,
		discount: cart.discount(),
		total_amount: cart.total,
		pending_balance: pending,
		payment_state: payment_state_for(cart.total, pending),
		authorized_by,
	};
	let sale = repo::insert_sale(&mut tx, &new_sale).await?;
	validate_sale(&sale.snapshot())?;
	let reference = format!("Venta #{}", sale.id);

	for (product, quantity) in cart.products.iter().zip(&cart.quantities) {
		repo::insert_sale_item(&mut tx, sale.id, product.id, *quantity, product.price).await?;
		catalog::move_stock(
			&mut tx,
			product.id,
			StockMovementKind::Exit,
			-quantity,
			Some(&reference),
			Some(cashier.id),
		)
		.await?;
	}

	let mut debited = Vec::new();
	for payment in &resolved {
		let row = repo::insert_sale_payment(
			&mut tx,
			sale.id,
			payment.method.id,
			payment.input.amount,
			payment.card.as_ref().map(|c| c.card_number.as_str()),
			payment.input.reference.as_deref(),
		)
		.await?;
		if let Some(card) = &payment.card {
			charge(
				&mut tx,
				card,
				payment.input.amount,
				&reference,
				Some(sale.id),
				cashier.id,
				approval.as_ref(),
				today,
			)
			.await?;
			debited.push(card.card_number.clone());
		}
		record_commission(&mut tx, &payment.method, &row).await?;
	}

	if let Some(promotion) = &cart.promotion {
		promotions::record_applied(&mut tx, sale.id, promotion.promotion_id, promotion.discount).await?;
	}

	let document = if request.issue_invoice {
		Some(fiscal::issue_for_sale(&mut tx, &sale, &customer, today).await?)
	} else {
		None
	};

	for number in &debited {
		let card = cards::get_card(&mut tx, number).await?;
		notifications::evaluate_card(&mut tx, &card, &state.settings.business, Utc::now()).await?;
	}

	audit::record(
		&mut tx,
		Actor::Employee(cashier.id),
		"SALE",
		"sale",
		sale.id,
		Some(&format!("{} {} total {}", kind, customer.full_name(), sale.total_amount)),
	)
	.await?;

	let items = repo::list_sale_items(&mut tx, sale.id).await?;
	let payments = repo::list_sale_payments(&mut tx, sale.id).await?;
	tx.commit().await?;

	tracing::info!(
		sale_id = sale.id,
		cashier_id,
		kind = %kind,
		total = %sale.total_amount,
		pending = %sale.pending_balance,
		"sale processed"
	);
	Ok(SaleReceipt {
		sale,
		items,
		payments,
		promotion: cart.promotion,
		conflicts,
		document,
	})
}

async fn record_commission(conn: &mut SqliteConnection, method: &PaymentMethod, payment: &SalePayment) -> Result<()> {
	if !method.generates_commission {
		return Ok(());
	}
	let rates: Vec<CommissionRate> = payments::list_commission_rates(conn, method.id)
		.await?
		.into_iter()
		.map(Into::into)
		.collect();
	if let Some(line) = commission_for(true, &rates, payment.amount, Utc::now()) {
		repo::insert_sale_commission(conn, payment.id, &line).await?;
	}
	Ok(())
}

/// Voids a processed sale, putting back stock and card balances.
pub async fn void_sale(state: &AppState, manager_id: i64, sale_id: i64, reason: &str) -> Result<Sale> {
	let reason = reason.trim();
	if reason.is_empty() {
		return Err(Error::Validation("A reason is required to void a sale".to_string()));
	}
	let mut tx = state.db.begin().await?;
	let sale = repo::get_sale(&mut tx, sale_id).await?;
	if sale.state != SaleState::Processed {
		return Err(Error::Conflict(format!("Sale {} is already voided", sale_id)));
	}
	let credit_notes = fiscal_repo::list_credit_notes_for_sale(&mut tx, sale.id).await?;
	if credit_notes.iter().any(|note| note.state != CreditNoteState::Voided) {
		return Err(Error::Conflict(format!("Sale {} has credit notes and cannot be voided", sale_id)));
	}
	let reference = format!("Anulación venta #{}", sale.id);

	for item in repo::list_sale_items(&mut tx, sale.id).await? {
		catalog::move_stock(
			&mut tx,
			item.product_id,
			StockMovementKind::Entry,
			item.quantity,
			Some(&reference),
			Some(manager_id),
		)
		.await?;
	}
	for consumption in cards::list_consumptions_for_sale(&mut tx, sale.id).await? {
		refund(&mut tx, &consumption.card_number, consumption.amount, manager_id, &reference).await?;
	}
	if let Some(document) = fiscal_repo::find_document_for_sale(&mut tx, sale.id).await? {
		fiscal_repo::void_document(&mut tx, document.id).await?;
	}

	let voided = repo::void_sale(&mut tx, sale.id, manager_id, reason).await?;
	audit::record(&mut tx, Actor::Employee(manager_id), "VOID_SALE", "sale", sale.id, Some(reason)).await?;
	tx.commit().await?;

	tracing::warn!(sale_id, manager_id, reason, "sale voided");
	Ok(voided)
}

/// Registers a payment towards a credit sale.
pub async fn pay_credit_sale(
	state: &AppState,
	employee_id: i64,
	sale_id: i64,
	payment_method_id: i64,
	amount: Guaranies,
	reference: Option<&str>,
) -> Result<Sale> {
	let mut tx = state.db.begin().await?;
	let sale = repo::get_sale(&mut tx, sale_id).await?;
	if sale.state != SaleState::Processed || sale.kind != SaleKind::Credit {
		return Err(Error::BusinessRule(format!("Sale {} is not an open credit sale", sale_id)));
	}
	if !sale.pending_balance.is_positive() {
		return Err(Error::BusinessRule(format!("Sale {} is already paid", sale_id)));
	}
	if !amount.is_positive() || amount > sale.pending_balance {
		return Err(Error::Validation(format!(
			"Payment must be between 1 and the pending balance of {}",
			sale.pending_balance
		)));
	}
	let method = payments::get_payment_method(&mut tx, payment_method_id).await?;
	if !method.active || method.kind == PaymentMethodKind::StudentCard {
		return Err(Error::BusinessRule(format!(
			"Payment method '{}' cannot settle credit sales",
			method.name
		)));
	}

	let payment = repo::insert_sale_payment(&mut tx, sale.id, method.id, amount, None, reference).await?;
	record_commission(&mut tx, &method, &payment).await?;
	let pending = sale.pending_balance - amount;
	let updated = repo::set_pending(&mut tx, sale.id, pending, payment_state_for(sale.total_amount, pending)).await?;
	validate_sale(&updated.snapshot())?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"PAY_CREDIT_SALE",
		"sale",
		sale.id,
		Some(&format!("{} via {}, pending {}", amount, method.name, pending)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(sale_id, amount = %amount, pending = %pending, "credit sale payment");
	Ok(updated)
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
	pub sale: Sale,
	pub paid_percentage: f64,
	pub items: Vec<SaleItem>,
	pub payments: Vec<SalePayment>,
	pub document: Option<FiscalDocument>,
	pub credit_notes: Vec<CreditNote>,
}

pub(crate) async fn load_detail(conn: &mut SqliteConnection, sale_id: i64) -> Result<SaleDetail> {
	let sale = repo::get_sale(conn, sale_id).await?;
	Ok(SaleDetail {
		paid_percentage: sale.paid_percentage(),
		items: repo::list_sale_items(conn, sale.id).await?,
		payments: repo::list_sale_payments(conn, sale.id).await?,
		document: fiscal_repo::find_document_for_sale(conn, sale.id).await?,
		credit_notes: fiscal_repo::list_credit_notes_for_sale(conn, sale.id).await?,
		sale,
	})
}

pub async fn sale_detail(state: &AppState, sale_id: i64) -> Result<SaleDetail> {
	let mut conn = state.db.pool().acquire().await?;
	load_detail(&mut conn, sale_id).await
}

/// Open credit sales of a customer.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerAccount {
	pub customer: Customer,
	pub open_sales: Vec<Sale>,
	pub total_debt: Guaranies,
}

pub async fn customer_account(state: &AppState, customer_id: i64) -> Result<CustomerAccount> {
	let mut conn = state.db.pool().acquire().await?;
	let customer = customers::get_customer(&mut conn, customer_id).await?;
	let open_sales = repo::list_open_credit_sales(&mut conn, customer.id).await?;
	Ok(CustomerAccount {
		total_debt: open_sales.iter().map(|s| s.pending_balance).sum(),
		customer,
		open_sales,
	})
}

/// What the cashier sees before charging a card.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceCheck {
	pub card_number: String,
	pub student: String,
	pub balance: Guaranies,
	pub amount: Guaranies,
	pub resulting: Guaranies,
	pub decision: CreditDecision,
	pub message: String,
	pub options: Vec<CheckoutOption>,
}

pub async fn check_balance(state: &AppState, card_number: &str, amount: Guaranies) -> Result<BalanceCheck> {
	if !amount.is_positive() {
		return Err(Error::Validation("Amount must be greater than zero".to_string()));
	}
	let mut conn = state.db.pool().acquire().await?;
	let card = cards::get_card(&mut conn, card_number).await?;
	card.check_can_consume(state.today())?;
	let student = customers::get_student(&mut conn, card.student_id).await?;
	let decision = credit::validate_credit_limit(&policy(&card), amount);
	Ok(BalanceCheck {
		card_number: card.card_number,
		student: student.full_name(),
		balance: card.balance,
		amount,
		resulting: decision.resulting(),
		message: decision.message(),
		options: decision.options(),
		decision,
	})
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
	pub id: i64,
	pub description: String,
	pub price: Guaranies,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alternatives {
	pub product_id: i64,
	pub alternatives: Vec<ProductSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestrictionCheck {
	pub student_id: i64,
	pub restrictions: Vec<RestrictionKind>,
	pub conflicts: Vec<Conflict>,
	pub requires_authorization: bool,
	pub alternatives: Vec<Alternatives>,
}

pub async fn check_restrictions(state: &AppState, student_id: i64, product_ids: &[i64]) -> Result<RestrictionCheck> {
	let mut conn = state.db.pool().acquire().await?;
	let student = customers::get_student(&mut conn, student_id).await?;
	let restrictions = customers::list_restrictions(&mut conn, student.id).await?;
	let products = catalog::get_products(&mut conn, product_ids).await?;
	let profiles: Vec<_> = products.iter().map(profile).collect();
	let restriction_profiles = restriction_profiles(&restrictions);
	let conflicts = restrictions::analyze_cart(&profiles, &restriction_profiles);

	let catalog = catalog::list_products(
		&mut conn,
		&ProductFilter {
			active_only: true,
			..Default::default()
		},
	)
	.await?;
	let candidates: Vec<_> = catalog.iter().map(profile).collect();
	let mut seen = HashSet::new();
	let conflicting: Vec<i64> = conflicts
		.iter()
		.map(|c| c.product_id)
		.filter(|id| seen.insert(*id))
		.collect();
	let alternatives = conflicting
		.into_iter()
		.filter_map(|id| profiles.iter().find(|p| p.id == id))
		.map(|product| Alternatives {
			product_id: product.id,
			alternatives: restrictions::suggest_alternatives(product, &candidates, &restriction_profiles)
				.into_iter()
				.filter_map(|alt| catalog.iter().find(|p| p.id == alt.id))
				.map(|p| ProductSummary {
					id: p.id,
					description: p.description.clone(),
					price: p.price,
				})
				.collect(),
		})
		.collect();

	Ok(RestrictionCheck {
		student_id: student.id,
		restrictions: restrictions.iter().map(|r| r.kind).collect(),
		requires_authorization: conflicts.iter().any(|c| c.requires_authorization),
		conflicts,
		alternatives,
	})
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionPreview {
	pub subtotal: Guaranies,
	pub promotion: Option<AppliedDiscount>,
	pub discount: Guaranies,
	pub total: Guaranies,
}

pub async fn preview_promotion(
	state: &AppState,
	items: &[ItemInput],
	student_id: Option<i64>,
	code: Option<&str>,
) -> Result<PromotionPreview> {
	let mut conn = state.db.pool().acquire().await?;
	let student = match student_id {
		Some(id) => Some(customers::get_student(&mut conn, id).await?),
		None => None,
	};
	let cart = price_cart(&mut conn, items, student.as_ref(), code, state.now()).await?;
	Ok(PromotionPreview {
		subtotal: cart.subtotal,
		discount: cart.discount(),
		total: cart.total,
		promotion: cart.promotion,
	})
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorCheck {
	pub valid: bool,
	pub supervisor_id: Option<i64>,
	pub name: Option<String>,
	pub message: String,
}

/// Whether the credentials belong to someone who may authorize.
pub async fn validate_supervisor(state: &AppState, username: &str, password: &str) -> Result<SupervisorCheck> {
	let mut conn = state.db.pool().acquire().await?;
	match crate::services::cards::verify_supervisor(&mut conn, state.hasher.as_ref(), username, password).await {
		Ok(employee) => Ok(SupervisorCheck {
			valid: true,
			supervisor_id: Some(employee.id),
			name: Some(employee.full_name()),
			message: "Supervisor can authorize".to_string(),
		}),
		Err(Error::PermissionDenied(message)) => Ok(SupervisorCheck {
			valid: false,
			supervisor_id: None,
			name: None,
			message,
		}),
		Err(other) => Err(other),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::cards::recharge_at_pos;
	use crate::services::testing::{CARD, TestEnv, env};
	use cantina_core::enums::{PaymentState, PromotionKind, PromotionScope};
	use cantina_db::repositories::promotions::PromotionData;
	use rstest::rstest;

	const CASH: i64 = 1;
	const STUDENT_CARD: i64 = 2;
	const DEBIT_CARD: i64 = 3;

	fn item(product_id: i64, quantity: i64) -> ItemInput {
		ItemInput { product_id, quantity }
	}

	fn payment(method: i64, amount: i64, card: Option<&str>) -> PaymentInput {
		PaymentInput {
			payment_method_id: method,
			amount: Guaranies(amount),
			card_number: card.map(str::to_string),
			reference: None,
		}
	}

	fn request(items: Vec<ItemInput>, payments: Vec<PaymentInput>) -> SaleRequest {
		SaleRequest {
			items,
			payments,
			kind: None,
			student_id: None,
			customer_id: None,
			cash_session_id: None,
			promotion_code: None,
			acknowledge_restrictions: false,
			supervisor: None,
			issue_invoice: false,
		}
	}

	async fn card_balance(env: &TestEnv) -> Guaranies {
		env.card().await.balance
	}

	#[rstest]
	#[tokio::test]
	async fn test_cash_sale_moves_stock(#[future] env: TestEnv) {
		let env = env.await;
		let receipt = process_sale(
			&env.state,
			env.cashier_id,
			&request(vec![item(env.sandwich_id, 2)], vec![payment(CASH, 24_000, None)]),
		)
		.await
		.unwrap();

		assert_eq!(receipt.sale.total_amount, Guaranies(24_000));
		assert_eq!(receipt.sale.payment_state, PaymentState::Paid);
		assert_eq!(receipt.items.len(), 1);
		assert_eq!(env.stock(env.sandwich_id).await, 18);
	}

	#[rstest]
	#[tokio::test]
	async fn test_cash_sale_must_be_fully_paid(#[future] env: TestEnv) {
		let env = env.await;
		let error = process_sale(
			&env.state,
			env.cashier_id,
			&request(vec![item(env.sandwich_id, 1)], vec![payment(CASH, 10_000, None)]),
		)
		.await
		.unwrap_err();
		assert_eq!(error.status_code(), 400);
		assert_eq!(env.stock(env.sandwich_id).await, 20);
	}

	#[rstest]
	#[tokio::test]
	async fn test_overflowing_payments_are_rejected(#[future] env: TestEnv) {
		let env = env.await;
		let error = process_sale(
			&env.state,
			env.cashier_id,
			&request(
				vec![item(env.sandwich_id, 1)],
				vec![payment(CASH, i64::MAX, None), payment(CASH, 1, None)],
			),
		)
		.await
		.unwrap_err();
		assert_eq!(error.status_code(), 400);
		assert_eq!(env.stock(env.sandwich_id).await, 20);
	}

	#[rstest]
	#[tokio::test]
	async fn test_overflowing_line_is_rejected(#[future] env: TestEnv) {
		let env = env.await;
		let made_to_order = {
			let mut conn = env.state.db.pool().acquire().await.unwrap();
			catalog::insert_product(
				&mut conn,
				&catalog::NewProduct {
					category_id: env.snacks_id,
					description: "Torta por encargo".into(),
					price: Guaranies(90_000),
					vat_rate: 10,
					allows_negative_stock: true,
					..Default::default()
				},
			)
			.await
			.unwrap()
		};

		let error = process_sale(
			&env.state,
			env.cashier_id,
			&request(vec![item(made_to_order.id, i64::MAX / 2)], vec![payment(CASH, 1, None)]),
		)
		.await
		.unwrap_err();
		assert_eq!(error.status_code(), 400);
	}

	#[rstest]
	#[tokio::test]
	async fn test_duplicate_products_are_rejected(#[future] env: TestEnv) {
		let env = env.await;
		let error = process_sale(
			&env.state,
			env.cashier_id,
			&request(
				vec![item(env.juice_id, 1), item(env.juice_id, 1)],
				vec![payment(CASH, 10_000, None)],
			),
		)
		.await
		.unwrap_err();
		assert!(error.to_string().contains("more than once"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_insufficient_stock(#[future] env: TestEnv) {
		let env = env.await;
		let error = process_sale(
			&env.state,
			env.cashier_id,
			&request(vec![item(env.juice_id, 11)], vec![payment(CASH, 55_000, None)]),
		)
		.await
		.unwrap_err();
		assert_eq!(error.status_code(), 422);
	}

	#[rstest]
	#[tokio::test]
	async fn test_card_sale_debits_and_void_restores(#[future] env: TestEnv) {
		let env = env.await;
		recharge_at_pos(&env.state, env.cashier_id, CARD, Guaranies(30_000), None, None)
			.await
			.unwrap();

		let receipt = process_sale(
			&env.state,
			env.cashier_id,
			&request(
				vec![item(env.sandwich_id, 1), item(env.juice_id, 1)],
				vec![payment(STUDENT_CARD, 17_000, Some(CARD))],
			),
		)
		.await
		.unwrap();
		assert_eq!(receipt.sale.student_id, Some(env.student_id));
		assert_eq!(receipt.sale.customer_id, env.customer_id);
		assert_eq!(card_balance(&env).await, Guaranies(13_000));

		let voided = void_sale(&env.state, env.manager_id, receipt.sale.id, "Cobro duplicado")
			.await
			.unwrap();
		assert_eq!(voided.state, SaleState::Voided);
		assert_eq!(card_balance(&env).await, Guaranies(30_000));
		assert_eq!(env.stock(env.sandwich_id).await, 20);
		assert_eq!(env.stock(env.juice_id).await, 10);

		let mut conn = env.state.db.pool().acquire().await.unwrap();
		assert_eq!(cards::ledger_balance(&mut conn, CARD).await.unwrap(), Guaranies(30_000));
		drop(conn);

		let error = void_sale(&env.state, env.manager_id, receipt.sale.id, "otra vez").await.unwrap_err();
		assert_eq!(error.status_code(), 409);
	}

	#[rstest]
	#[tokio::test]
	async fn test_card_without_funds_is_denied(#[future] env: TestEnv) {
		let env = env.await;
		let error = process_sale(
			&env.state,
			env.cashier_id,
			&request(vec![item(env.juice_id, 1)], vec![payment(STUDENT_CARD, 5_000, Some(CARD))]),
		)
		.await
		.unwrap_err();
		assert!(error.to_string().starts_with("Insufficient balance"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_negative_balance_with_supervisor(#[future] env: TestEnv) {
		let env = env.await;
		{
			let mut conn = env.state.db.pool().acquire().await.unwrap();
			cards::set_credit(&mut conn, CARD, true, Guaranies(20_000)).await.unwrap();
		}
		let mut sale = request(vec![item(env.sandwich_id, 1)], vec![payment(STUDENT_CARD, 12_000, Some(CARD))]);
		sale.supervisor = Some(SupervisorApproval {
			username: "gerente".into(),
			password: "gerente-2026".into(),
			reason: "Autorizado por la dirección".into(),
		});

		let receipt = process_sale(&env.state, env.cashier_id, &sale).await.unwrap();
		assert_eq!(card_balance(&env).await, Guaranies(-12_000));

		let mut conn = env.state.db.pool().acquire().await.unwrap();
		let open = cantina_db::repositories::authorizations::list_unsettled(&mut conn, CARD)
			.await
			.unwrap();
		assert_eq!(open.len(), 1);
		assert_eq!(open[0].sale_id, Some(receipt.sale.id));
		assert_eq!(open[0].resulting_balance, Guaranies(-12_000));
	}

	#[rstest]
	#[tokio::test]
	async fn test_restriction_conflict_needs_acknowledgement(#[future] env: TestEnv) {
		let env = env.await;
		{
			let mut conn = env.state.db.pool().acquire().await.unwrap();
			customers::insert_restriction(
				&mut conn,
				env.student_id,
				RestrictionKind::PeanutAllergy,
				Some("alergia severa al maní"),
			)
			.await
			.unwrap();
		}
		let mut sale = request(vec![item(env.peanut_bar_id, 1)], vec![payment(CASH, 4_000, None)]);
		sale.student_id = Some(env.student_id);

		let error = process_sale(&env.state, env.cashier_id, &sale).await.unwrap_err();
		assert_eq!(error.status_code(), 409);

		sale.acknowledge_restrictions = true;
		let receipt = process_sale(&env.state, env.cashier_id, &sale).await.unwrap();
		assert_eq!(receipt.conflicts.len(), 1);

		let check = check_restrictions(&env.state, env.student_id, &[env.peanut_bar_id]).await.unwrap();
		assert!(check.requires_authorization);
		let suggested: Vec<i64> = check.alternatives[0].alternatives.iter().map(|p| p.id).collect();
		assert_eq!(suggested, vec![env.sandwich_id]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_alternatives_listed_once_per_product(#[future] env: TestEnv) {
		let env = env.await;
		let (chocolate, candy) = {
			let mut conn = env.state.db.pool().acquire().await.unwrap();
			let other = catalog::insert_category(&mut conn, "Varios", None).await.unwrap();
			let product = |category_id: i64, description: &str| catalog::NewProduct {
				category_id,
				description: description.to_string(),
				price: Guaranies(6_000),
				vat_rate: 10,
				allows_negative_stock: true,
				..Default::default()
			};
			// Diabetes 80 and peanut allergy 50
			let chocolate = catalog::insert_product(&mut conn, &product(env.snacks_id, "Chocolate dulce con maní"))
				.await
				.unwrap();
			// Diabetes 60
			let candy = catalog::insert_product(&mut conn, &product(other.id, "Caramelo dulce"))
				.await
				.unwrap();
			for kind in [RestrictionKind::PeanutAllergy, RestrictionKind::Diabetes] {
				customers::insert_restriction(&mut conn, env.student_id, kind, None).await.unwrap();
			}
			(chocolate, candy)
		};

		let check = check_restrictions(&env.state, env.student_id, &[chocolate.id, candy.id])
			.await
			.unwrap();
		let conflicting: Vec<i64> = check.conflicts.iter().map(|c| c.product_id).collect();
		assert_eq!(conflicting, vec![chocolate.id, candy.id, chocolate.id]);
		let listed: Vec<i64> = check.alternatives.iter().map(|a| a.product_id).collect();
		assert_eq!(listed, vec![chocolate.id, candy.id]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_credit_sale_by_cashier_needs_supervisor(#[future] env: TestEnv) {
		let env = env.await;
		let mut sale = request(vec![item(env.sandwich_id, 1)], vec![]);
		sale.kind = Some(SaleKind::Credit);
		sale.customer_id = Some(env.customer_id);

		let error = process_sale(&env.state, env.cashier_id, &sale).await.unwrap_err();
		assert_eq!(error.status_code(), 403);

		let receipt = process_sale(&env.state, env.manager_id, &sale).await.unwrap();
		assert_eq!(receipt.sale.authorized_by, Some(env.manager_id));
		assert_eq!(receipt.sale.payment_state, PaymentState::Pending);

		let partial = pay_credit_sale(&env.state, env.cashier_id, receipt.sale.id, CASH, Guaranies(5_000), None)
			.await
			.unwrap();
		assert_eq!(partial.payment_state, PaymentState::Partial);
		let account = customer_account(&env.state, env.customer_id).await.unwrap();
		assert_eq!(account.total_debt, Guaranies(7_000));

		let error = pay_credit_sale(&env.state, env.cashier_id, receipt.sale.id, CASH, Guaranies(8_000), None)
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 400);

		let paid = pay_credit_sale(&env.state, env.cashier_id, receipt.sale.id, CASH, Guaranies(7_000), None)
			.await
			.unwrap();
		assert_eq!(paid.payment_state, PaymentState::Paid);
	}

	#[rstest]
	#[tokio::test]
	async fn test_credit_sale_rejects_generic_customer(#[future] env: TestEnv) {
		let env = env.await;
		let mut sale = request(vec![item(env.juice_id, 1)], vec![]);
		sale.kind = Some(SaleKind::Credit);

		let error = process_sale(&env.state, env.manager_id, &sale).await.unwrap_err();
		assert_eq!(error.to_string(), "Credit sales require an identified customer");
	}

	#[rstest]
	#[tokio::test]
	async fn test_best_promotion_and_commission(#[future] env: TestEnv) {
		let env = env.await;
		{
			let mut conn = env.state.db.pool().acquire().await.unwrap();
			promotions::insert_promotion(
				&mut conn,
				&PromotionData {
					name: "Snacks 10%".into(),
					description: None,
					kind: PromotionKind::PercentageDiscount,
					scope: PromotionScope::Category,
					value: 1_000,
					buy_quantity: None,
					pay_quantity: None,
					valid_from: None,
					valid_until: None,
					start_time: None,
					end_time: None,
					weekdays: vec![],
					max_uses: None,
					code: None,
					minimum_amount: None,
					minimum_quantity: None,
					grades: vec![],
					product_ids: vec![],
					category_ids: vec![env.snacks_id],
				},
			)
			.await
			.unwrap();
			payments::insert_commission_rate(&mut conn, DEBIT_CARD, 300, Guaranies(0), Utc::now() - chrono::Duration::days(1))
				.await
				.unwrap();
		}

		let preview = preview_promotion(&env.state, &[item(env.sandwich_id, 2)], None, None).await.unwrap();
		assert_eq!(preview.discount, Guaranies(2_400));
		assert_eq!(preview.total, Guaranies(21_600));

		let receipt = process_sale(
			&env.state,
			env.cashier_id,
			&request(vec![item(env.sandwich_id, 2)], vec![payment(DEBIT_CARD, 21_600, None)]),
		)
		.await
		.unwrap();
		assert_eq!(receipt.sale.discount, Guaranies(2_400));

		let (commission,): (i64,) = sqlx::query_as("SELECT commission FROM sale_commissions")
			.fetch_one(env.state.db.pool())
			.await
			.unwrap();
		assert_eq!(commission, 648);
	}

	#[rstest]
	#[tokio::test]
	async fn test_unknown_promotion_code(#[future] env: TestEnv) {
		let env = env.await;
		let error = preview_promotion(&env.state, &[item(env.juice_id, 1)], None, Some("NOEXISTE"))
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 422);
	}

	#[rstest]
	#[tokio::test]
	async fn test_balance_check_offers_authorization(#[future] env: TestEnv) {
		let env = env.await;
		{
			let mut conn = env.state.db.pool().acquire().await.unwrap();
			cards::set_credit(&mut conn, CARD, true, Guaranies(20_000)).await.unwrap();
		}
		let check = check_balance(&env.state, CARD, Guaranies(8_000)).await.unwrap();
		assert_eq!(check.resulting, Guaranies(-8_000));
		assert!(check.options.contains(&CheckoutOption::Authorize));
	}

	#[rstest]
	#[case("gerente", "gerente-2026", true)]
	#[case("cajera", "cajera-2026", false)]
	#[case("gerente", "incorrecta", false)]
	#[case("nadie", "nadie-2026", false)]
	#[tokio::test]
	async fn test_validate_supervisor(
		#[future] env: TestEnv,
		#[case] username: &str,
		#[case] password: &str,
		#[case] valid: bool,
	) {
		let env = env.await;
		let check = validate_supervisor(&env.state, username, password).await.unwrap();
		assert_eq!(check.valid, valid);
	}
}
