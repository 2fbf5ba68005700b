//! Plain-text receipts for the ticket printer.

use cantina_conf::CompanySettings;
use cantina_core::enums::{PaymentMethodKind, SaleState};
use cantina_core::{Guaranies, Result};
use cantina_db::repositories::{accounts, cards};
use chrono::Local;

use crate::services::sales::{SaleDetail, load_detail};
use crate::state::AppState;

pub const WIDTH: usize = 40;

fn truncate(text: &str, width: usize) -> String {
	text.chars().take(width).collect()
}

fn center(text: &str) -> String {
	let text = truncate(text, WIDTH);
	let pad = (WIDTH - text.chars().count()) / 2;
	format!("{}{}", " ".repeat(pad), text)
}

/// `left` and `right` on one line, `right` flush with the margin.
fn columns(left: &str, right: &str) -> String {
	let right_len = right.chars().count();
	let left = truncate(left, WIDTH.saturating_sub(right_len + 1));
	let gap = WIDTH.saturating_sub(left.chars().count() + right_len).max(1);
	format!("{}{}{}", left, " ".repeat(gap), right)
}

fn rule(ch: char) -> String {
	ch.to_string().repeat(WIDTH)
}

/// Renders the receipt of a sale.
///
/// `card_balance` is the card used in the sale and its remaining balance.
pub fn render(
	company: &CompanySettings,
	detail: &SaleDetail,
	cashier: &str,
	card_balance: Option<(&str, Guaranies)>,
) -> String {
	let sale = &detail.sale;
	let mut lines = vec![center(&company.name), center(&format!("RUC {}", company.ruc))];
	if !company.address.is_empty() {
		lines.push(center(&company.address));
	}
	if !company.phone.is_empty() {
		lines.push(center(&format!("Tel. {}", company.phone)));
	}
	lines.push(rule('='));
	lines.push(columns(&format!("Venta #{}", sale.id), &sale.kind.to_string()));
	lines.push(format!(
		"Fecha: {}",
		sale.created_at.with_timezone(&Local).format("%d/%m/%Y %H:%M")
	));
	lines.push(truncate(&format!("Cajero: {}", cashier), WIDTH));
	if let Some(document) = &detail.document {
		lines.push(format!("Factura: {}", document.document_number));
	}
	lines.push(rule('-'));

	for item in &detail.items {
		lines.push(truncate(&item.description, WIDTH));
		lines.push(columns(
			&format!("  {} x {}", item.quantity, item.unit_price),
			&item.subtotal.to_string(),
		));
	}
	lines.push(rule('-'));
	if sale.discount.is_positive() {
		lines.push(columns("Subtotal", &sale.subtotal.to_string()));
		lines.push(columns("Descuento", &format!("-{}", sale.discount)));
	}
	lines.push(columns("TOTAL", &sale.total_amount.to_string()));

	for payment in &detail.payments {
		lines.push(columns(&payment.method, &payment.amount.to_string()));
	}
	if sale.pending_balance.is_positive() {
		lines.push(columns("Saldo pendiente", &sale.pending_balance.to_string()));
	}
	if let Some((number, balance)) = card_balance {
		lines.push(columns(&format!("Saldo tarjeta {}", number), &balance.to_string()));
	}
	if sale.state == SaleState::Voided {
		lines.push(center("*** VENTA ANULADA ***"));
	}
	lines.push(rule('='));
	lines.push(center("Gracias por su compra"));

	let mut ticket = lines.join("\n");
	ticket.push('\n');
	ticket
}

/// The receipt of a stored sale.
pub async fn sale_ticket(state: &AppState, sale_id: i64) -> Result<String> {
	let mut conn = state.db.pool().acquire().await?;
	let detail = load_detail(&mut conn, sale_id).await?;
	let cashier = accounts::get_employee(&mut conn, detail.sale.employee_id).await?;
	let card_number = detail
		.payments
		.iter()
		.filter(|p| p.method_kind == PaymentMethodKind::StudentCard)
		.find_map(|p| p.card_number.clone());
	let card_balance = match card_number {
		Some(number) => {
			let card = cards::get_card(&mut conn, &number).await?;
			Some((number, card.balance))
		}
		None => None,
	};
	Ok(render(
		&state.settings.company,
		&detail,
		&cashier.full_name(),
		card_balance.as_ref().map(|(n, b)| (n.as_str(), *b)),
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::cards::recharge_at_pos;
	use crate::services::sales::{ItemInput, PaymentInput, SaleRequest, process_sale};
	use crate::services::testing::{CARD, TestEnv, env};
	use rstest::rstest;

	#[rstest]
	#[case("Total", "Gs. 5.000")]
	#[case("Una descripción demasiado larga para el ticket", "Gs. 1.250.000")]
	fn test_columns_fit_width(#[case] left: &str, #[case] right: &str) {
		let line = columns(left, right);
		assert_eq!(line.chars().count(), WIDTH);
		assert!(line.ends_with(right));
	}

	#[rstest]
	#[tokio::test]
	async fn test_ticket_shows_card_balance(#[future] env: TestEnv) {
		let env = env.await;
		recharge_at_pos(&env.state, env.cashier_id, CARD, Guaranies(20_000), None, None)
			.await
			.unwrap();
		let receipt = process_sale(
			&env.state,
			env.cashier_id,
			&SaleRequest {
				items: vec![ItemInput {
					product_id: env.juice_id,
					quantity: 2,
				}],
				payments: vec![PaymentInput {
					payment_method_id: 2,
					amount: Guaranies(10_000),
					card_number: Some(CARD.to_string()),
					reference: None,
				}],
				kind: None,
				student_id: None,
				customer_id: None,
				cash_session_id: None,
				promotion_code: None,
				acknowledge_restrictions: false,
				supervisor: None,
				issue_invoice: false,
			},
		)
		.await
		.unwrap();

		let ticket = sale_ticket(&env.state, receipt.sale.id).await.unwrap();
		assert!(ticket.contains(&format!("Venta #{}", receipt.sale.id)));
		assert!(ticket.contains("Jugo de naranja"));
		assert!(ticket.lines().any(|l| l.starts_with("TOTAL") && l.ends_with("Gs. 10.000")));
		assert!(ticket.lines().any(|l| l.starts_with("Saldo tarjeta 1001") && l.ends_with("Gs. 10.000")));
		assert!(ticket.lines().all(|l| l.chars().count() <= WIDTH));
	}
}
