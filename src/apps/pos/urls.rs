use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.post("/balance-check", view(state, views::balance_check))
		.post("/restriction-check", view(state, views::restriction_check))
		.post("/promotion-preview", view(state, views::promotion_preview))
		.get("/sales", view(state, views::list_sales))
		.post("/sales", view(state, views::create_sale))
		.get("/sales/{id}", view(state, views::get_sale))
		.post("/sales/{id}/void", view(state, views::void_sale))
		.post("/sales/{id}/payments", view(state, views::pay_sale))
		.get("/sales/{id}/ticket", view(state, views::sale_ticket))
		.post("/recharges", view(state, views::recharge))
		.post("/validate-supervisor", view(state, views::validate_supervisor))
}
