//! URL configuration for the cards app.

use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.post("/", view(state, views::issue_card))
		.get("/{card_number}", view(state, views::card_detail))
		.post("/{card_number}/block", view(state, views::block_card))
		.post("/{card_number}/unblock", view(state, views::unblock_card))
		.put("/{card_number}/credit", view(state, views::configure_credit))
		.put("/{card_number}/alert-threshold", view(state, views::set_alert_threshold))
		.get("/{card_number}/movements", view(state, views::movements))
}
