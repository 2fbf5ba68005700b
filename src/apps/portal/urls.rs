use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/children", view(state, views::children))
		.get("/cards/{card_number}/movements", view(state, views::card_movements))
		.put("/cards/{card_number}/alert-threshold", view(state, views::set_alert_threshold))
		.get("/recharges", view(state, views::recharge_history))
		.post("/recharges", view(state, views::request_recharge))
		.post("/recharges/{id}/cancel", view(state, views::cancel_recharge))
		.post("/gateway/callback", view(state, views::gateway_callback))
		.get("/notifications", view(state, views::notifications))
		.post("/notifications/{id}/read", view(state, views::mark_read))
		.get("/students/{id}/restrictions", view(state, views::child_restrictions))
		.get("/students/{id}/lunch", view(state, views::child_lunch))
		.post("/password", view(state, views::change_password))
}
