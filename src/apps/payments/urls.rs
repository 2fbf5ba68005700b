//! URL configuration for the payment methods app.

use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/", view(state, views::list_methods))
		.post("/", view(state, views::create_method))
		.put("/{id}/active", view(state, views::set_active))
		.get("/{id}/commission-rates", view(state, views::list_rates))
		.post("/{id}/commission-rates", view(state, views::add_rate))
}
