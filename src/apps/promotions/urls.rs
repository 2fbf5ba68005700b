//! URL configuration for the promotions app.

use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/", view(state, views::list_promotions))
		.post("/", view(state, views::create_promotion))
		.get("/{id}", view(state, views::get_promotion))
		.put("/{id}", view(state, views::update_promotion))
		.post("/{id}/activate", view(state, views::activate))
		.post("/{id}/deactivate", view(state, views::deactivate))
}
