//! URL configuration for the staff app.

use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/", view(state, views::list_employees))
		.post("/", view(state, views::create_employee))
		.get("/{id}", view(state, views::get_employee))
		.put("/{id}", view(state, views::update_employee))
		.post("/{id}/password", view(state, views::reset_password))
}
