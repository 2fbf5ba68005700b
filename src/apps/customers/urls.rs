//! URL configuration for the customers app.

use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/", view(state, views::list_customers))
		.post("/", view(state, views::create_customer))
		.get("/students/{id}", view(state, views::get_student))
		.put("/students/{id}", view(state, views::update_student))
		.get("/students/{id}/restrictions", view(state, views::list_restrictions))
		.post("/students/{id}/restrictions", view(state, views::add_restriction))
		.delete(
			"/students/{id}/restrictions/{restriction_id}",
			view(state, views::delete_restriction),
		)
		.get("/{id}", view(state, views::get_customer))
		.put("/{id}", view(state, views::update_customer))
		.get("/{id}/account", view(state, views::customer_account))
		.post("/{id}/portal-user", view(state, views::create_portal_user))
		.get("/{id}/students", view(state, views::list_students))
		.post("/{id}/students", view(state, views::create_student))
}
