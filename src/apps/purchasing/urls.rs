//! URL configuration for the purchasing app.

use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/suppliers", view(state, views::list_suppliers))
		.post("/suppliers", view(state, views::create_supplier))
		.get("/suppliers/{id}/account", view(state, views::supplier_account))
		.post("/suppliers/{id}/payments", view(state, views::pay_supplier))
		.get("/purchases", view(state, views::list_purchases))
		.post("/purchases", view(state, views::register_purchase))
		.get("/purchases/{id}", view(state, views::get_purchase))
}
