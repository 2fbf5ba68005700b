use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/stamps", view(state, views::list_stamps))
		.post("/stamps", view(state, views::create_stamp))
		.post("/invoices", view(state, views::issue_invoice))
		.get("/documents/{id}", view(state, views::get_document))
		.get("/sales/{id}/credit-notes", view(state, views::list_credit_notes))
		.post("/sales/{id}/credit-notes", view(state, views::issue_credit_note))
		.get("/credit-notes/{id}", view(state, views::get_credit_note))
		.post("/credit-notes/{id}/void", view(state, views::void_credit_note))
		.get("/ruc/{base}", view(state, views::ruc_digit))
}
