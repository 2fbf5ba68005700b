use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/registers", view(state, views::list_registers))
		.post("/registers", view(state, views::create_register))
		.get("/sessions", view(state, views::list_sessions))
		.post("/sessions", view(state, views::open_session))
		.get("/sessions/{id}", view(state, views::session_summary))
		.post("/sessions/{id}/close", view(state, views::close_session))
}
