use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new().get("/", view(state, views::list_entries))
}
