use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/daily", view(state, views::daily))
		.get("/sales-by-method", view(state, views::sales_by_method))
		.get("/top-products", view(state, views::top_products))
		.get("/negative-cards", view(state, views::negative_cards))
		.get("/authorizations", view(state, views::negative_authorizations))
		.get("/commissions", view(state, views::commissions))
		.get("/lunch", view(state, views::lunch))
		.get("/cash-sessions", view(state, views::cash_sessions))
}
