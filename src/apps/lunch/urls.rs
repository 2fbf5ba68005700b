use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/types", view(state, views::list_types))
		.post("/types", view(state, views::create_type))
		.get("/plans", view(state, views::list_plans))
		.post("/plans", view(state, views::create_plan))
		.get("/subscriptions", view(state, views::list_subscriptions))
		.post("/subscriptions", view(state, views::subscribe))
		.post("/subscriptions/{id}/suspend", view(state, views::suspend))
		.post("/subscriptions/{id}/reactivate", view(state, views::reactivate))
		.post("/subscriptions/{id}/cancel", view(state, views::cancel))
		.get("/fees", view(state, views::list_fees))
		.post("/fees/generate", view(state, views::generate_fees))
		.post("/fees/{id}/pay", view(state, views::pay_fee))
		.post("/records", view(state, views::serve))
		.get("/accounts", view(state, views::list_accounts))
		.post("/accounts/generate", view(state, views::generate_accounts))
		.post("/accounts/{id}/pay", view(state, views::pay_account))
		.get("/students/{id}/statement", view(state, views::statement))
}
