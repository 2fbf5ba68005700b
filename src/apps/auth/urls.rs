//! URL configuration for the auth app.

use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.post("/login", view(state, views::login))
		.post("/portal/login", view(state, views::portal_login))
		.post("/portal/password-reset", view(state, views::portal_password_reset))
		.post("/portal/password-reset/confirm", view(state, views::portal_password_reset_confirm))
		.post("/logout", view(state, views::logout))
		.get("/me", view(state, views::me))
}
