//! HTTP applications, one per area of the canteen.
//!
//! Each app exposes `url_patterns(&AppState) -> Router`; [`url_patterns`]
//! mounts them all under their prefixes. Paths here are relative to `/api`.

pub mod audit;
pub mod auth;
pub mod cards;
pub mod cash;
pub mod catalog;
pub mod customers;
pub mod fiscal;
pub mod lunch;
pub mod payments;
pub mod portal;
pub mod pos;
pub mod promotions;
pub mod purchasing;
pub mod reports;
pub mod staff;

use cantina_http::Router;

use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.include("/auth", auth::urls::url_patterns(state))
		.include("/customers", customers::urls::url_patterns(state))
		.include("/cards", cards::urls::url_patterns(state))
		.include("/catalog", catalog::urls::url_patterns(state))
		.include("/purchasing", purchasing::urls::url_patterns(state))
		.include("/staff", staff::urls::url_patterns(state))
		.include("/payment-methods", payments::urls::url_patterns(state))
		.include("/promotions", promotions::urls::url_patterns(state))
		.include("/lunch", lunch::urls::url_patterns(state))
		.include("/cash", cash::urls::url_patterns(state))
		.include("/fiscal", fiscal::urls::url_patterns(state))
		.include("/reports", reports::urls::url_patterns(state))
		.include("/audit", audit::urls::url_patterns(state))
		.include("/pos", pos::urls::url_patterns(state))
		.include("/portal", portal::urls::url_patterns(state))
}
