//! Root URL configuration.

use std::sync::Arc;

use cantina_core::Result;
use cantina_http::{Handler, MiddlewareChain, Request, RequestLoggingMiddleware, Response, Router};
use hyper::StatusCode;
use serde_json::json;

use crate::apps;
use crate::extract::view;
use crate::middleware::AuthenticationMiddleware;
use crate::state::AppState;

/// GET /health
async fn health(state: AppState, _request: Request) -> Result<Response> {
	match state.db.ping().await {
		Ok(()) => Response::json(&json!({"status": "ok", "database": "ok"})),
		Err(error) => {
			tracing::error!(%error, "health check: database unreachable");
			Response::new(StatusCode::SERVICE_UNAVAILABLE)
				.with_json(&json!({"status": "degraded", "database": "unavailable"}))
		}
	}
}

pub fn build_router(state: &AppState) -> Router {
	Router::new()
		.get("/health", view(state, health))
		.include("/api", apps::url_patterns(state))
}

/// The router wrapped in request logging and bearer authentication, ready to
/// be served.
pub fn build_handler(state: &AppState) -> Arc<dyn Handler> {
	let chain = MiddlewareChain::new(Arc::new(build_router(state)))
		.with_middleware(Arc::new(RequestLoggingMiddleware::new()))
		.with_middleware(Arc::new(AuthenticationMiddleware::new(state.db.clone())));
	Arc::new(chain)
}
