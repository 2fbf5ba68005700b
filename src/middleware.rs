//! Bearer-token authentication.

use std::sync::Arc;

use async_trait::async_trait;
use cantina_auth::token::bearer_token;
use cantina_core::Result;
use cantina_db::Database;
use cantina_http::{Handler, Middleware, Request, Response};

use crate::services::auth;

/// Resolves `Authorization: Bearer <token>` to a
/// [`Principal`](cantina_auth::Principal) stored in the request extensions.
///
/// Requests without a token pass through unauthenticated; views that need a
/// caller reject them. An unknown or expired token is rejected here with `401`.
pub struct AuthenticationMiddleware {
	db: Database,
}

impl AuthenticationMiddleware {
	pub fn new(db: Database) -> Self {
		Self { db }
	}
}

#[async_trait]
impl Middleware for AuthenticationMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
		let token = request.authorization().and_then(bearer_token).map(str::to_string);
		if let Some(token) = token {
			let principal = auth::resolve_session(&self.db, &token).await?;
			tracing::debug!(?principal, path = %request.path(), "authenticated request");
			request.extensions.insert(principal);
		}
		next.handle(request).await
	}

	fn should_continue(&self, request: &Request) -> bool {
		request.path() != "/health"
	}
}
