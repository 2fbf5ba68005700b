//! Request logging middleware.

use async_trait::async_trait;
use cantina_core::Result;
use chrono::Utc;
use std::sync::Arc;

use crate::{Handler, Middleware, Request, Response};

/// Emits one `tracing` event per request with method, path, status and
/// elapsed milliseconds. Health checks are logged at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLoggingMiddleware;

impl RequestLoggingMiddleware {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Middleware for RequestLoggingMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
		let start = Utc::now();
		let method = request.method.to_string();
		let path = request.path().to_string();

		let result = next.handle(request).await;
		let elapsed_ms = Utc::now().signed_duration_since(start).num_milliseconds();

		match &result {
			Ok(response) if path == "/health" => {
				tracing::debug!(%method, %path, status = response.status.as_u16(), elapsed_ms, "request");
			}
			Ok(response) if response.status.is_server_error() => {
				tracing::error!(%method, %path, status = response.status.as_u16(), elapsed_ms, "request");
			}
			Ok(response) => {
				tracing::info!(%method, %path, status = response.status.as_u16(), elapsed_ms, "request");
			}
			Err(error) => {
				tracing::warn!(%method, %path, status = error.status_code(), %error, elapsed_ms, "request");
			}
		}

		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handler_fn;
	use cantina_core::Error;
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_passes_response_through() {
		let next = handler_fn(|_req| async { Ok(Response::created()) });
		let request = Request::builder().uri("/api/customers").build().unwrap();

		let response = RequestLoggingMiddleware::new().process(request, next).await.unwrap();
		assert_eq!(response.status.as_u16(), 201);
	}

	#[rstest]
	#[tokio::test]
	async fn test_passes_error_through() {
		let next = handler_fn(|_req| async { Err(Error::Authentication("token expired".into())) });
		let request = Request::builder().uri("/api/auth/me").build().unwrap();

		let error = RequestLoggingMiddleware::new().process(request, next).await.unwrap_err();
		assert_eq!(error.status_code(), 401);
	}
}
