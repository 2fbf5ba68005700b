//! Handler and middleware traits.
//!
//! A [`Handler`] turns a request into a response. A [`Middleware`] wraps the
//! next handler to add a cross-cutting concern (request logging, bearer
//! authentication). [`MiddlewareChain`] composes both into a single handler.

use async_trait::async_trait;
use cantina_core::Result;
use std::sync::Arc;

use crate::{Request, Response};

#[async_trait]
pub trait Handler: Send + Sync {
	async fn handle(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
	async fn handle(&self, request: Request) -> Result<Response> {
		(**self).handle(request).await
	}
}

#[async_trait]
pub trait Middleware: Send + Sync {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response>;

	/// Whether this middleware runs for `request`. Skipped middleware passes
	/// the request straight to the next handler.
	fn should_continue(&self, _request: &Request) -> bool {
		true
	}
}

/// Middleware run in the order they were added, around one handler.
pub struct MiddlewareChain {
	middlewares: Vec<Arc<dyn Middleware>>,
	handler: Arc<dyn Handler>,
}

impl MiddlewareChain {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			middlewares: Vec::new(),
			handler,
		}
	}

	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}
}

#[async_trait]
impl Handler for MiddlewareChain {
	async fn handle(&self, request: Request) -> Result<Response> {
		let mut current: Arc<dyn Handler> = self.handler.clone();
		for middleware in self
			.middlewares
			.iter()
			.rev()
			.filter(|mw| mw.should_continue(&request))
		{
			current = Arc::new(ComposedHandler {
				middleware: middleware.clone(),
				next: current,
			});
		}
		current.handle(request).await
	}
}

struct ComposedHandler {
	middleware: Arc<dyn Middleware>,
	next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for ComposedHandler {
	async fn handle(&self, request: Request) -> Result<Response> {
		self.middleware.process(request, self.next.clone()).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::Bytes;
	use hyper::Method;
	use rstest::rstest;

	struct Echo;

	#[async_trait]
	impl Handler for Echo {
		async fn handle(&self, request: Request) -> Result<Response> {
			let seen = request.header("x-trail").unwrap_or("").to_string();
			Ok(Response::ok().with_body(Bytes::from(format!("{}handler", seen))))
		}
	}

	struct Trail(&'static str);

	#[async_trait]
	impl Middleware for Trail {
		async fn process(&self, mut request: Request, next: Arc<dyn Handler>) -> Result<Response> {
			let trail = format!("{}{}>", request.header("x-trail").unwrap_or(""), self.0);
			if let Ok(value) = trail.parse() {
				request.headers.insert("x-trail", value);
			}
			next.handle(request).await
		}
	}

	struct Gate;

	#[async_trait]
	impl Middleware for Gate {
		async fn process(&self, _request: Request, _next: Arc<dyn Handler>) -> Result<Response> {
			Ok(Response::new(hyper::StatusCode::UNAUTHORIZED))
		}

		fn should_continue(&self, request: &Request) -> bool {
			request.path().starts_with("/api/")
		}
	}

	fn request(path: &str) -> Request {
		Request::builder().method(Method::GET).uri(path).build().unwrap()
	}

	#[rstest]
	#[tokio::test]
	async fn test_middleware_runs_in_insertion_order() {
		let chain = MiddlewareChain::new(Arc::new(Echo))
			.with_middleware(Arc::new(Trail("a")))
			.with_middleware(Arc::new(Trail("b")));

		let response = chain.handle(request("/health")).await.unwrap();
		assert_eq!(response.body_text(), "a>b>handler");
	}

	#[rstest]
	#[case("/health", 200)]
	#[case("/api/cards/1", 401)]
	#[tokio::test]
	async fn test_conditional_middleware(#[case] path: &str, #[case] status: u16) {
		let chain = MiddlewareChain::new(Arc::new(Echo)).with_middleware(Arc::new(Gate));

		let response = chain.handle(request(path)).await.unwrap();
		assert_eq!(response.status.as_u16(), status);
	}
}
