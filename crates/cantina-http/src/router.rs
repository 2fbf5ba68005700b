//! Method and path dispatch.
//!
//! Patterns are literal segments and `{name}` placeholders, e.g.
//! `/api/cards/{card_number}/movements`. A trailing slash is not significant.
//! Unknown paths yield `404`; a known path with another method yields `405`
//! with an `Allow` header.

use async_trait::async_trait;
use cantina_core::{Error, Result};
use hyper::Method;
use std::future::Future;
use std::sync::Arc;

use crate::{Handler, Request, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Param(String),
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
	split_path(pattern)
		.map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
			Some(name) => Segment::Param(name.to_string()),
			None => Segment::Literal(segment.to_string()),
		})
		.collect()
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
	path.split('/').filter(|segment| !segment.is_empty())
}

#[derive(Clone)]
struct Route {
	method: Method,
	pattern: String,
	segments: Vec<Segment>,
	handler: Arc<dyn Handler>,
}

impl Route {
	/// Captured parameters when `path` matches this route's pattern.
	fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
		let parts: Vec<&str> = split_path(path).collect();
		if parts.len() != self.segments.len() {
			return None;
		}
		let mut params = Vec::new();
		for (segment, part) in self.segments.iter().zip(parts) {
			match segment {
				Segment::Literal(literal) if literal == part => {}
				Segment::Literal(_) => return None,
				Segment::Param(name) => params.push((name.clone(), part.to_string())),
			}
		}
		Some(params)
	}
}

#[derive(Clone, Default)]
pub struct Router {
	routes: Vec<Route>,
}

impl Router {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn route(mut self, method: Method, pattern: &str, handler: Arc<dyn Handler>) -> Self {
		self.routes.push(Route {
			method,
			pattern: pattern.to_string(),
			segments: parse_pattern(pattern),
			handler,
		});
		self
	}

	pub fn get(self, pattern: &str, handler: Arc<dyn Handler>) -> Self {
		self.route(Method::GET, pattern, handler)
	}

	pub fn post(self, pattern: &str, handler: Arc<dyn Handler>) -> Self {
		self.route(Method::POST, pattern, handler)
	}

	pub fn put(self, pattern: &str, handler: Arc<dyn Handler>) -> Self {
		self.route(Method::PUT, pattern, handler)
	}

	pub fn delete(self, pattern: &str, handler: Arc<dyn Handler>) -> Self {
		self.route(Method::DELETE, pattern, handler)
	}

	/// Mounts every route of `other` under `prefix`.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_http::{Response, Router, handler_fn};
	///
	/// let cards = Router::new().get("/{card_number}", handler_fn(|_req| async { Ok(Response::ok()) }));
	/// let api = Router::new().include("/api/cards", cards);
	///
	/// assert_eq!(api.patterns(), vec!["GET /api/cards/{card_number}".to_string()]);
	/// ```
	pub fn include(mut self, prefix: &str, other: Router) -> Self {
		let prefix = prefix.trim_end_matches('/');
		for route in other.routes {
			let pattern = format!("{}{}", prefix, route.pattern);
			self.routes.push(Route {
				segments: parse_pattern(&pattern),
				pattern,
				..route
			});
		}
		self
	}

	pub fn len(&self) -> usize {
		self.routes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}

	/// `METHOD pattern` for every route, in registration order.
	pub fn patterns(&self) -> Vec<String> {
		self.routes
			.iter()
			.map(|route| format!("{} {}", route.method, route.pattern))
			.collect()
	}

	async fn dispatch(&self, mut request: Request) -> Result<Response> {
		let path = request.path().to_string();
		let mut allowed: Vec<&Method> = Vec::new();

		for route in &self.routes {
			let Some(params) = route.captures(&path) else {
				continue;
			};
			if route.method != request.method {
				allowed.push(&route.method);
				continue;
			}
			for (name, value) in params {
				request.set_path_param(name, value);
			}
			return route.handler.handle(request).await;
		}

		if allowed.is_empty() {
			return Err(Error::NotFound(format!("No route for {}", path)));
		}
		let allow = allowed
			.iter()
			.map(|method| method.as_str())
			.collect::<Vec<_>>()
			.join(", ");
		Ok(Response::method_not_allowed()
			.with_header("allow", &allow)
			.with_json(&serde_json::json!({
				"success": false,
				"error": format!("Method {} not allowed", request.method),
			}))?)
	}
}

#[async_trait]
impl Handler for Router {
	/// Errors raised by views are rendered here, so everything outside the
	/// router sees a plain response.
	async fn handle(&self, request: Request) -> Result<Response> {
		let method = request.method.clone();
		let path = request.path().to_string();
		match self.dispatch(request).await {
			Ok(response) => Ok(response),
			Err(error) => {
				if error.is_server_error() {
					tracing::error!(%method, %path, %error, "request failed");
				} else {
					tracing::debug!(%method, %path, %error, "request rejected");
				}
				Ok(Response::from(error))
			}
		}
	}
}

/// Adapts an async closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
	F: Fn(Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Response>> + Send + 'static,
{
	Arc::new(FnHandler(f))
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
	F: Fn(Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Response>> + Send + 'static,
{
	async fn handle(&self, request: Request) -> Result<Response> {
		(self.0)(request).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	fn echo_param(name: &'static str) -> Arc<dyn Handler> {
		handler_fn(move |request: Request| async move {
			let value: String = request.path_param(name)?;
			Ok(Response::ok().with_body(value))
		})
	}

	#[fixture]
	fn router() -> Router {
		let cards = Router::new()
			.get("/{card_number}", echo_param("card_number"))
			.post("/{card_number}/block", handler_fn(|_req| async { Ok(Response::no_content()) }))
			.get("/{card_number}/movements", handler_fn(|_req| async { Ok(Response::ok().with_body("movements")) }));
		Router::new()
			.get("/health", handler_fn(|_req| async { Ok(Response::ok()) }))
			.get("/api/sales/{id}", handler_fn(|request: Request| async move {
				let id: i64 = request.path_param("id")?;
				Ok(Response::ok().with_body(id.to_string()))
			}))
			.include("/api/cards/", cards)
	}

	fn request(method: Method, path: &str) -> Request {
		Request::builder().method(method).uri(path).build().unwrap()
	}

	#[rstest]
	#[case(Method::GET, "/health", 200, "")]
	#[case(Method::GET, "/health/", 200, "")]
	#[case(Method::GET, "/api/cards/1001", 200, "1001")]
	#[case(Method::GET, "/api/cards/1001/movements", 200, "movements")]
	#[case(Method::POST, "/api/cards/1001/block", 204, "")]
	#[case(Method::GET, "/api/sales/42", 200, "42")]
	#[tokio::test]
	async fn test_dispatch(
		router: Router,
		#[case] method: Method,
		#[case] path: &str,
		#[case] status: u16,
		#[case] body: &str,
	) {
		let response = router.handle(request(method, path)).await.unwrap();
		assert_eq!(response.status.as_u16(), status);
		assert_eq!(response.body_text(), body);
	}

	#[rstest]
	#[tokio::test]
	async fn test_unknown_path_is_404(router: Router) {
		let response = router.handle(request(Method::GET, "/api/unknown")).await.unwrap();
		let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
		assert_eq!(response.status.as_u16(), 404);
		assert_eq!(body["success"], false);
	}

	#[rstest]
	#[tokio::test]
	async fn test_wrong_method_is_405(router: Router) {
		let response = router.handle(request(Method::DELETE, "/api/cards/1001")).await.unwrap();
		assert_eq!(response.status.as_u16(), 405);
		assert_eq!(response.headers["allow"], "GET");
	}

	#[rstest]
	#[tokio::test]
	async fn test_view_errors_are_rendered(router: Router) {
		let response = router.handle(request(Method::GET, "/api/sales/abc")).await.unwrap();
		assert_eq!(response.status.as_u16(), 400);
	}
}
