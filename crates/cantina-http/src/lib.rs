//! # cantina-http
//!
//! The HTTP plumbing of the canteen service: a buffered [`Request`] and
//! [`Response`], the [`Handler`] and [`Middleware`] traits, a path router and
//! a hyper based server with graceful shutdown.
//!
//! ```rust
//! use async_trait::async_trait;
//! use cantina_http::{Handler, Request, Response, Router};
//! use hyper::Method;
//! use std::sync::Arc;
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Handler for Ping {
//! 	async fn handle(&self, _request: Request) -> cantina_core::Result<Response> {
//! 		Response::ok().with_json(&serde_json::json!({"pong": true}))
//! 	}
//! }
//!
//! let router = Router::new().route(Method::GET, "/ping", Arc::new(Ping));
//! assert_eq!(router.len(), 1);
//! ```

pub mod extensions;
pub mod logging;
pub mod middleware;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod shutdown;

pub use extensions::Extensions;
pub use logging::RequestLoggingMiddleware;
pub use middleware::{Handler, Middleware, MiddlewareChain};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use router::{Router, handler_fn};
pub use server::HttpServer;
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
