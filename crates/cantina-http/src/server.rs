//! HTTP/1.1 server on hyper.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use crate::shutdown::ShutdownCoordinator;
use crate::{Handler, Middleware, MiddlewareChain, Request, Response};

pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

pub struct HttpServer {
	handler: Arc<dyn Handler>,
	middlewares: Vec<Arc<dyn Middleware>>,
	max_body_size: usize,
}

impl HttpServer {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			handler,
			middlewares: Vec::new(),
			max_body_size: DEFAULT_MAX_BODY_SIZE,
		}
	}

	/// Middleware run in the order added, outermost first.
	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}

	/// The handler with every middleware applied.
	pub fn build_handler(&self) -> Arc<dyn Handler> {
		if self.middlewares.is_empty() {
			return self.handler.clone();
		}
		let chain = self
			.middlewares
			.iter()
			.fold(MiddlewareChain::new(self.handler.clone()), |chain, middleware| {
				chain.with_middleware(middleware.clone())
			});
		Arc::new(chain)
	}

	/// Accepts connections until `coordinator` broadcasts shutdown.
	///
	/// In-flight connections are dropped when the broadcast arrives; the
	/// coordinator is notified once the accept loop has stopped.
	pub async fn listen_with_shutdown(
		self,
		addr: SocketAddr,
		coordinator: ShutdownCoordinator,
	) -> Result<(), ServerError> {
		let listener = TcpListener::bind(addr).await?;
		self.serve(listener, coordinator).await
	}

	/// Same as [`listen_with_shutdown`](Self::listen_with_shutdown) on an
	/// already bound listener.
	pub async fn serve(self, listener: TcpListener, coordinator: ShutdownCoordinator) -> Result<(), ServerError> {
		tracing::info!(addr = %listener.local_addr()?, "server listening");

		let handler = self.build_handler();
		let max_body_size = self.max_body_size;
		let mut shutdown_rx = coordinator.subscribe();

		loop {
			tokio::select! {
				accepted = listener.accept() => {
					let (stream, remote_addr) = match accepted {
						Ok(accepted) => accepted,
						Err(error) => {
							tracing::warn!(%error, "failed to accept connection");
							continue;
						}
					};
					let handler = handler.clone();
					let mut conn_shutdown = coordinator.subscribe();

					tokio::spawn(async move {
						tokio::select! {
							result = Self::handle_connection(stream, remote_addr, handler, max_body_size) => {
								if let Err(error) = result {
									tracing::debug!(%remote_addr, %error, "connection closed with error");
								}
							}
							_ = conn_shutdown.recv() => {}
						}
					});
				}
				_ = shutdown_rx.recv() => {
					tracing::info!("stopped accepting connections");
					break;
				}
			}
		}

		coordinator.notify_shutdown_complete();
		Ok(())
	}

	async fn handle_connection(
		stream: TcpStream,
		remote_addr: SocketAddr,
		handler: Arc<dyn Handler>,
		max_body_size: usize,
	) -> Result<(), ServerError> {
		let service = RequestService {
			handler,
			remote_addr,
			max_body_size,
		};
		http1::Builder::new()
			.serve_connection(TokioIo::new(stream), service)
			.await?;
		Ok(())
	}
}

struct RequestService {
	handler: Arc<dyn Handler>,
	remote_addr: SocketAddr,
	max_body_size: usize,
}

impl Service<hyper::Request<Incoming>> for RequestService {
	type Response = hyper::Response<Full<Bytes>>;
	type Error = ServerError;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

	fn call(&self, req: hyper::Request<Incoming>) -> Self::Future {
		let handler = self.handler.clone();
		let remote_addr = self.remote_addr;
		let max_body_size = self.max_body_size;

		Box::pin(async move {
			if let Some(length) = req.headers().get(hyper::header::CONTENT_LENGTH)
				&& let Ok(length) = length.to_str()
				&& let Ok(length) = length.parse::<usize>()
				&& length > max_body_size
			{
				return Ok(into_hyper(too_large()));
			}

			let (parts, body) = req.into_parts();
			let body = match Limited::new(body, max_body_size).collect().await {
				Ok(collected) => collected.to_bytes(),
				Err(_) => return Ok(into_hyper(too_large())),
			};

			let request = Request::builder()
				.method(parts.method)
				.uri(parts.uri.to_string())
				.version(parts.version)
				.headers(parts.headers)
				.body(body)
				.remote_addr(remote_addr)
				.build();

			let response = match request {
				Ok(request) => handler.handle(request).await.unwrap_or_else(Response::from),
				Err(error) => Response::from(error),
			};
			Ok(into_hyper(response))
		})
	}
}

fn too_large() -> Response {
	Response::payload_too_large()
		.with_json(&serde_json::json!({"success": false, "error": "Request body too large"}))
		.unwrap_or_else(|_| Response::payload_too_large())
}

fn into_hyper(response: Response) -> hyper::Response<Full<Bytes>> {
	let mut out = hyper::Response::new(Full::new(response.body));
	*out.status_mut() = response.status;
	*out.headers_mut() = response.headers;
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{RequestLoggingMiddleware, Router, handler_fn};
	use rstest::rstest;
	use std::time::Duration;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};

	#[rstest]
	#[tokio::test]
	async fn test_serves_until_shutdown() {
		let router = Router::new().get("/health", handler_fn(|_req| async {
			Response::ok().with_json(&serde_json::json!({"status": "ok"}))
		}));
		let server = HttpServer::new(Arc::new(router)).with_middleware(Arc::new(RequestLoggingMiddleware::new()));
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let coordinator = ShutdownCoordinator::new(Duration::from_secs(2));
		let running = tokio::spawn(server.serve(listener, coordinator.clone()));

		let mut stream = TcpStream::connect(addr).await.unwrap();
		stream
			.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
			.await
			.unwrap();
		let mut raw = String::new();
		stream.read_to_string(&mut raw).await.unwrap();

		assert!(raw.starts_with("HTTP/1.1 200 OK"));
		assert!(raw.contains(r#"{"status":"ok"}"#));

		coordinator.shutdown();
		assert!(coordinator.wait_for_shutdown().await);
		running.await.unwrap().unwrap();
	}
}
