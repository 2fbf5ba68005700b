//! HTTP response and the rendering of service errors.

use bytes::Bytes;
use cantina_core::{Error, Result};
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl Response {
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	pub fn created() -> Self {
		Self::new(StatusCode::CREATED)
	}

	pub fn no_content() -> Self {
		Self::new(StatusCode::NO_CONTENT)
	}

	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	pub fn method_not_allowed() -> Self {
		Self::new(StatusCode::METHOD_NOT_ALLOWED)
	}

	pub fn payload_too_large() -> Self {
		Self::new(StatusCode::PAYLOAD_TOO_LARGE)
	}

	pub fn internal_server_error() -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR)
	}

	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Adds a header; invalid names or values are ignored.
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (
			HeaderName::from_bytes(name.as_bytes()),
			HeaderValue::from_str(value),
		) {
			self.headers.insert(name, value);
		}
		self
	}

	/// Serializes `data` as the body and sets the JSON content type.
	///
	/// # Examples
	///
	/// ```
	/// use cantina_http::Response;
	///
	/// let response = Response::ok().with_json(&serde_json::json!({"balance": 15000})).unwrap();
	/// assert_eq!(response.headers["content-type"], "application/json");
	/// assert_eq!(&response.body[..], br#"{"balance":15000}"#);
	/// ```
	pub fn with_json<T: Serialize>(mut self, data: &T) -> Result<Self> {
		let json = serde_json::to_vec(data).map_err(|e| Error::Internal(format!("Serialization failed: {}", e)))?;
		self.body = Bytes::from(json);
		self.headers
			.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		Ok(self)
	}

	/// Plain text body, used by printable tickets.
	pub fn with_text(self, text: impl Into<String>) -> Self {
		self.with_header("content-type", "text/plain; charset=utf-8")
			.with_body(text.into())
	}

	/// `200` with `data` as JSON.
	pub fn json<T: Serialize>(data: &T) -> Result<Self> {
		Self::ok().with_json(data)
	}

	/// `201` with `data` as JSON.
	pub fn created_json<T: Serialize>(data: &T) -> Result<Self> {
		Self::created().with_json(data)
	}

	/// `{"success": true, "message": ...}`.
	pub fn success(message: &str) -> Result<Self> {
		Self::ok().with_json(&serde_json::json!({"success": true, "message": message}))
	}

	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

impl From<Error> for Response {
	fn from(error: Error) -> Self {
		let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let body = serde_json::json!({
			"success": false,
			"error": error.public_message(),
		});

		Response::new(status)
			.with_json(&body)
			.unwrap_or_else(|_| Response::internal_server_error())
	}
}
