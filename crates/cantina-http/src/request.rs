//! Buffered HTTP request.

use bytes::Bytes;
use cantina_core::{Error, Result};
use hyper::header::{AUTHORIZATION, HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Uri, Version};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::extensions::Extensions;

/// A request whose body has already been read.
#[derive(Debug, Clone)]
pub struct Request {
	pub method: Method,
	pub uri: Uri,
	pub version: Version,
	pub headers: HeaderMap,
	pub body: Bytes,
	/// Values captured from `{name}` segments by the router.
	pub path_params: HashMap<String, String>,
	/// Raw (still percent-encoded) query pairs.
	pub query_params: HashMap<String, String>,
	pub remote_addr: Option<SocketAddr>,
	pub extensions: Extensions,
}

impl Request {
	/// # Examples
	///
	/// ```
	/// use cantina_http::Request;
	/// use hyper::Method;
	///
	/// let request = Request::builder()
	/// 	.method(Method::GET)
	/// 	.uri("/api/cards/1001?limit=20")
	/// 	.build()
	/// 	.unwrap();
	///
	/// assert_eq!(request.path(), "/api/cards/1001");
	/// assert_eq!(request.query::<i64>("limit").unwrap(), Some(20));
	/// ```
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	pub fn path(&self) -> &str {
		self.uri.path()
	}

	fn parse_query_params(uri: &Uri) -> HashMap<String, String> {
		uri.query()
			.map(|query| {
				query
					.split('&')
					.filter(|pair| !pair.is_empty())
					.filter_map(|pair| {
						let mut parts = pair.splitn(2, '=');
						Some((parts.next()?.to_string(), parts.next().unwrap_or("").to_string()))
					})
					.collect()
			})
			.unwrap_or_default()
	}

	/// Percent-decoded query value, with `+` read as a space.
	pub fn query_value(&self, name: &str) -> Option<String> {
		self.query_params.iter().find_map(|(key, value)| {
			let key = percent_decode_str(key).decode_utf8_lossy();
			(key == name).then(|| {
				let value = value.replace('+', " ");
				percent_decode_str(&value).decode_utf8_lossy().into_owned()
			})
		})
	}

	/// Parses an optional query parameter. Empty values count as absent.
	pub fn query<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
		match self.query_value(name) {
			None => Ok(None),
			Some(value) if value.is_empty() => Ok(None),
			Some(value) => value
				.parse::<T>()
				.map(Some)
				.map_err(|_| Error::BadRequest(format!("Invalid value for query parameter '{}'", name))),
		}
	}

	/// Parses a required query parameter.
	pub fn require_query<T: FromStr>(&self, name: &str) -> Result<T> {
		self.query(name)?
			.ok_or_else(|| Error::BadRequest(format!("Missing query parameter '{}'", name)))
	}

	pub fn set_path_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.path_params.insert(key.into(), value.into());
	}

	/// Parses a path parameter captured by the router.
	pub fn path_param<T: FromStr>(&self, name: &str) -> Result<T> {
		let raw = self
			.path_params
			.get(name)
			.ok_or_else(|| Error::Internal(format!("Route has no '{}' parameter", name)))?;
		let decoded = percent_decode_str(raw).decode_utf8_lossy();
		decoded
			.parse::<T>()
			.map_err(|_| Error::BadRequest(format!("Invalid path parameter '{}': {}", name, decoded)))
	}

	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	pub fn authorization(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
	}

	/// Deserializes the JSON body.
	pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
		if self.body.is_empty() {
			return Err(Error::BadRequest("Request body is empty".to_string()));
		}
		Ok(serde_json::from_slice(&self.body)?)
	}
}

/// Builder for [`Request`], used by the server and by tests.
#[derive(Debug, Default)]
pub struct RequestBuilder {
	method: Method,
	uri: Option<String>,
	version: Version,
	headers: HeaderMap,
	body: Bytes,
	remote_addr: Option<SocketAddr>,
}

impl RequestBuilder {
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;
		self
	}

	pub fn uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = Some(uri.into());
		self
	}

	pub fn version(mut self, version: Version) -> Self {
		self.version = version;
		self
	}

	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;
		self
	}

	/// Adds one header; invalid names or values are ignored.
	pub fn header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
			self.headers.insert(name, value);
		}
		self
	}

	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Serializes `value` as the body and sets the JSON content type.
	pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
		match serde_json::to_vec(value) {
			Ok(body) => {
				self.body = Bytes::from(body);
				self.headers.insert(
					hyper::header::CONTENT_TYPE,
					HeaderValue::from_static("application/json"),
				);
			}
			Err(error) => tracing::warn!(%error, "request body could not be serialized"),
		}
		self
	}

	pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
		self.remote_addr = Some(addr);
		self
	}

	pub fn build(self) -> Result<Request> {
		let uri: Uri = self
			.uri
			.as_deref()
			.unwrap_or("/")
			.parse()
			.map_err(|e| Error::BadRequest(format!("Invalid URI: {}", e)))?;
		let query_params = Request::parse_query_params(&uri);
		Ok(Request {
			method: self.method,
			uri,
			version: self.version,
			headers: self.headers,
			body: self.body,
			path_params: HashMap::new(),
			query_params,
			remote_addr: self.remote_addr,
			extensions: Extensions::new(),
		})
	}
}
