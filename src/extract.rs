//! Helpers shared by the views: state injection, the caller's principal and
//! validated JSON bodies.

use std::future::Future;
use std::sync::Arc;

use cantina_auth::Principal;
use cantina_core::enums::Role;
use cantina_core::lunch::YearMonth;
use cantina_core::{Error, Result};
use cantina_http::{Handler, Request, Response, handler_fn};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::state::AppState;

/// Binds a view function to the application state.
pub fn view<F, Fut>(state: &AppState, f: F) -> Arc<dyn Handler>
where
	F: Fn(AppState, Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Response>> + Send + 'static,
{
	let state = state.clone();
	handler_fn(move |request| f(state.clone(), request))
}

/// The principal the authentication middleware attached to the request.
pub fn principal(request: &Request) -> Result<Principal> {
	request
		.extensions
		.get::<Principal>()
		.ok_or_else(|| Error::Authentication("Authentication credentials were not provided".to_string()))
}

/// Id of the calling employee, who must hold at least `role`.
pub fn employee(request: &Request, role: Role) -> Result<i64> {
	principal(request)?.require_role(role)
}

/// `(portal_user_id, customer_id)` of the calling guardian.
pub fn guardian(request: &Request) -> Result<(i64, i64)> {
	principal(request)?.require_guardian()
}

/// Deserializes the body and runs its `validator` rules.
pub fn validated<T: DeserializeOwned + Validate>(request: &Request) -> Result<T> {
	let data: T = request.json()?;
	data.validate().map_err(validation_error)?;
	Ok(data)
}

/// Joins every field error into one message, sorted by field.
pub fn validation_error(errors: ValidationErrors) -> Error {
	let mut messages: Vec<String> = errors
		.field_errors()
		.iter()
		.flat_map(|(field, errors)| {
			errors.iter().map(move |error| match &error.message {
				Some(message) => format!("{}: {}", field, message),
				None => format!("{}: invalid value ({})", field, error.code),
			})
		})
		.collect();
	messages.sort();
	Error::Validation(messages.join("; "))
}

/// `?from=` and `?to=` dates; both default to `today`.
pub fn date_range(request: &Request, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
	let from = request.query::<NaiveDate>("from")?.unwrap_or(today);
	let to = request.query::<NaiveDate>("to")?.unwrap_or(today);
	if from > to {
		return Err(Error::Validation(format!("'from' ({}) is after 'to' ({})", from, to)));
	}
	Ok((from, to))
}

/// `?month=YYYY-MM`.
pub fn month(request: &Request) -> Result<Option<YearMonth>> {
	request
		.query_value("month")
		.filter(|raw| !raw.trim().is_empty())
		.map(|raw| YearMonth::parse(&raw))
		.transpose()
}
