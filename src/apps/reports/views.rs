use cantina_core::Result;
use cantina_core::enums::Role;
use cantina_core::lunch::YearMonth;
use cantina_db::repositories::{authorizations, cash, reports};
use cantina_http::{Request, Response};
use chrono::{Datelike, NaiveDate};
use serde_json::json;

use crate::extract::{date_range, employee, month};
use crate::state::AppState;

const DEFAULT_TOP: i64 = 10;

/// GET /api/reports/daily?date=
pub async fn daily(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let day = request.query::<NaiveDate>("date")?.unwrap_or_else(|| state.today());
	let mut conn = state.db.pool().acquire().await?;
	let summary = reports::daily_sales(&mut conn, day).await?;
	let by_method = reports::sales_by_method(&mut conn, day, day).await?;
	Response::json(&json!({
		"date": day,
		"summary": summary,
		"by_method": by_method,
	}))
}

/// GET /api/reports/sales-by-method?from=&to=
pub async fn sales_by_method(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let (from, to) = date_range(&request, state.today())?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&reports::sales_by_method(&mut conn, from, to).await?)
}

/// GET /api/reports/top-products?from=&to=&limit=
pub async fn top_products(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let (from, to) = date_range(&request, state.today())?;
	let limit = request.query::<i64>("limit")?.unwrap_or(DEFAULT_TOP).clamp(1, 100);
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&reports::top_products(&mut conn, from, to, limit).await?)
}

/// GET /api/reports/negative-cards
pub async fn negative_cards(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&reports::negative_cards(&mut conn).await?)
}

/// GET /api/reports/authorizations?from=&to=&unsettled_only=
pub async fn negative_authorizations(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let (from, to) = date_range(&request, state.today())?;
	let unsettled_only = request.query::<bool>("unsettled_only")?.unwrap_or(false);
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&authorizations::list_in_range(&mut conn, from, to, unsettled_only).await?)
}

/// GET /api/reports/commissions?from=&to=
pub async fn commissions(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let (from, to) = date_range(&request, state.today())?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&reports::commissions_by_method(&mut conn, from, to).await?)
}

/// GET /api/reports/lunch?month=
///
/// Defaults to the current month.
pub async fn lunch(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let month = match month(&request)? {
		Some(month) => month,
		None => {
			let today = state.today();
			YearMonth::new(today.year(), today.month())?
		}
	};
	let mut conn = state.db.pool().acquire().await?;
	let consumption = reports::lunch_consumption(&mut conn, month.first_day(), month.next_first_day()).await?;
	Response::json(&json!({
		"month": month.to_string(),
		"label": month.label(),
		"lunch_types": consumption,
	}))
}

/// GET /api/reports/cash-sessions?from=&to=
pub async fn cash_sessions(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Manager)?;
	let (from, to) = date_range(&request, state.today())?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&cash::list_sessions(&mut conn, from, to).await?)
}
