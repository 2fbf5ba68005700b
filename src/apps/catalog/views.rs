//! Catalog views.

use cantina_core::enums::Role;
use cantina_core::{Error, Result};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::catalog::{self, ProductFilter};
use cantina_http::{Request, Response};

use super::serializers::{
	CategoryRequest, PriceChangeRequest, ProductRequest, ProductUpdateRequest, StockAdjustmentRequest,
};
use crate::extract::{employee, validated};
use crate::services::catalog as service;
use crate::state::AppState;

const DEFAULT_MOVEMENT_LIMIT: i64 = 100;

/// GET /api/catalog/categories
pub async fn list_categories(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&catalog::list_categories(&mut conn).await?)
}

/// POST /api/catalog/categories
pub async fn create_category(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data: CategoryRequest = validated(&request)?;
	let mut tx = state.db.begin().await?;
	let category = catalog::insert_category(&mut tx, data.name.trim(), data.parent_id).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_CATEGORY",
		"category",
		category.id,
		Some(&category.name),
	)
	.await?;
	tx.commit().await?;
	Response::created_json(&category)
}

/// GET /api/catalog/products?search=&category_id=&active_only=
pub async fn list_products(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let filter = ProductFilter {
		search: request.query_value("search"),
		category_id: request.query("category_id")?,
		active_only: request.query::<bool>("active_only")?.unwrap_or(false),
	};
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&catalog::list_products(&mut conn, &filter).await?)
}

/// Create a product
///
/// POST /api/catalog/products
/// Success response: 201 Created with the product
/// Error responses:
/// - 400 Bad Request: Non-positive price, VAT rate other than 0/5/10
/// - 409 Conflict: Barcode already in use
pub async fn create_product(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data: ProductRequest = validated(&request)?;
	let product = service::create_product(&state, employee_id, &data.into()).await?;
	Response::created_json(&product)
}

/// GET /api/catalog/products/{id}
pub async fn get_product(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&catalog::get_product(&mut conn, id).await?)
}

/// GET /api/catalog/products/barcode/{barcode}
pub async fn product_by_barcode(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let barcode: String = request.path_param("barcode")?;
	let mut conn = state.db.pool().acquire().await?;
	let product = catalog::find_product_by_barcode(&mut conn, &barcode)
		.await?
		.ok_or_else(|| Error::NotFound(format!("No product with barcode {}", barcode)))?;
	Response::json(&product)
}

/// PUT /api/catalog/products/{id}
pub async fn update_product(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data: ProductUpdateRequest = validated(&request)?;
	Response::json(&service::update_product(&state, employee_id, id, &data.into()).await?)
}

/// POST /api/catalog/products/{id}/price
pub async fn change_price(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data: PriceChangeRequest = validated(&request)?;
	let change = service::change_price(&state, employee_id, id, data.price, data.reason.as_deref()).await?;
	Response::created_json(&change)
}

/// GET /api/catalog/products/{id}/price-history
pub async fn price_history(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	catalog::get_product(&mut conn, id).await?;
	Response::json(&catalog::price_history(&mut conn, id).await?)
}

/// POST /api/catalog/products/{id}/stock
pub async fn adjust_stock(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data: StockAdjustmentRequest = validated(&request)?;
	let movement = service::adjust_stock(&state, employee_id, id, data.delta, &data.reason).await?;
	Response::created_json(&movement)
}

/// GET /api/catalog/stock/movements?product_id=&limit=
pub async fn stock_movements(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let product_id = request.query::<i64>("product_id")?;
	let limit = request.query::<i64>("limit")?.unwrap_or(DEFAULT_MOVEMENT_LIMIT).clamp(1, 1000);
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&catalog::list_movements(&mut conn, product_id, limit).await?)
}

/// Products at or below their minimum stock.
///
/// GET /api/catalog/stock/low
pub async fn low_stock(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&catalog::low_stock(&mut conn).await?)
}
