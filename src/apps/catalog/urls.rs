//! URL configuration for the catalog app.

use cantina_http::Router;

use super::views;
use crate::extract::view;
use crate::state::AppState;

pub fn url_patterns(state: &AppState) -> Router {
	Router::new()
		.get("/categories", view(state, views::list_categories))
		.post("/categories", view(state, views::create_category))
		.get("/products", view(state, views::list_products))
		.post("/products", view(state, views::create_product))
		.get("/products/barcode/{barcode}", view(state, views::product_by_barcode))
		.get("/products/{id}", view(state, views::get_product))
		.put("/products/{id}", view(state, views::update_product))
		.post("/products/{id}/price", view(state, views::change_price))
		.get("/products/{id}/price-history", view(state, views::price_history))
		.post("/products/{id}/stock", view(state, views::adjust_stock))
		.get("/stock/movements", view(state, views::stock_movements))
		.get("/stock/low", view(state, views::low_stock))
}
