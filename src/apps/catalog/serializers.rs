//! Catalog payloads.

use cantina_core::Guaranies;
use cantina_db::repositories::catalog::{NewProduct, ProductChanges};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
	#[validate(length(min = 1, max = 100, message = "is required"))]
	pub name: String,
	pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
	pub category_id: i64,
	#[validate(length(min = 1, max = 50))]
	pub barcode: Option<String>,
	#[validate(length(min = 1, max = 200, message = "is required"))]
	pub description: String,
	pub price: Guaranies,
	pub cost: Option<Guaranies>,
	/// 0, 5 or 10.
	#[serde(default = "default_vat_rate")]
	pub vat_rate: i64,
	#[serde(default)]
	pub minimum_stock: i64,
	#[serde(default)]
	pub allows_negative_stock: bool,
}

fn default_vat_rate() -> i64 {
	10
}

impl From<ProductRequest> for NewProduct {
	fn from(data: ProductRequest) -> Self {
		NewProduct {
			category_id: data.category_id,
			barcode: data.barcode.map(|b| b.trim().to_string()),
			description: data.description.trim().to_string(),
			price: data.price,
			cost: data.cost,
			vat_rate: data.vat_rate,
			minimum_stock: data.minimum_stock,
			allows_negative_stock: data.allows_negative_stock,
		}
	}
}

/// Every field but the price, which changes through its own endpoint.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductUpdateRequest {
	pub category_id: Option<i64>,
	pub barcode: Option<String>,
	#[validate(length(min = 1, max = 200, message = "cannot be empty"))]
	pub description: Option<String>,
	pub cost: Option<Guaranies>,
	pub vat_rate: Option<i64>,
	pub minimum_stock: Option<i64>,
	pub allows_negative_stock: Option<bool>,
	pub active: Option<bool>,
}

impl From<ProductUpdateRequest> for ProductChanges {
	fn from(data: ProductUpdateRequest) -> Self {
		ProductChanges {
			category_id: data.category_id,
			barcode: data.barcode,
			description: data.description,
			cost: data.cost,
			vat_rate: data.vat_rate,
			minimum_stock: data.minimum_stock,
			allows_negative_stock: data.allows_negative_stock,
			active: data.active,
		}
	}
}

#[derive(Debug, Deserialize, Validate)]
pub struct PriceChangeRequest {
	pub price: Guaranies,
	#[validate(length(max = 200))]
	pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StockAdjustmentRequest {
	/// Signed change: positive adds units, negative removes them.
	pub delta: i64,
	#[validate(length(min = 3, max = 200, message = "must explain the adjustment"))]
	pub reason: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_product_defaults() {
		let request: ProductRequest = serde_json::from_value(serde_json::json!({
			"category_id": 1,
			"description": "Empanada de carne",
			"price": 6000,
		}))
		.unwrap();
		let new = NewProduct::from(request);
		assert_eq!(new.vat_rate, 10);
		assert_eq!(new.minimum_stock, 0);
		assert!(!new.allows_negative_stock);
	}

	#[rstest]
	#[case("", false)]
	#[case("Conteo", true)]
	fn test_adjustment_needs_reason(#[case] reason: &str, #[case] valid: bool) {
		let request = StockAdjustmentRequest {
			delta: -2,
			reason: reason.to_string(),
		};
		assert_eq!(request.validate().is_ok(), valid);
	}
}
