//! Products, prices and stock.

use cantina_core::enums::StockMovementKind;
use cantina_core::fiscal::validate_vat_rate;
use cantina_core::restrictions::{ProductProfile, RestrictionProfile};
use cantina_core::{Error, Guaranies, Result};
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::catalog::{self, NewProduct, PriceChange, Product, ProductChanges, StockMovement};
use cantina_db::repositories::customers::DietaryRestriction;

use crate::state::AppState;

/// How the restriction matcher sees a catalog product.
pub(crate) fn profile(product: &Product) -> ProductProfile {
	ProductProfile {
		id: product.id,
		description: product.description.clone(),
		category_id: Some(product.category_id),
		category: Some(product.category.clone()),
		active: product.active,
		components: Vec::new(),
	}
}

pub(crate) fn restriction_profiles(restrictions: &[DietaryRestriction]) -> Vec<RestrictionProfile> {
	restrictions
		.iter()
		.map(|r| RestrictionProfile {
			kind: r.kind,
			notes: r.notes.clone(),
		})
		.collect()
}

fn check_product_fields(price: Option<Guaranies>, vat_rate: Option<i64>, minimum_stock: Option<i64>) -> Result<()> {
	if price.is_some_and(|p| !p.is_positive()) {
		return Err(Error::Validation("Price must be greater than zero".to_string()));
	}
	if let Some(rate) = vat_rate {
		validate_vat_rate(rate)?;
	}
	if minimum_stock.is_some_and(|m| m < 0) {
		return Err(Error::Validation("Minimum stock cannot be negative".to_string()));
	}
	Ok(())
}

pub async fn create_product(state: &AppState, employee_id: i64, new: &NewProduct) -> Result<Product> {
	check_product_fields(Some(new.price), Some(new.vat_rate), Some(new.minimum_stock))?;
	let mut tx = state.db.begin().await?;
	let product = catalog::insert_product(&mut tx, new).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_PRODUCT",
		"product",
		product.id,
		Some(&product.description),
	)
	.await?;
	tx.commit().await?;
	Ok(product)
}

pub async fn update_product(
	state: &AppState,
	employee_id: i64,
	product_id: i64,
	changes: &ProductChanges,
) -> Result<Product> {
	check_product_fields(None, changes.vat_rate, changes.minimum_stock)?;
	let mut tx = state.db.begin().await?;
	let product = catalog::update_product(&mut tx, product_id, changes).await?;
	audit::record(&mut tx, Actor::Employee(employee_id), "UPDATE_PRODUCT", "product", product.id, None).await?;
	tx.commit().await?;
	Ok(product)
}

pub async fn change_price(
	state: &AppState,
	employee_id: i64,
	product_id: i64,
	new_price: Guaranies,
	reason: Option<&str>,
) -> Result<PriceChange> {
	check_product_fields(Some(new_price), None, None)?;
	let mut tx = state.db.begin().await?;
	let change = catalog::change_price(&mut tx, product_id, new_price, employee_id, reason).await?;
	if change.old_price == change.new_price {
		return Err(Error::BusinessRule(format!("Price is already {}", new_price)));
	}
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CHANGE_PRICE",
		"product",
		product_id,
		Some(&format!("{} -> {}", change.old_price, change.new_price)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(product_id, old = %change.old_price, new = %change.new_price, "price changed");
	Ok(change)
}

/// Corrects the stock by a signed delta after a physical count.
pub async fn adjust_stock(
	state: &AppState,
	employee_id: i64,
	product_id: i64,
	delta: i64,
	reason: &str,
) -> Result<StockMovement> {
	if delta == 0 {
		return Err(Error::Validation("Adjustment cannot be zero".to_string()));
	}
	let reason = reason.trim();
	if reason.is_empty() {
		return Err(Error::Validation("A reason is required for stock adjustments".to_string()));
	}
	let mut tx = state.db.begin().await?;
	let product = catalog::get_product(&mut tx, product_id).await?;
	if !product.allows_negative_stock && product.stock + delta < 0 {
		return Err(Error::BusinessRule(format!(
			"Adjustment would leave '{}' with negative stock ({})",
			product.description,
			product.stock + delta
		)));
	}
	let movement = catalog::move_stock(
		&mut tx,
		product_id,
		StockMovementKind::Adjustment,
		delta,
		Some(reason),
		Some(employee_id),
	)
	.await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"ADJUST_STOCK",
		"product",
		product_id,
		Some(&format!("{:+} ({})", delta, reason)),
	)
	.await?;
	tx.commit().await?;

	tracing::info!(product_id, delta, stock = movement.resulting_stock, "stock adjusted");
	Ok(movement)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::services::testing::{TestEnv, env};
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_adjustment_records_resulting_stock(#[future] env: TestEnv) {
		let env = env.await;
		let movement = adjust_stock(&env.state, env.manager_id, env.juice_id, -3, "Botellas rotas")
			.await
			.unwrap();

		assert_eq!(movement.kind, StockMovementKind::Adjustment);
		assert_eq!(movement.resulting_stock, 7);
		assert_eq!(env.stock(env.juice_id).await, 7);
	}

	#[rstest]
	#[tokio::test]
	async fn test_adjustment_cannot_go_negative(#[future] env: TestEnv) {
		let env = env.await;
		let error = adjust_stock(&env.state, env.manager_id, env.juice_id, -11, "Inventario")
			.await
			.unwrap_err();
		assert_eq!(error.status_code(), 422);
		assert_eq!(env.stock(env.juice_id).await, 10);
	}

	#[rstest]
	#[tokio::test]
	async fn test_price_change_keeps_history(#[future] env: TestEnv) {
		let env = env.await;
		change_price(&env.state, env.manager_id, env.juice_id, Guaranies(6_000), Some("Proveedor"))
			.await
			.unwrap();

		let mut conn = env.state.db.pool().acquire().await.unwrap();
		let history = catalog::price_history(&mut conn, env.juice_id).await.unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].old_price, Guaranies(5_000));
		assert_eq!(history[0].new_price, Guaranies(6_000));
	}

	#[rstest]
	#[case(Some(Guaranies(0)), None, None)]
	#[case(None, Some(7), None)]
	#[case(None, None, Some(-1))]
	fn test_product_field_checks(
		#[case] price: Option<Guaranies>,
		#[case] vat_rate: Option<i64>,
		#[case] minimum_stock: Option<i64>,
	) {
		assert!(check_product_fields(price, vat_rate, minimum_stock).is_err());
	}
}
