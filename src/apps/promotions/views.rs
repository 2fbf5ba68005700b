//! Promotion views.

use cantina_core::Result;
use cantina_core::enums::Role;
use cantina_db::repositories::audit::{self, Actor};
use cantina_db::repositories::promotions;
use cantina_http::{Request, Response};

use super::serializers::PromotionRequest;
use crate::extract::{employee, validated};
use crate::state::AppState;

/// GET /api/promotions?active_only=
pub async fn list_promotions(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let active_only = request.query::<bool>("active_only")?.unwrap_or(false);
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&promotions::list_promotions(&mut conn, active_only).await?)
}

/// POST /api/promotions
pub async fn create_promotion(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let data = validated::<PromotionRequest>(&request)?.into_data()?;
	let mut tx = state.db.begin().await?;
	let promotion = promotions::insert_promotion(&mut tx, &data).await?;
	audit::record(
		&mut tx,
		Actor::Employee(employee_id),
		"CREATE_PROMOTION",
		"promotion",
		promotion.id,
		Some(&promotion.name),
	)
	.await?;
	tx.commit().await?;
	tracing::info!(promotion_id = promotion.id, kind = %promotion.kind, "promotion created");
	Response::created_json(&promotion)
}

/// GET /api/promotions/{id}
pub async fn get_promotion(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Cashier)?;
	let id: i64 = request.path_param("id")?;
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&promotions::get_promotion(&mut conn, id).await?)
}

/// PUT /api/promotions/{id}
pub async fn update_promotion(state: AppState, request: Request) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let data = validated::<PromotionRequest>(&request)?.into_data()?;
	let mut tx = state.db.begin().await?;
	let promotion = promotions::update_promotion(&mut tx, id, &data).await?;
	audit::record(&mut tx, Actor::Employee(employee_id), "UPDATE_PROMOTION", "promotion", id, None).await?;
	tx.commit().await?;
	Response::json(&promotion)
}

async fn set_active(state: AppState, request: Request, active: bool) -> Result<Response> {
	let employee_id = employee(&request, Role::Manager)?;
	let id: i64 = request.path_param("id")?;
	let mut tx = state.db.begin().await?;
	let promotion = promotions::set_promotion_active(&mut tx, id, active).await?;
	let action = if active { "ACTIVATE_PROMOTION" } else { "DEACTIVATE_PROMOTION" };
	audit::record(&mut tx, Actor::Employee(employee_id), action, "promotion", id, None).await?;
	tx.commit().await?;
	Response::json(&promotion)
}

/// POST /api/promotions/{id}/activate
pub async fn activate(state: AppState, request: Request) -> Result<Response> {
	set_active(state, request, true).await
}

/// POST /api/promotions/{id}/deactivate
pub async fn deactivate(state: AppState, request: Request) -> Result<Response> {
	set_active(state, request, false).await
}
