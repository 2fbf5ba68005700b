use cantina_core::Result;
use cantina_core::enums::Role;
use cantina_db::repositories::audit::{self, AuditFilter};
use cantina_http::{Request, Response};

use crate::extract::employee;
use crate::state::AppState;

/// GET /api/audit?employee_id=&entity=&limit=
///
/// Newest entries first; `limit` defaults to 100 and is capped at 1000.
pub async fn list_entries(state: AppState, request: Request) -> Result<Response> {
	employee(&request, Role::Administrator)?;
	let filter = AuditFilter {
		employee_id: request.query::<i64>("employee_id")?,
		entity: request.query_value("entity").filter(|e| !e.is_empty()),
		limit: Some(request.query::<i64>("limit")?.unwrap_or(100).clamp(1, 1000)),
	};
	let mut conn = state.db.pool().acquire().await?;
	Response::json(&audit::list(&mut conn, &filter).await?)
}
