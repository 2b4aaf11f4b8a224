// backend/src/routes/areas.rs

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::query_as;

use super::{require_admin, ApiResult, AuthCaller};
use crate::error::CoreError;
use crate::events::AuditEvent;
use crate::models::Area;
use crate::scope::AreaTree;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListAreasQ {
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
pub struct CreateAreaBody {
    pub name: String,
    pub parent_id: Option<i64>,
}

pub async fn list_areas(State(state): State<AppState>, Query(q): Query<ListAreasQ>) -> ApiResult<Vec<Area>> {
    let rows = query_as::<_, Area>(
        r#"SELECT id, name, parent_id, active
             FROM public.areas
            WHERE ($1::bigint IS NULL OR parent_id = $1)
              AND ($2 OR active)
            ORDER BY name, id"#,
    )
    .bind(q.parent_id)
    .bind(q.include_inactive)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

/// POST /api/v1/areas
///
/// The stored hierarchy must already be a forest and the parent must be an
/// active area; a new leaf cannot introduce a cycle.
pub async fn create_area(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Json(b): Json<CreateAreaBody>,
) -> ApiResult<Area> {
    require_admin(&caller)?;
    let name = b.name.trim();
    if name.is_empty() {
        return Err(CoreError::invalid_filter("area name is required").into());
    }
    let tree = AreaTree::build(&state.store.list_areas().await?)?;
    if let Some(parent) = b.parent_id {
        if !tree.is_active(parent) {
            return Err(CoreError::not_found(format!("parent area {parent} not found or inactive")).into());
        }
    }

    let row = query_as::<_, Area>(
        r#"
        INSERT INTO public.areas (name, parent_id, active)
        VALUES ($1, $2, TRUE)
        RETURNING id, name, parent_id, active
        "#,
    )
    .bind(name)
    .bind(b.parent_id)
    .fetch_one(&state.pool)
    .await?;

    AuditEvent::new("create", "area", caller.id())
        .entity_id(row.id)
        .after(serde_json::json!({ "name": &row.name, "parent_id": row.parent_id }))
        .emit();
    Ok(Json(row))
}
