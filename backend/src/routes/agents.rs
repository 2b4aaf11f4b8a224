// backend/src/routes/agents.rs

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveTime;
use serde::Deserialize;
use sqlx::{query_as, FromRow};

use super::{require_admin, ApiResult, AuthCaller};
use crate::error::CoreError;
use crate::events::AuditEvent;
use crate::models::identity::validate_identity;
use crate::models::Agent;
use crate::scope::{ensure_forest, AreaTree};
use crate::AppState;

const AGENT_COLUMNS: &str = "id, apellido, nombre, dni, cuil, legajo, area_id, supervisor_id, active, \
                             default_entry, default_exit";

#[derive(Deserialize)]
pub struct ListAgentsQ {
    pub area_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateAgentBody {
    pub apellido: String,
    pub nombre: String,
    pub dni: Option<String>,
    pub cuil: Option<String>,
    pub legajo: Option<String>,
    pub area_id: Option<i64>,
    pub supervisor_id: Option<i64>,
    pub default_entry: Option<NaiveTime>,
    pub default_exit: Option<NaiveTime>,
}

#[derive(Deserialize)]
pub struct PatchAgentBody {
    pub area_id: Option<i64>,
    pub supervisor_id: Option<i64>,
    pub legajo: Option<String>,
    pub active: Option<bool>,
}

#[derive(FromRow)]
struct SupervisorEdge {
    id: i64,
    supervisor_id: Option<i64>,
}

pub async fn list_agents(State(state): State<AppState>, Query(q): Query<ListAgentsQ>) -> ApiResult<Vec<Agent>> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let offset = q.offset.unwrap_or(0).max(0);

    let rows = query_as::<_, Agent>(&format!(
        "SELECT {AGENT_COLUMNS} FROM public.agents
          WHERE ($1::bigint IS NULL OR area_id = $1)
          ORDER BY apellido, nombre, id
          LIMIT $2 OFFSET $3"
    ))
    .bind(q.area_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

async fn ensure_area(state: &AppState, area_id: Option<i64>) -> Result<(), CoreError> {
    if let Some(area) = area_id {
        let tree = AreaTree::build(&state.store.list_areas().await?)?;
        if !tree.is_active(area) {
            return Err(CoreError::not_found(format!("area {area} not found or inactive")));
        }
    }
    Ok(())
}

/// Current supervisor pointers with `id → supervisor` applied on top.
async fn ensure_supervisor_forest(state: &AppState, id: i64, supervisor: Option<i64>) -> Result<(), CoreError> {
    let edges = query_as::<_, SupervisorEdge>(r#"SELECT id, supervisor_id FROM public.agents"#)
        .fetch_all(&state.pool)
        .await?;
    let mut parents: HashMap<i64, Option<i64>> = edges.into_iter().map(|e| (e.id, e.supervisor_id)).collect();
    if let Some(s) = supervisor {
        if !parents.contains_key(&s) {
            return Err(CoreError::not_found(format!("supervisor {s} not found")));
        }
    }
    parents.insert(id, supervisor);
    ensure_forest(&parents, "supervisor")
}

/// POST /api/v1/agents
pub async fn create_agent(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Json(b): Json<CreateAgentBody>,
) -> ApiResult<Agent> {
    require_admin(&caller)?;
    if b.apellido.trim().is_empty() || b.nombre.trim().is_empty() {
        return Err(CoreError::invalid_filter("apellido and nombre are required").into());
    }
    validate_identity(b.dni.as_deref(), b.cuil.as_deref())?;
    ensure_area(&state, b.area_id).await?;
    if let Some(s) = b.supervisor_id {
        // A new agent is a leaf; only existence matters.
        if state.store.get_agent(s).await?.is_none() {
            return Err(CoreError::not_found(format!("supervisor {s} not found")).into());
        }
    }

    let row = query_as::<_, Agent>(&format!(
        "INSERT INTO public.agents
            (apellido, nombre, dni, cuil, legajo, area_id, supervisor_id, active, default_entry, default_exit)
         VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $9)
         RETURNING {AGENT_COLUMNS}"
    ))
    .bind(b.apellido.trim())
    .bind(b.nombre.trim())
    .bind(b.dni)
    .bind(b.cuil)
    .bind(b.legajo)
    .bind(b.area_id)
    .bind(b.supervisor_id)
    .bind(b.default_entry)
    .bind(b.default_exit)
    .fetch_one(&state.pool)
    .await?;

    AuditEvent::new("create", "agent", caller.id())
        .entity_id(row.id)
        .after(serde_json::to_value(&row).unwrap_or_default())
        .emit();
    Ok(Json(row))
}

/// PATCH /api/v1/agents/:id
pub async fn patch_agent(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<i64>,
    Json(b): Json<PatchAgentBody>,
) -> ApiResult<Agent> {
    require_admin(&caller)?;
    let before = state
        .store
        .get_agent(id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("agent {id} not found")))?;
    ensure_area(&state, b.area_id).await?;
    if b.supervisor_id.is_some() {
        ensure_supervisor_forest(&state, id, b.supervisor_id).await?;
    }

    let row = query_as::<_, Agent>(&format!(
        "UPDATE public.agents SET
            area_id       = COALESCE($2, area_id),
            supervisor_id = COALESCE($3, supervisor_id),
            legajo        = COALESCE($4, legajo),
            active        = COALESCE($5, active)
          WHERE id = $1
          RETURNING {AGENT_COLUMNS}"
    ))
    .bind(id)
    .bind(b.area_id)
    .bind(b.supervisor_id)
    .bind(b.legajo)
    .bind(b.active)
    .fetch_one(&state.pool)
    .await?;

    AuditEvent::new("update", "agent", caller.id())
        .entity_id(id)
        .before(serde_json::to_value(&before).unwrap_or_default())
        .after(serde_json::to_value(&row).unwrap_or_default())
        .emit();
    Ok(Json(row))
}
