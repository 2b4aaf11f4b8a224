// backend/src/routes/bonus.rs

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{require_admin, require_self_or_jefatura, ApiResult, AuthCaller};
use crate::bonus::GenerateSummary;
use crate::AppState;

#[derive(Serialize)]
pub struct BonusResp {
    pub agent_id: i64,
    pub year: i32,
    pub month: u32,
    pub percentage: Decimal,
}

/// GET /api/v1/bonus/:agent_id/:year/:month
///
/// Agents may look up their own bonus; anyone with jefatura authority or
/// above may look up others.
pub async fn evaluate(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Path((agent_id, year, month)): Path<(i64, i32, u32)>,
) -> ApiResult<BonusResp> {
    require_self_or_jefatura(&caller, agent_id)?;
    let percentage = state.bonus.evaluate(agent_id, month, year).await?;
    Ok(Json(BonusResp { agent_id, year, month, percentage }))
}

/// POST /api/v1/bonus/generate/:year/:month
pub async fn generate_month(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Path((year, month)): Path<(i32, u32)>,
) -> ApiResult<GenerateSummary> {
    require_admin(&caller)?;
    Ok(Json(state.bonus.generate_month(month, year).await?))
}
