// backend/src/routes/planner.rs

use axum::{extract::State, Json};

use super::{ApiResult, AuthCaller};
use crate::planner::{PlanOutcome, PlanPayload};
use crate::AppState;

/// POST /api/v1/planner/plan
pub async fn plan(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Json(payload): Json<PlanPayload>,
) -> ApiResult<PlanOutcome> {
    Ok(Json(state.planner.plan(&payload, &caller).await?))
}
