// backend/src/routes/schedule.rs

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::Deserialize;

use super::{require_self_or_jefatura, ApiResult, AuthCaller};
use crate::report::filters::parse_iso_date;
use crate::schedule::{Availability, MarkKind, MarkValidation};
use crate::AppState;

#[derive(Deserialize)]
pub struct ValidateMarkBody {
    pub agent_id: i64,
    pub timestamp: NaiveDateTime,
    pub kind: MarkKind,
}

#[derive(Deserialize)]
pub struct AvailabilityQ {
    pub agent_id: i64,
    pub date: String,
}

/// POST /api/v1/schedule/validate-mark
pub async fn validate_mark(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Json(b): Json<ValidateMarkBody>,
) -> ApiResult<MarkValidation> {
    require_self_or_jefatura(&caller, b.agent_id)?;
    Ok(Json(state.schedule.validate_mark(b.agent_id, b.timestamp, b.kind).await?))
}

/// GET /api/v1/schedule/availability?agent_id=7&date=2025-02-11
pub async fn availability(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Query(q): Query<AvailabilityQ>,
) -> ApiResult<Availability> {
    require_self_or_jefatura(&caller, q.agent_id)?;
    let date = parse_iso_date(&q.date)?;
    Ok(Json(state.schedule.check_availability(q.agent_id, date).await?))
}
