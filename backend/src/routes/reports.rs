// backend/src/routes/reports.rs

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use super::{ApiError, ApiResult, AuthCaller};
use crate::report::export;
use crate::report::filters::raw_from_pairs;
use crate::report::{GeneralReport, IndividualReport};
use crate::AppState;

type Pairs = Query<Vec<(String, String)>>;

/// GET /api/v1/reports/individual?agent=7&date_from=…&date_to=…
pub async fn individual(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Query(pairs): Pairs,
) -> ApiResult<IndividualReport> {
    let raw = raw_from_pairs(pairs);
    Ok(Json(state.reports.individual(&raw, &caller).await?))
}

/// GET /api/v1/reports/general?area=3&date_from=…&date_to=…&include_leaves=1
pub async fn general(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Query(pairs): Pairs,
) -> ApiResult<GeneralReport> {
    let raw = raw_from_pairs(pairs);
    Ok(Json(state.reports.general(&raw, &caller).await?))
}

fn csv_response(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
}

pub async fn individual_csv(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Query(pairs): Pairs,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.reports.individual(&raw_from_pairs(pairs), &caller).await?;
    let body = export::individual_csv(&report)?;
    Ok(csv_response(&format!("individual-{}.csv", report.agent.id), body))
}

pub async fn general_csv(
    State(state): State<AppState>,
    AuthCaller(caller): AuthCaller,
    Query(pairs): Pairs,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.reports.general(&raw_from_pairs(pairs), &caller).await?;
    let body = export::general_csv(&report)?;
    Ok(csv_response("general.csv", body))
}
