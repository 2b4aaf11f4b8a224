// backend/src/routes/health.rs

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResp {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the database");
            "down"
        }
    };
    Json(HealthResp { status: "ok", version: env!("CARGO_PKG_VERSION"), database })
}
