// backend/src/main.rs

use std::env;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use giga_backend::{config::CoreConfig, context::CoreContext, db, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("giga_backend=info,tower_http=info")),
        )
        .init();

    let config = CoreConfig::from_env()?;
    tracing::info!(?config, "core configuration loaded");

    let pool = db::connect().await?;
    let state = AppState::new(pool, CoreContext::new(config));

    // Very permissive CORS for local dev (tighten for prod)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // health
        .route("/health", get(routes::health::health))
        // areas & agents
        .route(
            "/api/v1/areas",
            post(routes::areas::create_area).get(routes::areas::list_areas),
        )
        .route(
            "/api/v1/agents",
            post(routes::agents::create_agent).get(routes::agents::list_agents),
        )
        .route("/api/v1/agents/:id", patch(routes::agents::patch_agent))
        // reports
        .route("/api/v1/reports/individual", get(routes::reports::individual))
        .route("/api/v1/reports/general", get(routes::reports::general))
        .route("/api/v1/reports/individual.csv", get(routes::reports::individual_csv))
        .route("/api/v1/reports/general.csv", get(routes::reports::general_csv))
        // planner
        .route("/api/v1/planner/plan", post(routes::planner::plan))
        // bonus
        .route("/api/v1/bonus/:agent_id/:year/:month", get(routes::bonus::evaluate))
        .route("/api/v1/bonus/generate/:year/:month", post(routes::bonus::generate_month))
        // schedule
        .route("/api/v1/schedule/validate-mark", post(routes::schedule::validate_mark))
        .route("/api/v1/schedule/availability", get(routes::schedule::availability))
        // state & middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let port: u16 = match env::var("PORT") {
        Ok(raw) => raw.trim().parse()?,
        Err(_) => 8080,
    };

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API listening");

    axum::serve(listener, api.into_make_service()).await?;
    Ok(())
}
