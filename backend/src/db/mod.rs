// backend/src/db/mod.rs

use anyhow::Context;
use sqlx::{Pool, Postgres};
use std::env;

pub async fn connect() -> anyhow::Result<Pool<Postgres>> {
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set (env or .env)")?;
    let max_connections: u32 = match env::var("DB_MAX_CONNECTIONS") {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid DB_MAX_CONNECTIONS='{raw}'"))?,
        Err(_) => 10,
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .context("connecting to PostgreSQL")?;

    tracing::info!(max_connections, "connected to PostgreSQL");
    Ok(pool)
}
