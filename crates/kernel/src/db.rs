//! PostgreSQL pool setup for the `tabula` binary.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::Config;

/// Connect a pool sized by the configuration.
///
/// Waiting for a free connection is bounded by the statement timeout, so a
/// saturated pool fails a request instead of stalling it.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.statement_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    info!(
        max_connections = config.database_max_connections,
        "database pool ready"
    );
    Ok(pool)
}

/// Fail unless the database answers a trivial query.
pub async fn ensure_responsive(pool: &PgPool) -> Result<()> {
    let one: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(pool)
        .await
        .context("database is not responding")?;
    anyhow::ensure!(one == 1, "database returned {one} for SELECT 1");
    Ok(())
}
