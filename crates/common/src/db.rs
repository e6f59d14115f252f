use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connect the shared PostgreSQL pool backing the send log, preference
/// reads, and the processors' candidate queries.
///
/// The acquire timeout is short: a processor that cannot get a connection
/// fails its run and retries from current state on the next tick instead of
/// queueing behind a saturated pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "PostgreSQL pool ready");
    Ok(pool)
}
