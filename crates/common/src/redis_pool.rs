use redis::Client;
use redis::aio::ConnectionManager;

/// Connect the Redis backend for the dedupe and daily-cap counters.
///
/// `ConnectionManager` reconnects transparently; a dropped connection costs
/// one failed send (mapped to `Failed` by the gatekeeper), never a process
/// restart.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Redis connection manager ready");
    Ok(manager)
}
