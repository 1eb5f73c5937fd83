use anyhow::Context;
use redis::aio::ConnectionManager;

/// Connect to the Redis instance holding job records and the job queue.
///
/// The manager reconnects on its own, so one instance is cloned into both the
/// job store and the queue. A `PING` on start-up makes a bad URL fail here
/// instead of on the first enqueue.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(redis_url).context("Invalid REDIS_URL")?;
    let mut manager = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;

    let _: String = redis::cmd("PING")
        .query_async(&mut manager)
        .await
        .context("Redis did not answer PING")?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
