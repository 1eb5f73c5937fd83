use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Create the PostgreSQL pool backing the subscription collaborator.
///
/// `max_connections` comes from `AppConfig::db_max_connections` (default 20).
/// The expiration scanner only issues short statements, so one idle
/// connection is kept warm between scans.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to subscription database: {e}"))?;

    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}
