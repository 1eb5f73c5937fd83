use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string (subscription records)
    pub database_url: String,

    /// Redis connection string (job store and queue)
    pub redis_url: String,

    /// Notification delivery endpoint
    pub delivery_url: String,

    /// Per-attempt delivery timeout in milliseconds (default: 10000)
    pub delivery_timeout_ms: u64,

    /// Pause between two queue pops in milliseconds (default: 100)
    pub worker_pace_ms: u64,

    /// Expiration scan period in seconds (default: 30)
    pub scan_interval_secs: u64,

    /// Age after which an `in_progress` job is considered abandoned (default: 300)
    pub orphan_grace_secs: u64,

    /// Redis list holding queued job ids
    pub queue_name: String,

    /// Prefix of the Redis keys holding job records
    pub job_key_prefix: String,

    /// HTTP listen port
    pub api_port: u16,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            delivery_url: std::env::var("DELIVERY_URL")
                .map_err(|_| anyhow::anyhow!("DELIVERY_URL environment variable is required"))?,
            delivery_timeout_ms: std::env::var("DELIVERY_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DELIVERY_TIMEOUT_MS must be a valid u64"))?,
            worker_pace_ms: std::env::var("WORKER_PACE_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_PACE_MS must be a valid u64"))?,
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCAN_INTERVAL_SECS must be a valid u64"))?,
            orphan_grace_secs: std::env::var("ORPHAN_GRACE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ORPHAN_GRACE_SECS must be a valid u64"))?,
            queue_name: std::env::var("QUEUE_NAME").unwrap_or_else(|_| "email_queue".to_string()),
            job_key_prefix: std::env::var("JOB_KEY_PREFIX").unwrap_or_else(|_| "job".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}
