//! SubRelay service binary entrypoint.
//!
//! Runs the HTTP producer endpoint, the queue worker and the expiration
//! scanner in one process.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use subrelay_common::config::AppConfig;
use subrelay_common::db::create_pool;
use subrelay_common::redis_pool::create_redis_pool;
use subrelay_notifier::HttpDeliveryClient;
use subrelay_queue::{
    Enqueuer, JobQueue, JobStore, QueueWorker, RedisJobQueue, RedisJobStore, WorkerSettings,
};
use subrelay_scheduler::{ExpirationScanner, IntervalTicker, PgSubscriptionRepository};

use subrelay_api::routes::create_router;
use subrelay_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "subrelay_api=info,subrelay_queue=info,subrelay_scheduler=info,subrelay_notifier=info,tower_http=info",
            )
        }))
        .json()
        .init();

    tracing::info!("Starting SubRelay service...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database pool created, migrations applied");

    // Create Redis connection
    let redis = create_redis_pool(&config.redis_url).await?;
    tracing::info!("Redis connection established");

    let jobs: Arc<dyn JobStore> = Arc::new(RedisJobStore::new(
        redis.clone(),
        config.job_key_prefix.clone(),
    ));
    let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(redis, config.queue_name.clone()));

    let delivery_timeout = Duration::from_millis(config.delivery_timeout_ms);
    let delivery = Arc::new(HttpDeliveryClient::new(
        config.delivery_url.clone(),
        delivery_timeout,
    )?);
    tracing::info!(endpoint = delivery.endpoint(), "Delivery client ready");

    let worker = QueueWorker::new(
        jobs.clone(),
        queue,
        delivery,
        WorkerSettings {
            pace: Duration::from_millis(config.worker_pace_ms),
            delivery_timeout,
            ..WorkerSettings::default()
        },
    );

    // Settle jobs a previous run left hanging; recovery then wakes the worker
    // to drain whatever is queued.
    let grace = i64::try_from(config.orphan_grace_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| anyhow::anyhow!("ORPHAN_GRACE_SECS is out of range"))?;
    worker.recover_orphans(grace).await?;

    let enqueuer = Enqueuer::new(worker);

    // Expiration scanner: once now, then every interval
    let scanner = ExpirationScanner::new(
        Arc::new(PgSubscriptionRepository::new(pool)),
        enqueuer.clone(),
    );
    let scan_period = Duration::from_secs(config.scan_interval_secs);
    let scanner_task = tokio::spawn(async move {
        scanner.run(IntervalTicker::new(scan_period)).await;
    });
    tracing::info!(
        interval_secs = config.scan_interval_secs,
        "Expiration scanner scheduled"
    );

    // Build router
    let state = AppState::new(enqueuer, jobs);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    scanner_task.abort();
    tracing::info!("SubRelay service stopped.");
    Ok(())
}
