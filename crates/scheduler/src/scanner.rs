//! Expiration scan: lapsed subscriptions become EXPIRED and their owners get
//! a notice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use subrelay_queue::Enqueuer;

use crate::subscriptions::SubscriptionRepository;
use crate::ticker::Ticker;

/// Outcome of one scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Subscriptions returned by the lapsed query.
    pub matched: usize,
    /// Subscriptions this scan moved to EXPIRED.
    pub expired: usize,
    /// Expiration notices queued.
    pub enqueued: usize,
    /// Subscriptions that hit an error while being expired or notified.
    pub failed: usize,
}

/// Periodically expires lapsed subscriptions and queues expiration notices.
#[derive(Clone)]
pub struct ExpirationScanner {
    subscriptions: Arc<dyn SubscriptionRepository>,
    enqueuer: Enqueuer,
    in_flight: Arc<Semaphore>,
}

impl ExpirationScanner {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>, enqueuer: Enqueuer) -> Self {
        Self {
            subscriptions,
            enqueuer,
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    /// Scan on every tick until the ticker stops.
    pub async fn run<T: Ticker>(&self, mut ticker: T) {
        tracing::info!("Expiration scanner started");

        while ticker.tick().await {
            tracing::debug!("Running scheduled expiration scan");
            self.run_once().await;
        }

        tracing::info!("Expiration scanner stopped");
    }

    /// Scan against the current time.
    pub async fn run_once(&self) -> Option<ScanReport> {
        self.run_once_at(Utc::now()).await
    }

    /// Scan for subscriptions lapsed before `now`.
    ///
    /// Returns `None` without touching anything if another scan is still
    /// running. Failures never escape: a failed query is logged and reported
    /// as an empty scan, and a failure on one subscription does not stop the
    /// others.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Option<ScanReport> {
        let Ok(_permit) = self.in_flight.try_acquire() else {
            tracing::warn!("Previous expiration scan still running, skipping");
            return None;
        };

        let mut report = ScanReport::default();

        let lapsed = match self.subscriptions.find_active_expired(now).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query lapsed subscriptions");
                return Some(report);
            }
        };
        report.matched = lapsed.len();

        if lapsed.is_empty() {
            tracing::debug!("No expired subscriptions found");
            return Some(report);
        }

        for sub in &lapsed {
            let updated = match self.subscriptions.mark_expired(sub).await {
                Ok(Some(updated)) => updated,
                Ok(None) => {
                    tracing::debug!(
                        subscription_id = %sub.id,
                        "Subscription changed status before it could be expired"
                    );
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        subscription_id = %sub.id,
                        error = %e,
                        "Failed to mark subscription expired"
                    );
                    continue;
                }
            };
            report.expired += 1;

            match self.enqueuer.enqueue(updated.expiration_notice()).await {
                Ok(job_id) => {
                    report.enqueued += 1;
                    tracing::info!(
                        subscription_id = %updated.id,
                        job_id = %job_id,
                        "Subscription expired, notice queued"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        subscription_id = %updated.id,
                        error = %e,
                        "Failed to queue expiration notice"
                    );
                }
            }
        }

        tracing::info!(
            matched = report.matched,
            expired = report.expired,
            enqueued = report.enqueued,
            failed = report.failed,
            "Expiration scan finished"
        );
        Some(report)
    }
}
