//! Single-flight queue worker.
//!
//! At most one drain loop runs per worker. The loop holds the only permit of
//! a semaphore; a wake-up that finds the permit taken does nothing because
//! the running loop will reach the new id anyway. When the loop finds the
//! queue empty it releases the permit, then looks at the queue length once
//! more: an id pushed between the last empty pop and the release would
//! otherwise wait for the next enqueue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use subrelay_notifier::{DeliveryClient, DeliveryError};

use crate::error::QueueError;
use crate::fifo::JobQueue;
use crate::job::{AttemptOutcome, COMPLETED_TTL, JobId, JobState};
use crate::store::JobStore;

/// Reason recorded on jobs whose attempt was cut short by a shutdown.
const ABANDONED_ATTEMPT: &str = "delivery attempt abandoned";

/// Tunables for the drain loop.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Pause after each job before the next pop.
    pub pace: Duration,
    /// Upper bound on one delivery attempt.
    pub delivery_timeout: Duration,
    /// Lifetime of completed records.
    pub completed_ttl: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            pace: Duration::from_millis(100),
            delivery_timeout: Duration::from_secs(10),
            completed_ttl: COMPLETED_TTL,
        }
    }
}

/// Result of the start-up sweep over unfinished jobs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Abandoned attempts sent back to the queue.
    pub requeued: usize,
    /// Queued-state records whose id had gone missing from the queue.
    pub restored: usize,
    /// Abandoned attempts that used up the last try.
    pub failed: usize,
}

/// Drains the job queue and drives each job through delivery.
#[derive(Clone)]
pub struct QueueWorker {
    inner: Arc<WorkerInner>,
}

struct WorkerInner {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    delivery: Arc<dyn DeliveryClient>,
    settings: WorkerSettings,
    flight: Arc<Semaphore>,
}

impl QueueWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        delivery: Arc<dyn DeliveryClient>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                store,
                queue,
                delivery,
                settings,
                flight: Arc::new(Semaphore::new(1)),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.inner.queue
    }

    /// Whether a drain loop currently holds the permit.
    pub fn is_running(&self) -> bool {
        self.inner.flight.available_permits() == 0
    }

    /// Start a drain loop in the background unless one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn wake(&self) -> Option<JoinHandle<usize>> {
        let permit = self.inner.flight.clone().try_acquire_owned().ok()?;
        let worker = self.clone();
        Some(tokio::spawn(async move { worker.drain_with(permit).await }))
    }

    /// Run a drain loop on the current task.
    ///
    /// Returns the number of ids popped, or `None` if another loop is
    /// already draining.
    pub async fn drain(&self) -> Option<usize> {
        let permit = self.inner.flight.clone().try_acquire_owned().ok()?;
        Some(self.drain_with(permit).await)
    }

    async fn drain_with(&self, mut permit: OwnedSemaphorePermit) -> usize {
        let mut processed = 0;

        loop {
            processed += self.drain_queue().await;
            drop(permit);

            match self.inner.queue.len().await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Could not re-check queue length, going idle");
                    break;
                }
            }

            match self.inner.flight.clone().try_acquire_owned() {
                Ok(next) => permit = next,
                // Another loop picked up the late arrivals.
                Err(_) => break,
            }
        }

        tracing::debug!(processed, "Job queue drained, worker idle");
        processed
    }

    async fn drain_queue(&self) -> usize {
        let mut processed = 0;

        loop {
            let id = match self.inner.queue.pop_head().await {
                Ok(Some(id)) => id,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to pop from job queue");
                    break;
                }
            };
            processed += 1;

            if let Err(e) = self.process(&id).await {
                tracing::error!(job_id = %id, error = %e, "Failed to process job");
            }

            if !self.inner.settings.pace.is_zero() {
                tokio::time::sleep(self.inner.settings.pace).await;
            }
        }

        processed
    }

    /// Run one attempt for the job behind `id`.
    async fn process(&self, id: &JobId) -> Result<(), QueueError> {
        let store = &self.inner.store;

        let Some(mut job) = store.get(id).await? else {
            tracing::warn!(job_id = %id, "Job record not found, skipping");
            return Ok(());
        };

        if !job.state.is_runnable() {
            tracing::warn!(job_id = %id, state = %job.state, "Popped job is not runnable, skipping");
            return Ok(());
        }

        job.begin_attempt(Utc::now())?;
        store.put(&job).await?;

        let timeout = self.inner.settings.delivery_timeout;
        let result = match tokio::time::timeout(timeout, self.inner.delivery.deliver(&job.payload)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        };

        match result {
            Ok(()) => {
                job.complete(Utc::now())?;
                store.put(&job).await?;
                store.expire(&job.id, self.inner.settings.completed_ttl).await?;
                tracing::info!(
                    job_id = %job.id,
                    kind = %job.kind(),
                    attempts = job.attempts,
                    "Notification delivered"
                );
            }
            Err(e) => match job.record_failure(&e.to_string(), Utc::now())? {
                AttemptOutcome::Retry => {
                    store.put(&job).await?;
                    self.inner.queue.push_tail(&job.id).await?;
                    tracing::warn!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        max_attempts = job.max_attempts,
                        error = %e,
                        "Delivery failed, job scheduled for retry"
                    );
                }
                AttemptOutcome::Failed => {
                    store.put(&job).await?;
                    tracing::error!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        error = %e,
                        "Job failed permanently"
                    );
                }
            },
        }

        Ok(())
    }

    /// Settle records a previous run left unfinished, then wake the worker.
    ///
    /// Only records whose last write is older than `grace` are touched.
    /// An `in_progress` record belongs to an attempt that never finished,
    /// typically because the process stopped mid-delivery. The abandoned
    /// attempt counts as a failure: jobs with attempts left go back to the
    /// queue, the rest are marked failed. A `pending` or `waiting_retry`
    /// record whose id is missing from the queue lost its push and is queued
    /// again. Waits for any running drain loop to finish first.
    pub async fn recover_orphans(
        &self,
        grace: chrono::Duration,
    ) -> Result<RecoveryReport, QueueError> {
        let report = {
            // The semaphore is never closed, so acquire only fails in theory.
            let _permit = self.inner.flight.acquire().await.ok();
            self.requeue_orphans(grace).await
        };

        // Enqueues made while recovery held the permit could not wake anyone.
        self.wake();
        report
    }

    async fn requeue_orphans(&self, grace: chrono::Duration) -> Result<RecoveryReport, QueueError> {
        let store = &self.inner.store;
        let queue = &self.inner.queue;
        let cutoff = Utc::now() - grace;
        let mut report = RecoveryReport::default();

        for mut job in store.list_unfinished().await? {
            if job.updated_at > cutoff {
                continue;
            }

            match job.state {
                JobState::InProgress => {
                    match job.record_failure(ABANDONED_ATTEMPT, Utc::now())? {
                        AttemptOutcome::Retry => {
                            store.put(&job).await?;
                            queue.push_tail(&job.id).await?;
                            report.requeued += 1;
                        }
                        AttemptOutcome::Failed => {
                            store.put(&job).await?;
                            report.failed += 1;
                        }
                    }
                    tracing::warn!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        state = %job.state,
                        "Recovered abandoned job"
                    );
                }
                JobState::Pending | JobState::WaitingRetry => {
                    if queue.contains(&job.id).await? {
                        continue;
                    }
                    queue.push_tail(&job.id).await?;
                    report.restored += 1;
                    tracing::warn!(
                        job_id = %job.id,
                        state = %job.state,
                        "Re-queued job missing from the queue"
                    );
                }
                JobState::Completed | JobState::Failed => {}
            }
        }

        if report != RecoveryReport::default() {
            tracing::info!(
                requeued = report.requeued,
                restored = report.restored,
                failed = report.failed,
                "Orphaned jobs recovered"
            );
        }
        Ok(report)
    }
}
