//! Producer-facing entry point of the queue.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use subrelay_common::types::{NotificationKind, NotificationPayload};

use crate::error::QueueError;
use crate::fifo::JobQueue;
use crate::job::{JobId, JobRecord};
use crate::store::JobStore;
use crate::worker::QueueWorker;

/// Creates job records and appends them to the queue.
///
/// There is no duplicate suppression: two calls with the same payload make
/// two independent jobs.
#[derive(Clone)]
pub struct Enqueuer {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    worker: Option<QueueWorker>,
}

impl Enqueuer {
    /// Enqueuer that feeds `worker`'s store and queue and wakes it after
    /// every append.
    pub fn new(worker: QueueWorker) -> Self {
        Self {
            store: worker.store().clone(),
            queue: worker.queue().clone(),
            worker: Some(worker),
        }
    }

    /// Enqueuer that only writes; some other process drains the queue.
    pub fn detached(store: Arc<dyn JobStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            store,
            queue,
            worker: None,
        }
    }

    /// Record a notification job and queue it for delivery.
    ///
    /// If the record is written but the push fails, the caller gets the
    /// error and the `pending` record stays behind; orphan recovery queues it
    /// once it is older than the grace period.
    pub async fn enqueue(&self, payload: NotificationPayload) -> Result<JobId, QueueError> {
        let job = JobRecord::new(payload, Utc::now());

        self.store.put(&job).await?;
        self.queue.push_tail(&job.id).await?;

        tracing::info!(job_id = %job.id, kind = %job.kind(), "Notification job queued");

        if let Some(worker) = &self.worker {
            worker.wake();
        }

        Ok(job.id)
    }

    /// Like [`Enqueuer::enqueue`], for producers holding loose JSON fields.
    ///
    /// Fails with [`QueueError::InvalidPayload`] before anything is written
    /// when a field required by `kind` is missing or has the wrong shape.
    pub async fn enqueue_raw(
        &self,
        kind: NotificationKind,
        fields: Value,
    ) -> Result<JobId, QueueError> {
        let payload = NotificationPayload::from_fields(kind, fields)?;
        self.enqueue(payload).await
    }
}
