//! Durable notification job queue.
//!
//! Producers call the [`Enqueuer`], which writes a [`JobRecord`] to the
//! [`JobStore`], appends its id to the [`JobQueue`] and wakes the
//! [`QueueWorker`]. The worker drains the queue one job at a time and drives
//! each record through its delivery state machine.

pub mod enqueuer;
pub mod error;
pub mod fifo;
pub mod job;
pub mod store;
pub mod worker;

pub use enqueuer::Enqueuer;
pub use error::QueueError;
pub use fifo::{JobQueue, MemoryJobQueue, RedisJobQueue};
pub use job::{AttemptOutcome, JobId, JobRecord, JobState, MAX_ATTEMPTS};
pub use store::{JobStore, MemoryJobStore, RedisJobStore};
pub use worker::{QueueWorker, RecoveryReport, WorkerSettings};
