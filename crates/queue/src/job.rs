//! Job records and the delivery state machine.
//!
//! ```text
//! pending ──► in_progress ──► completed
//!                 │  ▲
//!                 ▼  │
//!            waiting_retry        (attempts < max)
//!                 │
//!                 └─► failed      (attempts == max)
//! ```
//!
//! Every transition goes through a method on [`JobRecord`], which refuses
//! moves the table does not allow. The worker is the only caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use subrelay_common::types::{NotificationKind, NotificationPayload};

use crate::error::QueueError;

/// Delivery attempts a job gets before it is marked failed.
pub const MAX_ATTEMPTS: u32 = 3;

/// How long completed records are kept for inspection (24 hours).
pub const COMPLETED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Opaque job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh id: creation time in milliseconds plus a random suffix.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("email_job_{}_{}", now.timestamp_millis(), &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    WaitingRetry,
    Completed,
    Failed,
}

impl JobState {
    /// `completed` and `failed` never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// States from which a popped job may start an attempt.
    pub fn is_runnable(&self) -> bool {
        matches!(self, JobState::Pending | JobState::WaitingRetry)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::InProgress => write!(f, "in_progress"),
            JobState::WaitingRetry => write!(f, "waiting_retry"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// What a failed attempt led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Attempts remain; the id goes back to the queue tail.
    Retry,
    /// Attempts exhausted; the record is terminal.
    Failed,
}

/// One unit of notification work, as persisted in the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub payload: NotificationPayload,
    pub state: JobState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl JobRecord {
    /// A fresh `pending` record with no attempts.
    pub fn new(payload: NotificationPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::generate(now),
            payload,
            state: JobState::Pending,
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        self.payload.kind()
    }

    /// `pending`/`waiting_retry` → `in_progress`, consuming one attempt.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) -> Result<(), QueueError> {
        if !self.state.is_runnable() || self.attempts >= self.max_attempts {
            return Err(self.invalid("begin an attempt"));
        }
        self.attempts += 1;
        self.state = JobState::InProgress;
        self.updated_at = now;
        Ok(())
    }

    /// `in_progress` → `completed`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), QueueError> {
        if self.state != JobState::InProgress {
            return Err(self.invalid("complete"));
        }
        self.state = JobState::Completed;
        self.last_error = None;
        self.updated_at = now;
        Ok(())
    }

    /// `in_progress` → `waiting_retry` or `failed`, depending on the
    /// attempts left.
    pub fn record_failure(
        &mut self,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, QueueError> {
        if self.state != JobState::InProgress {
            return Err(self.invalid("record a failure"));
        }
        self.updated_at = now;

        if self.attempts < self.max_attempts {
            self.state = JobState::WaitingRetry;
            Ok(AttemptOutcome::Retry)
        } else {
            self.state = JobState::Failed;
            self.last_error = Some(reason.to_string());
            Ok(AttemptOutcome::Failed)
        }
    }

    fn invalid(&self, action: &'static str) -> QueueError {
        QueueError::InvalidTransition {
            id: self.id.clone(),
            from: self.state,
            action,
        }
    }
}
