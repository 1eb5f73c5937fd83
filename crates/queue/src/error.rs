use thiserror::Error;

use subrelay_common::error::AppError;
use subrelay_common::types::PayloadError;

use crate::job::{JobId, JobState};

/// Errors raised by the job queue and its backing stores.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("Job {id} cannot {action} while {from}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        action: &'static str,
    },
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Redis(e) => AppError::Redis(e),
            QueueError::Serialization(e) => AppError::Serialization(e),
            QueueError::InvalidPayload(e) => AppError::Validation(e.to_string()),
            e @ QueueError::InvalidTransition { .. } => AppError::Internal(e.to_string()),
        }
    }
}
