use thiserror::Error;

/// Errors raised while scanning for expired subscriptions.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
