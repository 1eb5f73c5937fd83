//! Notification delivery.
//!
//! The queue worker hands every job payload to a [`DeliveryClient`]. The
//! production client posts the payload to an HTTP endpoint that renders and
//! sends the email; any non-success answer is reported as a
//! [`DeliveryError`] and counts as one failed attempt.

pub mod http;
pub mod request;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use subrelay_common::types::NotificationPayload;

pub use http::HttpDeliveryClient;
pub use request::{DeliveryRequest, DeliveryResponse};

/// Reasons a single delivery attempt did not succeed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("delivery rejected{}: {message}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Rejected {
        status: Option<u16>,
        message: String,
    },

    #[error("unreadable delivery response: {0}")]
    BadResponse(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Outbound collaborator that performs the actual send.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Attempt one delivery. `Ok(())` means the endpoint confirmed success.
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_includes_status() {
        let err = DeliveryError::Rejected {
            status: Some(502),
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "delivery rejected with status 502: bad gateway");

        let err = DeliveryError::Rejected {
            status: None,
            message: "mailbox full".to_string(),
        };
        assert_eq!(err.to_string(), "delivery rejected: mailbox full");
    }
}
