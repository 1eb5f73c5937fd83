use std::time::Duration;

use async_trait::async_trait;

use subrelay_common::types::NotificationPayload;

use crate::request::{DeliveryRequest, DeliveryResponse};
use crate::{DeliveryClient, DeliveryError};

/// Longest error body kept in a rejection message.
const MAX_ERROR_BODY: usize = 512;

/// Delivery client that posts notifications to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpDeliveryClient {
    /// Build a client for `endpoint`. Every request is bounded by `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        let request = DeliveryRequest::from(payload);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: Some(status.as_u16()),
                message: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let verdict: DeliveryResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::BadResponse(e.to_string()))?;

        tracing::debug!(
            kind = %request.kind,
            success = verdict.success,
            "Delivery endpoint answered"
        );

        verdict.into_result()
    }
}
