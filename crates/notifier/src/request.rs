//! Wire format spoken with the delivery endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use subrelay_common::types::{NotificationKind, NotificationPayload};

use crate::DeliveryError;

/// Fallback reason when the endpoint refuses without saying why.
const DEFAULT_FAILURE_MESSAGE: &str = "Failed to send email";

/// Body posted to the delivery endpoint.
///
/// Flat camelCase object; date fields that do not apply to the notification
/// kind are omitted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest<'a> {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub email: &'a str,
    pub name: &'a str,
    pub plan_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub features: &'a [String],
}

impl<'a> From<&'a NotificationPayload> for DeliveryRequest<'a> {
    fn from(payload: &'a NotificationPayload) -> Self {
        let mut request = DeliveryRequest {
            kind: payload.kind(),
            email: payload.email(),
            name: payload.name(),
            plan_name: payload.plan_name(),
            start_date: None,
            end_date: None,
            cancel_date: None,
            expiry_date: None,
            price: None,
            features: &[],
        };

        match payload {
            NotificationPayload::SubscriptionCreated {
                start_date,
                end_date,
                price,
                features,
                ..
            } => {
                request.start_date = Some(*start_date);
                request.end_date = Some(*end_date);
                request.price = *price;
                request.features = features;
            }
            NotificationPayload::SubscriptionUpdated {
                start_date,
                end_date,
                price,
                features,
                ..
            } => {
                request.start_date = *start_date;
                request.end_date = Some(*end_date);
                request.price = *price;
                request.features = features;
            }
            NotificationPayload::SubscriptionCancelled { cancel_date, .. } => {
                request.cancel_date = Some(*cancel_date);
            }
            NotificationPayload::SubscriptionExpired { expiry_date, .. } => {
                request.expiry_date = Some(*expiry_date);
            }
        }

        request
    }
}

/// Body returned by the delivery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeliveryResponse {
    /// Interpret the endpoint's verdict. Only an explicit `success: true`
    /// counts as delivered.
    pub fn into_result(self) -> Result<(), DeliveryError> {
        if self.success {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: None,
                message: self
                    .message
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            })
        }
    }
}
