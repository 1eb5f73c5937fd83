use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Closed set of notifications the delivery subsystem knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionCancelled,
    SubscriptionExpired,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SubscriptionCreated => "subscription_created",
            NotificationKind::SubscriptionUpdated => "subscription_updated",
            NotificationKind::SubscriptionCancelled => "subscription_cancelled",
            NotificationKind::SubscriptionExpired => "subscription_expired",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification content, one variant per [`NotificationKind`].
///
/// The variant tag is serialized as `type`, matching the field the delivery
/// endpoint switches on. Each variant lists exactly the fields its template
/// needs; optional extras default to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    SubscriptionCreated {
        email: String,
        name: String,
        plan_name: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<f64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        features: Vec<String>,
    },
    SubscriptionUpdated {
        email: String,
        name: String,
        plan_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_date: Option<DateTime<Utc>>,
        end_date: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        price: Option<f64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        features: Vec<String>,
    },
    SubscriptionCancelled {
        email: String,
        name: String,
        plan_name: String,
        cancel_date: DateTime<Utc>,
    },
    SubscriptionExpired {
        email: String,
        name: String,
        plan_name: String,
        expiry_date: DateTime<Utc>,
    },
}

/// Rejection of an untyped payload at the enqueue boundary.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("payload type '{found}' does not match kind '{expected}'")]
    KindMismatch {
        expected: NotificationKind,
        found: String,
    },

    #[error("invalid {kind} payload: {source}")]
    Invalid {
        kind: NotificationKind,
        #[source]
        source: serde_json::Error,
    },
}

impl NotificationPayload {
    /// Build a payload for `kind` from loose JSON fields.
    ///
    /// Only key presence and value shape are checked; the content of the
    /// fields is the producer's responsibility.
    pub fn from_fields(kind: NotificationKind, fields: Value) -> Result<Self, PayloadError> {
        let Value::Object(mut map) = fields else {
            return Err(PayloadError::NotAnObject);
        };

        if let Some(tag) = map.get("type")
            && tag.as_str() != Some(kind.as_str())
        {
            return Err(PayloadError::KindMismatch {
                expected: kind,
                found: tag.to_string(),
            });
        }
        map.insert("type".to_string(), Value::from(kind.as_str()));

        serde_json::from_value(Value::Object(map))
            .map_err(|source| PayloadError::Invalid { kind, source })
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationPayload::SubscriptionCreated { .. } => NotificationKind::SubscriptionCreated,
            NotificationPayload::SubscriptionUpdated { .. } => NotificationKind::SubscriptionUpdated,
            NotificationPayload::SubscriptionCancelled { .. } => {
                NotificationKind::SubscriptionCancelled
            }
            NotificationPayload::SubscriptionExpired { .. } => NotificationKind::SubscriptionExpired,
        }
    }

    /// Recipient address.
    pub fn email(&self) -> &str {
        match self {
            NotificationPayload::SubscriptionCreated { email, .. }
            | NotificationPayload::SubscriptionUpdated { email, .. }
            | NotificationPayload::SubscriptionCancelled { email, .. }
            | NotificationPayload::SubscriptionExpired { email, .. } => email,
        }
    }

    /// Recipient display name.
    pub fn name(&self) -> &str {
        match self {
            NotificationPayload::SubscriptionCreated { name, .. }
            | NotificationPayload::SubscriptionUpdated { name, .. }
            | NotificationPayload::SubscriptionCancelled { name, .. }
            | NotificationPayload::SubscriptionExpired { name, .. } => name,
        }
    }

    pub fn plan_name(&self) -> &str {
        match self {
            NotificationPayload::SubscriptionCreated { plan_name, .. }
            | NotificationPayload::SubscriptionUpdated { plan_name, .. }
            | NotificationPayload::SubscriptionCancelled { plan_name, .. }
            | NotificationPayload::SubscriptionExpired { plan_name, .. } => plan_name,
        }
    }
}

/// Subscription lifecycle status as stored by the subscription service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
    Expired,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "ACTIVE"),
            SubscriptionStatus::Inactive => write!(f, "INACTIVE"),
            SubscriptionStatus::Cancelled => write!(f, "CANCELLED"),
            SubscriptionStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A subscription joined with the user and plan data notifications need.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub user_email: String,
    pub user_name: String,
    pub plan_name: String,
}

impl Subscription {
    /// Whether the validity window has elapsed while the subscription is
    /// still marked active.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date < now
    }

    /// Expiration notice addressed to this subscription's owner.
    pub fn expiration_notice(&self) -> NotificationPayload {
        NotificationPayload::SubscriptionExpired {
            email: self.user_email.clone(),
            name: self.user_name.clone(),
            plan_name: self.plan_name.clone(),
            expiry_date: self.end_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn make_subscription(status: SubscriptionStatus, end_date: DateTime<Utc>) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            status,
            start_date: end_date - Duration::days(30),
            end_date,
            user_email: "ada@example.com".to_string(),
            user_name: "Ada".to_string(),
            plan_name: "Pro".to_string(),
        }
    }

    #[test]
    fn test_payload_serializes_type_tag() {
        let payload = NotificationPayload::SubscriptionCancelled {
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            plan_name: "Pro".to_string(),
            cancel_date: Utc::now(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "subscription_cancelled");
        assert_eq!(value["plan_name"], "Pro");
        assert_eq!(payload.kind(), NotificationKind::SubscriptionCancelled);
    }

    #[test]
    fn test_from_fields_accepts_complete_payload() {
        let payload = NotificationPayload::from_fields(
            NotificationKind::SubscriptionCreated,
            json!({
                "email": "ada@example.com",
                "name": "Ada",
                "plan_name": "Pro",
                "start_date": "2026-01-01T00:00:00Z",
                "end_date": "2026-02-01T00:00:00Z",
                "price": 9.99,
                "features": ["priority support"]
            }),
        )
        .unwrap();

        assert_eq!(payload.kind(), NotificationKind::SubscriptionCreated);
        assert_eq!(payload.email(), "ada@example.com");
        assert_eq!(payload.name(), "Ada");
        assert_eq!(payload.plan_name(), "Pro");
    }

    #[test]
    fn test_from_fields_rejects_missing_field() {
        let err = NotificationPayload::from_fields(
            NotificationKind::SubscriptionCancelled,
            json!({
                "email": "ada@example.com",
                "name": "Ada",
                "plan_name": "Pro"
            }),
        )
        .unwrap_err();

        assert!(matches!(err, PayloadError::Invalid { .. }));
        assert!(err.to_string().contains("cancel_date"));
    }

    #[test]
    fn test_from_fields_rejects_non_object() {
        let err =
            NotificationPayload::from_fields(NotificationKind::SubscriptionExpired, json!([1, 2]))
                .unwrap_err();
        assert!(matches!(err, PayloadError::NotAnObject));
    }

    #[test]
    fn test_from_fields_rejects_conflicting_type() {
        let err = NotificationPayload::from_fields(
            NotificationKind::SubscriptionExpired,
            json!({
                "type": "subscription_created",
                "email": "ada@example.com",
                "name": "Ada",
                "plan_name": "Pro",
                "expiry_date": "2026-01-01T00:00:00Z"
            }),
        )
        .unwrap_err();
        assert!(matches!(err, PayloadError::KindMismatch { .. }));
    }

    #[test]
    fn test_is_lapsed_only_for_active_past_end_date() {
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        let tomorrow = now + Duration::days(1);

        assert!(make_subscription(SubscriptionStatus::Active, yesterday).is_lapsed(now));
        assert!(!make_subscription(SubscriptionStatus::Active, tomorrow).is_lapsed(now));
        assert!(!make_subscription(SubscriptionStatus::Cancelled, yesterday).is_lapsed(now));
        assert!(!make_subscription(SubscriptionStatus::Expired, yesterday).is_lapsed(now));
    }

    #[test]
    fn test_expiration_notice_uses_subscription_data() {
        let end = Utc::now() - Duration::days(1);
        let sub = make_subscription(SubscriptionStatus::Active, end);

        match sub.expiration_notice() {
            NotificationPayload::SubscriptionExpired {
                email,
                name,
                plan_name,
                expiry_date,
            } => {
                assert_eq!(email, "ada@example.com");
                assert_eq!(name, "Ada");
                assert_eq!(plan_name, "Pro");
                assert_eq!(expiry_date, end);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
