//! Access to subscription rows for the expiration scan.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use subrelay_common::types::{Subscription, SubscriptionStatus};

use crate::error::ScanError;

/// The subscription queries the scanner needs.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Active subscriptions whose end date is strictly before `now`, with
    /// owner and plan data attached.
    async fn find_active_expired(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, ScanError>;

    /// Move `subscription` from ACTIVE to EXPIRED.
    ///
    /// Returns the updated row, or `None` when the row is no longer ACTIVE
    /// because another writer changed it first.
    async fn mark_expired(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<Subscription>, ScanError>;
}

/// Postgres-backed repository over the `subscriptions`, `users` and `plans`
/// tables.
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_active_expired(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, ScanError> {
        let subs: Vec<Subscription> = sqlx::query_as(
            r#"
            SELECT s.id, s.user_id, s.plan_id, s.status, s.start_date, s.end_date,
                   u.email AS user_email, u.name AS user_name, p.name AS plan_name
            FROM subscriptions s
            JOIN users u ON s.user_id = u.id
            JOIN plans p ON s.plan_id = p.id
            WHERE s.status = 'ACTIVE'
              AND s.end_date < $1
            ORDER BY s.end_date
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn mark_expired(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<Subscription>, ScanError> {
        let sub: Option<Subscription> = sqlx::query_as(
            r#"
            WITH updated AS (
                UPDATE subscriptions
                SET status = 'EXPIRED', updated_at = NOW()
                WHERE id = $1 AND status = 'ACTIVE'
                RETURNING id, user_id, plan_id, status, start_date, end_date
            )
            SELECT s.id, s.user_id, s.plan_id, s.status, s.start_date, s.end_date,
                   u.email AS user_email, u.name AS user_name, p.name AS plan_name
            FROM updated s
            JOIN users u ON s.user_id = u.id
            JOIN plans p ON s.plan_id = p.id
            "#,
        )
        .bind(subscription.id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(sub) = &sub {
            tracing::debug!(subscription_id = %sub.id, "Subscription marked expired");
        }

        Ok(sub)
    }
}

/// In-process repository for tests and demos.
#[derive(Default)]
pub struct MemorySubscriptionRepository {
    subs: Mutex<HashMap<Uuid, Subscription>>,
}

impl MemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, subscription: Subscription) {
        self.subs.lock().await.insert(subscription.id, subscription);
    }

    pub async fn get(&self, id: Uuid) -> Option<Subscription> {
        self.subs.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl SubscriptionRepository for MemorySubscriptionRepository {
    async fn find_active_expired(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, ScanError> {
        let mut subs: Vec<Subscription> = self
            .subs
            .lock()
            .await
            .values()
            .filter(|sub| sub.is_lapsed(now))
            .cloned()
            .collect();
        subs.sort_by_key(|sub| sub.end_date);
        Ok(subs)
    }

    async fn mark_expired(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<Subscription>, ScanError> {
        let mut subs = self.subs.lock().await;
        match subs.get_mut(&subscription.id) {
            Some(sub) if sub.status == SubscriptionStatus::Active => {
                sub.status = SubscriptionStatus::Expired;
                Ok(Some(sub.clone()))
            }
            _ => Ok(None),
        }
    }
}
