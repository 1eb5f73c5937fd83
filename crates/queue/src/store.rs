//! Job record persistence.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::QueueError;
use crate::job::{JobId, JobRecord};

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 200;

/// Key/value persistence for job records, addressed by job id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a record, or `None` if it never existed or has expired.
    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, QueueError>;

    /// Insert or overwrite a record. Overwriting clears any pending expiry.
    async fn put(&self, record: &JobRecord) -> Result<(), QueueError>;

    /// Let a record lapse after `ttl`.
    async fn expire(&self, id: &JobId, ttl: Duration) -> Result<(), QueueError>;

    /// All records not yet `completed` or `failed`.
    async fn list_unfinished(&self) -> Result<Vec<JobRecord>, QueueError>;
}

/// Redis-backed store: one JSON string per job under `<prefix>:<id>`.
#[derive(Clone)]
pub struct RedisJobStore {
    redis: ConnectionManager,
    key_prefix: String,
}

impl RedisJobStore {
    pub fn new(redis: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            redis,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, id: &JobId) -> String {
        format!("{}:{}", self.key_prefix, id)
    }

    /// Every record key. `SCAN` may repeat a key across batches, so keys are
    /// collected into a set.
    async fn scan_keys(&self) -> Result<HashSet<String>, QueueError> {
        let mut conn = self.redis.clone();
        let pattern = format!("{}:*", self.key_prefix);
        let mut cursor: u64 = 0;
        let mut keys = HashSet::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = conn.get(self.key(id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, record: &JobRecord) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let json = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(self.key(&record.id), json).await?;
        Ok(())
    }

    async fn expire(&self, id: &JobId, ttl: Duration) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        conn.expire::<_, ()>(self.key(id), secs).await?;
        Ok(())
    }

    async fn list_unfinished(&self) -> Result<Vec<JobRecord>, QueueError> {
        let mut conn = self.redis.clone();
        let mut records = Vec::new();

        for key in self.scan_keys().await? {
            let raw: Option<String> = conn.get(&key).await?;
            let Some(json) = raw else {
                continue;
            };
            match serde_json::from_str::<JobRecord>(&json) {
                Ok(record) if !record.state.is_terminal() => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping unreadable job record");
                }
            }
        }

        Ok(records)
    }
}

/// In-process store for tests and single-process runs.
#[derive(Default)]
pub struct MemoryJobStore {
    records: Mutex<HashMap<JobId, StoredRecord>>,
}

struct StoredRecord {
    record: JobRecord,
    expires_at: Option<Instant>,
}

impl StoredRecord {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of a record, `None` if it does not expire.
    pub async fn ttl(&self, id: &JobId) -> Option<Duration> {
        let records = self.records.lock().await;
        let deadline = records.get(id)?.expires_at?;
        Some(deadline.saturating_duration_since(Instant::now()))
    }

    /// Every live record, in no particular order.
    pub async fn records(&self) -> Vec<JobRecord> {
        let now = Instant::now();
        self.records
            .lock()
            .await
            .values()
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.record.clone())
            .collect()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, QueueError> {
        let mut records = self.records.lock().await;
        let now = Instant::now();
        match records.get(id) {
            Some(stored) if stored.is_live(now) => Ok(Some(stored.record.clone())),
            Some(_) => {
                records.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, record: &JobRecord) -> Result<(), QueueError> {
        self.records.lock().await.insert(
            record.id.clone(),
            StoredRecord {
                record: record.clone(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, id: &JobId, ttl: Duration) -> Result<(), QueueError> {
        if let Some(stored) = self.records.lock().await.get_mut(id) {
            stored.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn list_unfinished(&self) -> Result<Vec<JobRecord>, QueueError> {
        Ok(self
            .records()
            .await
            .into_iter()
            .filter(|record| !record.state.is_terminal())
            .collect())
    }
}
