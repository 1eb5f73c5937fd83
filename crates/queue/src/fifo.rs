//! FIFO list of job ids awaiting processing.
//!
//! The queue never carries payloads; the record lives in the job store under
//! the same id.

use std::collections::VecDeque;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;

use crate::error::QueueError;
use crate::job::JobId;

/// Ordered id list: append at the tail, take from the head.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push_tail(&self, id: &JobId) -> Result<(), QueueError>;

    /// Remove and return the head id, `None` when empty.
    async fn pop_head(&self) -> Result<Option<JobId>, QueueError>;

    async fn len(&self) -> Result<usize, QueueError>;

    /// Whether `id` is queued anywhere in the list.
    async fn contains(&self, id: &JobId) -> Result<bool, QueueError>;

    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}

/// Redis list queue (`RPUSH` / `LPOP`).
#[derive(Clone)]
pub struct RedisJobQueue {
    redis: ConnectionManager,
    list_key: String,
}

impl RedisJobQueue {
    pub fn new(redis: ConnectionManager, list_key: impl Into<String>) -> Self {
        Self {
            redis,
            list_key: list_key.into(),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn push_tail(&self, id: &JobId) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        conn.rpush::<_, _, ()>(&self.list_key, id.as_str()).await?;
        Ok(())
    }

    async fn pop_head(&self) -> Result<Option<JobId>, QueueError> {
        let mut conn = self.redis.clone();
        let id: Option<String> = conn.lpop(&self.list_key, None).await?;
        Ok(id.map(JobId::from))
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(&self.list_key).await?;
        Ok(len)
    }

    async fn contains(&self, id: &JobId) -> Result<bool, QueueError> {
        let mut conn = self.redis.clone();
        let position: Option<usize> = redis::cmd("LPOS")
            .arg(&self.list_key)
            .arg(id.as_str())
            .query_async(&mut conn)
            .await?;
        Ok(position.is_some())
    }
}

/// In-process queue for tests and single-process runs.
#[derive(Default)]
pub struct MemoryJobQueue {
    ids: Mutex<VecDeque<JobId>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued ids, head first.
    pub async fn snapshot(&self) -> Vec<JobId> {
        self.ids.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn push_tail(&self, id: &JobId) -> Result<(), QueueError> {
        self.ids.lock().await.push_back(id.clone());
        Ok(())
    }

    async fn pop_head(&self) -> Result<Option<JobId>, QueueError> {
        Ok(self.ids.lock().await.pop_front())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.ids.lock().await.len())
    }

    async fn contains(&self, id: &JobId) -> Result<bool, QueueError> {
        Ok(self.ids.lock().await.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_queue_pops_none() {
        let queue = MemoryJobQueue::new();
        assert!(queue.pop_head().await.unwrap().is_none());
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_pop_order_is_fifo() {
        let queue = MemoryJobQueue::new();
        for id in ["a", "b", "c"] {
            queue.push_tail(&JobId::from(id)).await.unwrap();
        }
        assert_eq!(queue.len().await.unwrap(), 3);

        let mut popped = Vec::new();
        while let Some(id) = queue.pop_head().await.unwrap() {
            popped.push(id.to_string());
        }
        assert_eq!(popped, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_contains_tracks_queued_ids() {
        let queue = MemoryJobQueue::new();
        let id = JobId::from("a");
        assert!(!queue.contains(&id).await.unwrap());

        queue.push_tail(&id).await.unwrap();
        assert!(queue.contains(&id).await.unwrap());

        queue.pop_head().await.unwrap();
        assert!(!queue.contains(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_repush_lands_behind_existing_ids() {
        let queue = MemoryJobQueue::new();
        queue.push_tail(&JobId::from("a")).await.unwrap();
        queue.push_tail(&JobId::from("b")).await.unwrap();

        let head = queue.pop_head().await.unwrap().unwrap();
        queue.push_tail(&head).await.unwrap();

        assert_eq!(
            queue.snapshot().await,
            vec![JobId::from("b"), JobId::from("a")]
        );
    }
}
