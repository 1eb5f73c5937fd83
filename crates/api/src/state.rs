//! Shared application state for the Axum API server.

use std::sync::Arc;

use subrelay_queue::{Enqueuer, JobStore};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub enqueuer: Enqueuer,
    pub jobs: Arc<dyn JobStore>,
}

impl AppState {
    pub fn new(enqueuer: Enqueuer, jobs: Arc<dyn JobStore>) -> Self {
        Self { enqueuer, jobs }
    }
}
