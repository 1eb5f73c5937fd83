//! Job inspection.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use subrelay_common::error::AppError;
use subrelay_queue::{JobId, JobRecord};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/jobs/{id}", get(get_job))
}

/// GET /api/jobs/{id}: Current record of a job. Completed jobs disappear
/// once their retention lapses.
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    let id = JobId::from(id);
    state
        .jobs
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))
}
