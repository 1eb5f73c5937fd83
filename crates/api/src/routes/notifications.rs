//! Producer endpoint for notification jobs.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use subrelay_common::error::AppError;
use subrelay_common::types::NotificationKind;
use subrelay_queue::JobId;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications", post(create_notification))
}

#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct NotificationAccepted {
    pub job_id: JobId,
}

/// POST /api/notifications: Queue a notification for delivery.
async fn create_notification(
    State(state): State<AppState>,
    body: Result<Json<NotificationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<NotificationAccepted>), AppError> {
    let Json(request) = body.map_err(|e| AppError::Validation(e.body_text()))?;

    let job_id = state
        .enqueuer
        .enqueue_raw(request.kind, request.payload)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(NotificationAccepted { job_id })))
}
