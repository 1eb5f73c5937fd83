//! SubRelay service: the HTTP producer surface over the notification queue.
//!
//! Endpoints:
//! - GET  /health: liveness
//! - POST /api/notifications: queue a notification job
//! - GET  /api/jobs/{id}: inspect a job record

pub mod routes;
pub mod state;
