//! API Module
//!
//! HTTP API layer for the runner. A thin adapter that maps verbs to
//! `JobService` operations.

pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::JobService;

/// Create the main API router with all endpoints
pub fn create_router(service: Arc<JobService>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/jobs", post(job::submit_job))
        .route("/jobs/{id}", get(job::get_job))
        .route("/jobs/{id}/cancel", post(job::cancel_job))
        // Add state and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}
