//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod approval;
pub mod error;
pub mod health;
pub mod run;
pub mod trigger;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::context::Context;

/// Create the main API router with all endpoints
pub fn create_router(ctx: Context) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Trigger ingestion
        .route("/trigger", post(trigger::submit_trigger))
        // Run endpoints
        .route("/run/list", get(run::list_runs))
        .route("/run/{id}", get(run::get_run))
        .route("/run/{id}/events", get(run::get_run_events))
        .route("/run/{id}/cancel", post(run::cancel_run))
        // Approval endpoints
        .route("/approval/list", get(approval::list_pending))
        .route("/approval/{token}/resolve", post(approval::resolve))
        // Add state and middleware
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
}
