//! Trigger API Handlers
//!
//! Event ingestion: a recognized event creates and schedules a run; anything
//! else is rejected before scheduling.

use axum::{Json, extract::State, http::StatusCode};

use gantry_core::domain::run::PipelineRun;
use gantry_core::dto::trigger::SubmitTrigger;

use crate::api::error::{ApiError, ApiResult};
use crate::context::Context;
use crate::service::run_service;

/// POST /trigger
/// Ingest a source-control event
pub async fn submit_trigger(
    State(ctx): State<Context>,
    Json(req): Json<SubmitTrigger>,
) -> ApiResult<(StatusCode, Json<PipelineRun>)> {
    tracing::info!(
        "Trigger received: {} on {} ({})",
        req.event_kind,
        req.ref_name,
        req.commit_sha
    );

    let run = run_service::ingest_event(&ctx, req)
        .await
        .map_err(|e| match e {
            run_service::RunError::Unclassified(err) => ApiError::BadRequest(err.to_string()),
            run_service::RunError::NotFound(id) => {
                ApiError::NotFound(format!("Run {} not found", id))
            }
            run_service::RunError::InvalidState(msg) => ApiError::BadRequest(msg),
        })?;

    Ok((StatusCode::CREATED, Json(run)))
}
