//! Run API Handlers
//!
//! HTTP endpoints for run inspection and cancellation.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use gantry_core::domain::event::RunEvent;
use gantry_core::domain::run::PipelineRun;
use gantry_core::dto::run::RunDto;

use crate::api::error::{ApiError, ApiResult};
use crate::context::Context;
use crate::service::run_service;

fn map_run_error(e: run_service::RunError) -> ApiError {
    match e {
        run_service::RunError::NotFound(id) => ApiError::NotFound(format!("Run {} not found", id)),
        run_service::RunError::InvalidState(msg) => ApiError::BadRequest(msg),
        run_service::RunError::Unclassified(err) => ApiError::BadRequest(err.to_string()),
    }
}

/// GET /run/list
/// List all runs, newest first
pub async fn list_runs(State(ctx): State<Context>) -> ApiResult<Json<Vec<RunDto>>> {
    tracing::debug!("Listing runs");

    let runs = run_service::list_runs(&ctx).await;
    Ok(Json(runs.into_iter().map(RunDto::from).collect()))
}

/// GET /run/{id}
/// Get run details, including the full job graph
pub async fn get_run(
    State(ctx): State<Context>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineRun>> {
    tracing::debug!("Getting run: {}", id);

    let run = run_service::get_run(&ctx, id).await.map_err(map_run_error)?;
    Ok(Json(run))
}

/// GET /run/{id}/events
/// Get the timeline of a run
pub async fn get_run_events(
    State(ctx): State<Context>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<RunEvent>>> {
    tracing::debug!("Getting events for run: {}", id);

    let events = run_service::run_events(&ctx, id)
        .await
        .map_err(map_run_error)?;
    Ok(Json(events))
}

/// POST /run/{id}/cancel
/// Request cancellation of a run
pub async fn cancel_run(State(ctx): State<Context>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    tracing::info!("Cancelling run: {}", id);

    run_service::cancel_run(&ctx, id).await.map_err(map_run_error)?;
    Ok(StatusCode::ACCEPTED)
}
