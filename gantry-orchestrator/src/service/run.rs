//! Run Service
//!
//! Business logic for run ingestion and lifecycle.

use uuid::Uuid;

use gantry_core::domain::event::RunEvent;
use gantry_core::domain::run::PipelineRun;
use gantry_core::domain::trigger::{ClassifyError, SourceEvent, classify};
use gantry_core::dto::trigger::SubmitTrigger;

use crate::context::Context;
use crate::scheduler::RunScheduler;

/// Service error type
#[derive(Debug)]
pub enum RunError {
    Unclassified(ClassifyError),
    NotFound(Uuid),
    InvalidState(String),
}

/// Classify an incoming event, create its run, and start the scheduler.
///
/// An unclassifiable event is rejected here; no run is created and nothing
/// is scheduled.
pub async fn ingest_event(ctx: &Context, req: SubmitTrigger) -> Result<PipelineRun, RunError> {
    let event: SourceEvent = req.into();
    let trigger = classify(&event, &ctx.config.main_branch).map_err(RunError::Unclassified)?;

    let run = PipelineRun::new(trigger, ctx.config.mode);
    ctx.runs.insert(run.clone()).await;
    ctx.events
        .record(
            run.id,
            None,
            format!(
                "run created: {:?} of {} ({} jobs)",
                run.trigger.kind,
                run.trigger.short_sha(),
                run.jobs.len()
            ),
        )
        .await;

    tracing::info!(run = %run.id, "run created for {:?}", run.trigger.kind);
    RunScheduler::spawn(ctx.clone(), run.id);

    Ok(run)
}

/// Get a run by ID
pub async fn get_run(ctx: &Context, id: Uuid) -> Result<PipelineRun, RunError> {
    ctx.runs.get(id).await.ok_or(RunError::NotFound(id))
}

/// List all runs, newest first
pub async fn list_runs(ctx: &Context) -> Vec<PipelineRun> {
    ctx.runs.list().await
}

/// Get the timeline of a run
pub async fn run_events(ctx: &Context, id: Uuid) -> Result<Vec<RunEvent>, RunError> {
    let _run = ctx.runs.get(id).await.ok_or(RunError::NotFound(id))?;
    Ok(ctx.events.list(id).await)
}

/// Request cancellation of a run
///
/// Pending jobs stop before starting; an in-flight apply finishes its state
/// mutation first.
pub async fn cancel_run(ctx: &Context, id: Uuid) -> Result<(), RunError> {
    let run = ctx.runs.get(id).await.ok_or(RunError::NotFound(id))?;

    if run.state.is_terminal() {
        return Err(RunError::InvalidState(format!(
            "run {} is already {:?}",
            id, run.state
        )));
    }

    ctx.runs.update(id, |r| r.cancel_requested = true).await;
    ctx.events.record(id, None, "cancellation requested").await;
    tracing::info!(run = %id, "cancellation requested");

    Ok(())
}
