//! Plan stage
//!
//! Computes the proposed change set for one environment: the desired
//! configuration parameterized by the digest to deploy, diffed against the
//! environment's current remote state. Strictly read-only with respect to
//! that state. Pull-request plans are report-only: the summary lands in the
//! run timeline and no consumable plan is persisted.

use uuid::Uuid;

use gantry_core::domain::artifact::ArtifactDigest;
use gantry_core::domain::environment::EnvName;
use gantry_core::domain::plan::{ChangeSummary, PlanArtifact};

use crate::context::Context;
use crate::service::state::{DesiredState, EnvState, StateBackend as _};
use crate::stages::{StageError, fetch_run};

pub async fn execute(
    ctx: &Context,
    run_id: Uuid,
    environment: EnvName,
    report_only: bool,
) -> Result<(), StageError> {
    let run = fetch_run(ctx, run_id).await?;
    let job_id = format!("plan-{}", environment);

    let state = ctx.state.read(environment).await?;

    // The digest from Build/Resolve; falling back to what is already
    // deployed keeps a digest-less plan rollback-safe.
    let digest = run
        .target_digest
        .clone()
        .or_else(|| state.deployed_digest.clone())
        .ok_or_else(|| StageError::Plan {
            parameter: "digest".to_string(),
            reason: format!("no target digest and nothing deployed in {}", environment),
        })?;

    let desired = DesiredState {
        environment,
        digest: digest.clone(),
    };
    let summary = diff(&state, &digest);

    ctx.events
        .record(run_id, Some(&job_id), summary.detail.clone())
        .await;

    if report_only {
        ctx.events
            .record(
                run_id,
                Some(&job_id),
                "review plan only; nothing will be applied".to_string(),
            )
            .await;
        return Ok(());
    }

    let payload = serde_json::to_vec(&desired).map_err(|e| StageError::Plan {
        parameter: "payload".to_string(),
        reason: e.to_string(),
    })?;
    let plan = PlanArtifact::new(
        environment,
        digest,
        summary,
        payload,
        ctx.config.plan_retention_days,
    );
    ctx.events
        .record(
            run_id,
            Some(&job_id),
            format!("saved plan {} (expires {})", plan.id, plan.expires_at()),
        )
        .await;
    ctx.plans.store(run_id, plan).await;

    Ok(())
}

/// Diff the desired digest against the environment's current state.
fn diff(state: &EnvState, digest: &ArtifactDigest) -> ChangeSummary {
    match &state.deployed_digest {
        None => ChangeSummary {
            creates: 1,
            updates: 0,
            destroys: 0,
            detail: format!("create deployment in {} with {}", state.environment, digest),
        },
        Some(current) if current == digest => ChangeSummary {
            creates: 0,
            updates: 0,
            destroys: 0,
            detail: format!("{} already deployed in {}; no changes", digest, state.environment),
        },
        Some(current) => ChangeSummary {
            creates: 0,
            updates: 1,
            destroys: 0,
            detail: format!(
                "update {} deployment from {} to {}",
                state.environment, current, digest
            ),
        },
    }
}
