//! Apply stage
//!
//! Commits the saved plan for this (run, environment) pair, never an ad hoc
//! recomputation. Every precondition fails the stage closed: missing plan,
//! expired plan, digest substitution, or an unapproved production change.
//! The environment's lock is held from transaction open to commit, so a
//! concurrent apply for the same environment queues rather than racing.

use chrono::Utc;
use uuid::Uuid;

use gantry_core::domain::approval::ApprovalState;
use gantry_core::domain::environment::EnvName;

use crate::context::Context;
use crate::service::state::{DesiredState, StateBackend as _, StateTransaction as _};
use crate::stages::{StageError, fetch_run};

pub async fn execute(ctx: &Context, run_id: Uuid, environment: EnvName) -> Result<(), StageError> {
    let run = fetch_run(ctx, run_id).await?;
    let job_id = format!("apply-{}", environment);

    let plan = ctx
        .plans
        .consume(run_id, environment)
        .await
        .ok_or(StageError::PlanMissing { environment })?;

    if plan.is_expired(Utc::now()) {
        return Err(StageError::PlanExpired {
            environment,
            expired_at: plan.expires_at(),
        });
    }

    // What was reviewed is what gets applied.
    if let Some(expected) = &run.target_digest {
        if *expected != plan.target_digest {
            return Err(StageError::DigestMismatch {
                expected: expected.clone(),
                found: plan.target_digest.clone(),
            });
        }
    }

    if environment.requires_approval() {
        let approved = ctx
            .approvals
            .ticket_for_run(run_id, environment)
            .await
            .map(|t| t.state == ApprovalState::Approved)
            .unwrap_or(false);
        if !approved {
            return Err(StageError::ApprovalNotGranted { environment });
        }
    }

    let desired: DesiredState =
        serde_json::from_slice(&plan.payload).map_err(|e| StageError::Plan {
            parameter: "payload".to_string(),
            reason: e.to_string(),
        })?;
    if desired.digest != plan.target_digest {
        return Err(StageError::DigestMismatch {
            expected: plan.target_digest.clone(),
            found: desired.digest.clone(),
        });
    }

    let txn = ctx.state.begin_apply(environment).await?;
    let state = txn.commit(desired).await?;

    ctx.events
        .record(
            run_id,
            Some(&job_id),
            format!(
                "applied plan {}; {} now runs {} (serial {})",
                plan.id,
                environment,
                plan.target_digest,
                state.serial
            ),
        )
        .await;

    Ok(())
}
