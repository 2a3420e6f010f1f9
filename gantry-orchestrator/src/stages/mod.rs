//! Stage implementations
//!
//! Each stage is a free async function over the shared [`Context`]. Stages
//! communicate only through persisted values: the registries, the saved
//! plans, the run record, and each environment's remote state.

pub mod apply;
pub mod build;
pub mod gate;
pub mod plan;
pub mod promote;
pub mod resolve;

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use gantry_core::domain::artifact::ArtifactDigest;
use gantry_core::domain::environment::EnvName;
use gantry_core::domain::run::StageKind;

use crate::context::Context;
use crate::service::registry::RegistryError;
use crate::service::state::StateError;

/// Stage failure taxonomy. Every variant is fatal to its job; the scheduler
/// cascades `Skipped` to dependents and never retries.
#[derive(Debug)]
pub enum StageError {
    /// The run disappeared from the store mid-flight.
    RunMissing(Uuid),
    /// Compile/package failure.
    Build(String),
    /// Registry refused the write.
    PublishDenied { registry: String },
    /// Digest or tag absent: deleted or expired by retention policy.
    DigestNotFound { registry: String, reference: String },
    /// Diff computation failed; names the offending parameter.
    Plan { parameter: String, reason: String },
    /// No saved plan for this (run, environment).
    PlanMissing { environment: EnvName },
    /// The saved plan aged out of its retention window.
    PlanExpired {
        environment: EnvName,
        expired_at: DateTime<Utc>,
    },
    /// The digest to deploy does not match the reviewed plan.
    DigestMismatch {
        expected: ArtifactDigest,
        found: ArtifactDigest,
    },
    /// No digest available to deploy.
    MissingDigest,
    /// A reviewer rejected the production change.
    ApprovalRejected { reviewer: Option<String> },
    /// The approval deadline elapsed.
    ApprovalExpired,
    /// Production apply reached without a granted approval.
    ApprovalNotGranted { environment: EnvName },
    /// Remote state backend failure.
    State(StateError),
    /// The stage exceeded its wall-clock budget.
    TimedOut { budget_secs: u64 },
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::RunMissing(id) => write!(f, "run {} no longer exists", id),
            StageError::Build(msg) => write!(f, "build failed: {}", msg),
            StageError::PublishDenied { registry } => {
                write!(f, "publish denied by registry {}", registry)
            }
            StageError::DigestNotFound {
                registry,
                reference,
            } => write!(f, "{} not found in registry {}", reference, registry),
            StageError::Plan { parameter, reason } => {
                write!(f, "plan failed on parameter '{}': {}", parameter, reason)
            }
            StageError::PlanMissing { environment } => {
                write!(f, "no saved plan for environment {}", environment)
            }
            StageError::PlanExpired {
                environment,
                expired_at,
            } => write!(
                f,
                "saved plan for {} expired at {}",
                environment, expired_at
            ),
            StageError::DigestMismatch { expected, found } => {
                write!(f, "digest mismatch: expected {}, found {}", expected, found)
            }
            StageError::MissingDigest => write!(f, "no target digest recorded for this run"),
            StageError::ApprovalRejected { reviewer } => match reviewer {
                Some(who) => write!(f, "production change rejected by {}", who),
                None => write!(f, "production change rejected"),
            },
            StageError::ApprovalExpired => write!(f, "approval expired without a decision"),
            StageError::ApprovalNotGranted { environment } => {
                write!(f, "apply to {} requires a granted approval", environment)
            }
            StageError::State(err) => write!(f, "{}", err),
            StageError::TimedOut { budget_secs } => {
                write!(f, "stage exceeded its {}s budget", budget_secs)
            }
        }
    }
}

impl std::error::Error for StageError {}

impl From<RegistryError> for StageError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound {
                registry,
                reference,
            } => StageError::DigestNotFound {
                registry,
                reference,
            },
            RegistryError::WriteDenied { registry } => StageError::PublishDenied { registry },
        }
    }
}

impl From<StateError> for StageError {
    fn from(err: StateError) -> Self {
        StageError::State(err)
    }
}

/// Dispatch one job to its stage implementation.
pub async fn execute(ctx: &Context, run_id: Uuid, stage: StageKind) -> Result<(), StageError> {
    match stage {
        StageKind::Build => build::execute(ctx, run_id).await,
        StageKind::Resolve { environment } => resolve::execute(ctx, run_id, environment).await,
        StageKind::Plan {
            environment,
            report_only,
        } => plan::execute(ctx, run_id, environment, report_only).await,
        StageKind::Apply { environment } => apply::execute(ctx, run_id, environment).await,
        StageKind::Promote { source, target } => {
            promote::execute(ctx, run_id, source, target).await
        }
        StageKind::ApprovalGate { environment } => gate::execute(ctx, run_id, environment).await,
    }
}

/// Fetch the run a stage belongs to.
pub(crate) async fn fetch_run(
    ctx: &Context,
    run_id: Uuid,
) -> Result<gantry_core::domain::run::PipelineRun, StageError> {
    ctx.runs
        .get(run_id)
        .await
        .ok_or(StageError::RunMissing(run_id))
}
