//! Job graph construction
//!
//! The DAG for a run is a pure function of `(TriggerKind, DeploymentMode)`.
//! Keeping construction free of runtime state makes the graph shape directly
//! unit-testable.
//!
//! | Trigger     | DevOnly                    | Production                                   |
//! |-------------|----------------------------|----------------------------------------------|
//! | PullRequest | Build → Plan(dev, report)  | Build → Plan(dev, report)                    |
//! | Merge       | Build → Plan → Apply (dev) | dev chain ‖ Promote(dev→stage) → stage chain |
//! | Tag         | Build → Plan → Apply (dev) | Resolve(stage) → Promote(stage→prod) →       |
//! |             |                            |   Plan(prod) → Gate → Apply(prod)            |

use crate::domain::environment::{DeploymentMode, EnvName};
use crate::domain::run::{JobInstance, StageKind};
use crate::domain::trigger::TriggerKind;

/// Build the job graph for a trigger kind under a deployment mode.
///
/// A manual dispatch re-runs the merge flow.
pub fn build_job_graph(kind: TriggerKind, mode: DeploymentMode) -> Vec<JobInstance> {
    match (kind, mode) {
        (TriggerKind::PullRequest, _) => review_graph(),
        (TriggerKind::Merge | TriggerKind::Manual, DeploymentMode::DevOnly) => dev_graph(),
        (TriggerKind::Merge | TriggerKind::Manual, DeploymentMode::Production) => {
            merge_production_graph()
        }
        (TriggerKind::Tag, DeploymentMode::DevOnly) => dev_graph(),
        (TriggerKind::Tag, DeploymentMode::Production) => tag_production_graph(),
    }
}

/// Pull requests plan against dev for review; nothing is applied.
fn review_graph() -> Vec<JobInstance> {
    vec![
        JobInstance::new(StageKind::Build, &[]),
        JobInstance::new(
            StageKind::Plan {
                environment: EnvName::Dev,
                report_only: true,
            },
            &["build"],
        ),
    ]
}

/// The single-environment chain: build, plan, apply against dev.
fn dev_graph() -> Vec<JobInstance> {
    vec![
        JobInstance::new(StageKind::Build, &[]),
        JobInstance::new(
            StageKind::Plan {
                environment: EnvName::Dev,
                report_only: false,
            },
            &["build"],
        ),
        JobInstance::new(
            StageKind::Apply {
                environment: EnvName::Dev,
            },
            &["plan-dev"],
        ),
    ]
}

/// Merge in production mode: the dev chain and the staged promotion chain
/// both hang off the build and run concurrently.
fn merge_production_graph() -> Vec<JobInstance> {
    let mut jobs = dev_graph();
    jobs.push(JobInstance::new(
        StageKind::Promote {
            source: EnvName::Dev,
            target: EnvName::Stage,
        },
        &["build"],
    ));
    jobs.push(JobInstance::new(
        StageKind::Plan {
            environment: EnvName::Stage,
            report_only: false,
        },
        &["promote-dev-stage"],
    ));
    jobs.push(JobInstance::new(
        StageKind::Apply {
            environment: EnvName::Stage,
        },
        &["plan-stage"],
    ));
    jobs
}

/// Tag in production mode: the staged digest is resolved (never rebuilt),
/// promoted to prod, planned, and applied behind the approval gate.
fn tag_production_graph() -> Vec<JobInstance> {
    vec![
        JobInstance::new(
            StageKind::Resolve {
                environment: EnvName::Stage,
            },
            &[],
        ),
        JobInstance::new(
            StageKind::Promote {
                source: EnvName::Stage,
                target: EnvName::Prod,
            },
            &["resolve-stage"],
        ),
        JobInstance::new(
            StageKind::Plan {
                environment: EnvName::Prod,
                report_only: false,
            },
            &["promote-stage-prod"],
        ),
        JobInstance::new(
            StageKind::ApprovalGate {
                environment: EnvName::Prod,
            },
            &["plan-prod"],
        ),
        JobInstance::new(
            StageKind::Apply {
                environment: EnvName::Prod,
            },
            &["gate-prod"],
        ),
    ]
}
