//! Run DTOs for listing and status display

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::environment::DeploymentMode;
use crate::domain::run::{PipelineRun, RunState};
use crate::domain::trigger::TriggerKind;

/// Lightweight run summary for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDto {
    pub id: Uuid,
    pub kind: TriggerKind,
    pub commit_sha: String,
    pub version_tag: Option<String>,
    pub mode: DeploymentMode,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<PipelineRun> for RunDto {
    fn from(run: PipelineRun) -> Self {
        Self {
            id: run.id,
            kind: run.trigger.kind,
            commit_sha: run.trigger.commit_sha,
            version_tag: run.trigger.version_tag,
            mode: run.mode,
            state: run.state,
            created_at: run.created_at,
            completed_at: run.completed_at,
        }
    }
}
