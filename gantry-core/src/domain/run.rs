//! Pipeline run domain types
//!
//! A run is the unit of execution: one trigger, one deployment mode, and the
//! job graph instantiated for that pair. Job state transitions are typed; the
//! skip-on-failure cascade is a graph property, not scattered conditionals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::artifact::ArtifactDigest;
use crate::domain::environment::{DeploymentMode, EnvName};
use crate::domain::graph;
use crate::domain::trigger::TriggerContext;

/// The kind of work a job performs, with its environment scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageKind {
    /// Build the artifact from source and publish it to the dev registry.
    Build,
    /// Resolve a human tag to a digest in the given environment's registry.
    Resolve { environment: EnvName },
    /// Compute the change set for an environment. Report-only plans surface
    /// their summary without persisting a consumable plan artifact.
    Plan {
        environment: EnvName,
        report_only: bool,
    },
    /// Commit a previously saved plan to the environment's remote state.
    Apply { environment: EnvName },
    /// Republish an artifact by digest from one registry into the next.
    Promote { source: EnvName, target: EnvName },
    /// Suspend until a designated reviewer resolves the production change.
    ApprovalGate { environment: EnvName },
}

impl StageKind {
    /// Stable job identifier within a run, e.g. `plan-dev`.
    pub fn job_id(&self) -> String {
        match self {
            StageKind::Build => "build".to_string(),
            StageKind::Resolve { environment } => format!("resolve-{}", environment),
            StageKind::Plan { environment, .. } => format!("plan-{}", environment),
            StageKind::Apply { environment } => format!("apply-{}", environment),
            StageKind::Promote { source, target } => format!("promote-{}-{}", source, target),
            StageKind::ApprovalGate { environment } => format!("gate-{}", environment),
        }
    }

    /// The environment whose state or registry this stage writes, if any.
    pub fn environment(&self) -> Option<EnvName> {
        match self {
            StageKind::Build => Some(EnvName::Dev),
            StageKind::Resolve { environment }
            | StageKind::Plan { environment, .. }
            | StageKind::Apply { environment }
            | StageKind::ApprovalGate { environment } => Some(*environment),
            StageKind::Promote { target, .. } => Some(*target),
        }
    }
}

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending | JobState::Running)
    }
}

/// One node of the run's job graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: String,
    pub stage: StageKind,
    pub state: JobState,
    pub depends_on: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
}

impl JobInstance {
    pub fn new(stage: StageKind, depends_on: &[&str]) -> Self {
        Self {
            id: stage.job_id(),
            stage,
            state: JobState::Pending,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            started_at: None,
            completed_at: None,
            failure: None,
        }
    }
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }
}

/// A pipeline run: trigger, mode, and the job DAG instantiated for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub trigger: TriggerContext,
    pub mode: DeploymentMode,
    pub state: RunState,
    pub jobs: Vec<JobInstance>,
    /// Digest produced by Build or Resolve, recorded for downstream stages
    /// and cross-checked against the consumed plan at apply time.
    pub target_digest: Option<ArtifactDigest>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Instantiate the run with the job graph for `(trigger.kind, mode)`.
    pub fn new(trigger: TriggerContext, mode: DeploymentMode) -> Self {
        let jobs = graph::build_job_graph(trigger.kind, mode);
        Self {
            id: Uuid::new_v4(),
            trigger,
            mode,
            state: RunState::Pending,
            jobs,
            target_digest: None,
            cancel_requested: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn job(&self, id: &str) -> Option<&JobInstance> {
        self.jobs.iter().find(|j| j.id == id)
    }

    fn job_mut(&mut self, id: &str) -> Option<&mut JobInstance> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    /// Pending jobs whose dependencies have all succeeded.
    pub fn ready_jobs(&self) -> Vec<JobInstance> {
        self.jobs
            .iter()
            .filter(|j| {
                j.state == JobState::Pending
                    && j.depends_on.iter().all(|dep| {
                        self.job(dep)
                            .map(|d| d.state == JobState::Succeeded)
                            .unwrap_or(false)
                    })
            })
            .cloned()
            .collect()
    }

    pub fn mark_running(&mut self, id: &str) {
        self.state = RunState::Running;
        if let Some(job) = self.job_mut(id) {
            job.state = JobState::Running;
            job.started_at = Some(Utc::now());
        }
    }

    pub fn mark_succeeded(&mut self, id: &str) {
        if let Some(job) = self.job_mut(id) {
            job.state = JobState::Succeeded;
            job.completed_at = Some(Utc::now());
        }
    }

    /// Fail a job and cascade `Skipped` to all of its transitive dependents.
    pub fn mark_failed(&mut self, id: &str, reason: &str) {
        if let Some(job) = self.job_mut(id) {
            job.state = JobState::Failed;
            job.completed_at = Some(Utc::now());
            job.failure = Some(reason.to_string());
        }
        for dependent in self.transitive_dependents(id) {
            if let Some(job) = self.job_mut(&dependent) {
                if !job.state.is_terminal() {
                    job.state = JobState::Skipped;
                    job.completed_at = Some(Utc::now());
                }
            }
        }
    }

    /// Mark every non-terminal job `Cancelled`. Callers decide separately
    /// which running jobs may finish first.
    pub fn cancel_pending_jobs(&mut self) {
        for job in &mut self.jobs {
            if job.state == JobState::Pending {
                job.state = JobState::Cancelled;
                job.completed_at = Some(Utc::now());
            }
        }
    }

    /// Cancel one job directly (a suspended gate the scheduler aborts).
    pub fn mark_cancelled(&mut self, id: &str) {
        if let Some(job) = self.job_mut(id) {
            if !job.state.is_terminal() {
                job.state = JobState::Cancelled;
                job.completed_at = Some(Utc::now());
            }
        }
    }

    /// All jobs downstream of `id`, directly or transitively.
    fn transitive_dependents(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut frontier: Vec<&str> = vec![id];
        while let Some(current) = frontier.pop() {
            for job in &self.jobs {
                if job.depends_on.iter().any(|d| d == current) && seen.insert(&job.id) {
                    out.push(job.id.clone());
                    frontier.push(&job.id);
                }
            }
        }
        out
    }

    pub fn all_jobs_terminal(&self) -> bool {
        self.jobs.iter().all(|j| j.state.is_terminal())
    }

    pub fn has_running_jobs(&self) -> bool {
        self.jobs.iter().any(|j| j.state == JobState::Running)
    }

    /// Derive the terminal run state once every job is terminal: any failed
    /// leaf fails the run; a run whose cancellation actually stopped a job
    /// is cancelled. A cancel request that arrived after every job already
    /// finished leaves the run succeeded.
    pub fn resolve_state(&mut self) {
        if !self.all_jobs_terminal() {
            return;
        }
        self.state = if self.jobs.iter().any(|j| j.state == JobState::Failed) {
            RunState::Failed
        } else if self.jobs.iter().any(|j| j.state == JobState::Cancelled) {
            RunState::Cancelled
        } else {
            RunState::Succeeded
        };
        self.completed_at = Some(Utc::now());
    }
}
