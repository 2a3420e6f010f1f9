//! Orchestrator context
//!
//! Bundles the repositories and collaborator handles every stage and API
//! handler needs. Cloning is cheap; all fields are shared handles.

use std::sync::Arc;

use crate::config::Config;
use crate::repository::{EventRepository, PlanRepository, RunRepository};
use crate::service::{
    ApprovalService, InMemoryStateBackend, RegistrySet, SourceBuilder, StandardSourceBuilder,
    StateBackend,
};

/// Shared orchestrator state, used as the axum router state.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub runs: RunRepository,
    pub plans: PlanRepository,
    pub events: EventRepository,
    pub approvals: ApprovalService,
    pub registries: RegistrySet,
    pub state: Arc<dyn StateBackend>,
    pub builder: Arc<dyn SourceBuilder>,
}

impl Context {
    /// Wire up a context with the standard in-memory collaborators.
    pub fn new(config: Config) -> Self {
        let approvals = ApprovalService::new(config.reviewers.clone());
        Self {
            config: Arc::new(config),
            runs: RunRepository::new(),
            plans: PlanRepository::new(),
            events: EventRepository::new(),
            approvals,
            registries: RegistrySet::in_memory(),
            state: Arc::new(InMemoryStateBackend::new()),
            builder: Arc::new(StandardSourceBuilder::new()),
        }
    }
}
