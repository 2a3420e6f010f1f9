//! Plan Repository
//!
//! Saved plans, keyed by `(run, environment)`. A plan is produced exactly
//! once by a Plan stage and consumed exactly once by the paired Apply;
//! consuming removes it, so a second apply attempt fails closed.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use gantry_core::domain::environment::EnvName;
use gantry_core::domain::plan::PlanArtifact;

/// In-memory saved-plan store, cheap to clone.
#[derive(Clone, Default)]
pub struct PlanRepository {
    inner: Arc<RwLock<HashMap<(Uuid, EnvName), PlanArtifact>>>,
}

impl PlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, run_id: Uuid, plan: PlanArtifact) {
        self.inner
            .write()
            .await
            .insert((run_id, plan.environment), plan);
    }

    /// Remove and return the plan for `(run, environment)`.
    pub async fn consume(&self, run_id: Uuid, environment: EnvName) -> Option<PlanArtifact> {
        self.inner.write().await.remove(&(run_id, environment))
    }

    pub async fn peek(&self, run_id: Uuid, environment: EnvName) -> Option<PlanArtifact> {
        self.inner.read().await.get(&(run_id, environment)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::artifact::ArtifactDigest;
    use gantry_core::domain::plan::ChangeSummary;

    fn sample_plan(environment: EnvName) -> PlanArtifact {
        PlanArtifact::new(
            environment,
            ArtifactDigest::from_bytes(b"image"),
            ChangeSummary::default(),
            vec![],
            7,
        )
    }

    #[tokio::test]
    async fn test_store_and_consume() {
        let repo = PlanRepository::new();
        let run_id = Uuid::new_v4();

        repo.store(run_id, sample_plan(EnvName::Dev)).await;
        assert!(repo.peek(run_id, EnvName::Dev).await.is_some());

        let consumed = repo.consume(run_id, EnvName::Dev).await;
        assert!(consumed.is_some());
    }

    #[tokio::test]
    async fn test_consume_is_exactly_once() {
        let repo = PlanRepository::new();
        let run_id = Uuid::new_v4();

        repo.store(run_id, sample_plan(EnvName::Dev)).await;
        assert!(repo.consume(run_id, EnvName::Dev).await.is_some());
        assert!(repo.consume(run_id, EnvName::Dev).await.is_none());
    }

    #[tokio::test]
    async fn test_plans_are_environment_scoped() {
        let repo = PlanRepository::new();
        let run_id = Uuid::new_v4();

        repo.store(run_id, sample_plan(EnvName::Dev)).await;
        assert!(repo.consume(run_id, EnvName::Stage).await.is_none());
        assert!(repo.consume(run_id, EnvName::Dev).await.is_some());
    }
}
