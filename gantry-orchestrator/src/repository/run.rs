//! Run Repository
//!
//! Keeps the pipeline runs the orchestrator knows about. Mutations go
//! through [`RunRepository::update`] so every state change happens under one
//! write lock.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use gantry_core::domain::run::PipelineRun;

/// In-memory run store, cheap to clone.
#[derive(Clone, Default)]
pub struct RunRepository {
    inner: Arc<RwLock<HashMap<Uuid, PipelineRun>>>,
}

impl RunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, run: PipelineRun) {
        self.inner.write().await.insert(run.id, run);
    }

    pub async fn get(&self, id: Uuid) -> Option<PipelineRun> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Apply a mutation to a stored run under the write lock, returning the
    /// closure's result. `None` if the run does not exist.
    pub async fn update<F, R>(&self, id: Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut PipelineRun) -> R,
    {
        self.inner.write().await.get_mut(&id).map(f)
    }

    /// All runs, newest first.
    pub async fn list(&self) -> Vec<PipelineRun> {
        let mut runs: Vec<PipelineRun> = self.inner.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs
    }
}
