//! Event Repository
//!
//! Per-run timeline entries, appended by the scheduler and stages, read by
//! the API and CLI.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use gantry_core::domain::event::RunEvent;

/// In-memory run event log, cheap to clone.
#[derive(Clone, Default)]
pub struct EventRepository {
    inner: Arc<RwLock<HashMap<Uuid, Vec<RunEvent>>>>,
}

impl EventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, run_id: Uuid, job_id: Option<&str>, message: impl Into<String>) {
        let event = RunEvent::now(job_id, message);
        tracing::debug!(run = %run_id, job = ?event.job_id, "{}", event.message);
        self.inner.write().await.entry(run_id).or_default().push(event);
    }

    pub async fn list(&self, run_id: Uuid) -> Vec<RunEvent> {
        self.inner
            .read()
            .await
            .get(&run_id)
            .cloned()
            .unwrap_or_default()
    }
}
