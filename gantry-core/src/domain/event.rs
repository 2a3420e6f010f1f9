//! Run event domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a run's timeline: job transitions, stage findings, gate
/// activity. Recorded by the orchestrator, surfaced through the API and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub timestamp: DateTime<Utc>,
    /// Job the entry belongs to; `None` for run-level entries.
    pub job_id: Option<String>,
    pub message: String,
}

impl RunEvent {
    pub fn now(job_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            job_id: job_id.map(String::from),
            message: message.into(),
        }
    }
}
