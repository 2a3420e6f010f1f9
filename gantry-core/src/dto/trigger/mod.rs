//! Trigger DTOs for event ingestion

use serde::{Deserialize, Serialize};

use crate::domain::trigger::SourceEvent;

/// Request to submit a source-control event to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTrigger {
    pub event_kind: String,
    pub ref_name: String,
    pub commit_sha: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub initiator: Option<String>,
}

impl From<SubmitTrigger> for SourceEvent {
    fn from(req: SubmitTrigger) -> Self {
        SourceEvent {
            event_kind: req.event_kind,
            ref_name: req.ref_name,
            commit_sha: req.commit_sha,
            action: req.action,
            tag: req.tag,
            initiator: req.initiator,
        }
    }
}
