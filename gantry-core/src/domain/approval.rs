//! Approval domain types
//!
//! The production apply is gated on an explicit reviewer decision. The gate
//! is a real state machine: `Pending` is distinct from `Rejected`, and a
//! ticket resolves exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::environment::EnvName;

/// Gate lifecycle: `Pending → Approved | Rejected | Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }
}

/// A reviewer's explicit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// One outstanding or resolved approval checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalTicket {
    pub token: Uuid,
    pub run_id: Uuid,
    pub environment: EnvName,
    pub state: ApprovalState,
    pub requested_at: DateTime<Utc>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalTicket {
    pub fn new(run_id: Uuid, environment: EnvName) -> Self {
        Self {
            token: Uuid::new_v4(),
            run_id,
            environment,
            state: ApprovalState::Pending,
            requested_at: Utc::now(),
            resolved_by: None,
            resolved_at: None,
        }
    }
}
