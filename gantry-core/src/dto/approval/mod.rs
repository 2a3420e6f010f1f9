//! Approval DTOs

use serde::{Deserialize, Serialize};

use crate::domain::approval::ApprovalDecision;

/// Request to resolve an outstanding approval ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveApproval {
    /// Reviewer identity; must belong to the configured reviewer set and
    /// must not be the run's initiator.
    pub reviewer: String,
    pub decision: ApprovalDecision,
}
