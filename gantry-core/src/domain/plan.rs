//! Plan artifact domain types
//!
//! A plan is the persisted output of a Plan stage: the proposed change set
//! for one environment, computed against that environment's remote state for
//! a specific artifact digest. The paired Apply stage consumes it verbatim;
//! an apply that cannot find a live plan fails closed rather than re-planning.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::artifact::ArtifactDigest;
use crate::domain::environment::EnvName;

/// Counts of proposed resource changes, with a human-readable rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub creates: u32,
    pub updates: u32,
    pub destroys: u32,
    pub detail: String,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.creates == 0 && self.updates == 0 && self.destroys == 0
    }
}

/// Saved output of a Plan stage, consumed exactly once by the paired Apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanArtifact {
    pub id: Uuid,
    pub environment: EnvName,
    pub target_digest: ArtifactDigest,
    pub summary: ChangeSummary,
    /// Opaque serialized desired-state payload; applied verbatim.
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    /// Retention window in days. Expired plans are never applied.
    pub retention_days: i64,
}

impl PlanArtifact {
    pub fn new(
        environment: EnvName,
        target_digest: ArtifactDigest,
        summary: ChangeSummary,
        payload: Vec<u8>,
        retention_days: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            environment,
            target_digest,
            summary,
            payload,
            created_at: Utc::now(),
            retention_days,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(self.retention_days)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}
