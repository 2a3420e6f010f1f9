//! Artifact domain types
//!
//! Artifacts are content-addressed: the digest is computed from the
//! published bytes and is the only identity the apply path trusts. Tags are
//! mutable pointers onto digests and exist for humans.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::environment::EnvName;

/// Content-addressed identifier of a published artifact.
///
/// Immutable binding to exact bytes: a digest, once present in a registry,
/// is never reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactDigest(String);

impl ArtifactDigest {
    /// Compute the digest of artifact bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        ArtifactDigest(format!("sha256:{:x}", hash))
    }

    /// Parse a digest reference, validating its shape.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.strip_prefix("sha256:") {
            Some(hex) if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                Ok(ArtifactDigest(s.to_string()))
            }
            _ => Err(format!("malformed digest reference: {}", s)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A published artifact: digest plus the human tags pointing at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub digest: ArtifactDigest,
    pub tags: BTreeSet<String>,
    /// Environment whose registry this artifact was read from.
    pub source_environment: EnvName,
}
