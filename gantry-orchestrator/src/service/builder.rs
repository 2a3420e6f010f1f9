//! Source builder collaborator
//!
//! Turns a source commit into deployable artifact bytes. The actual build
//! system (compiler, packager) is opaque to the orchestrator; what matters
//! is that identical commits produce identical bytes, so the content digest
//! is stable.

use async_trait::async_trait;
use std::fmt;

/// Build failure, fatal to the run.
#[derive(Debug, Clone)]
pub struct BuildError(pub String);

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build failed: {}", self.0)
    }
}

impl std::error::Error for BuildError {}

/// Service trait for producing artifact bytes from source.
#[async_trait]
pub trait SourceBuilder: Send + Sync {
    async fn build(&self, commit_sha: &str) -> Result<Vec<u8>, BuildError>;
}

/// Standard implementation producing a deterministic artifact manifest.
pub struct StandardSourceBuilder;

impl StandardSourceBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StandardSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceBuilder for StandardSourceBuilder {
    async fn build(&self, commit_sha: &str) -> Result<Vec<u8>, BuildError> {
        if commit_sha.is_empty() {
            return Err(BuildError("empty commit sha".to_string()));
        }
        let manifest = serde_json::json!({
            "source_commit": commit_sha,
            "kind": "gantry-image",
        });
        serde_json::to_vec(&manifest).map_err(|e| BuildError(e.to_string()))
    }
}

/// Builder that always fails, for exercising the failure cascade.
pub struct FailingSourceBuilder {
    pub reason: String,
}

#[async_trait]
impl SourceBuilder for FailingSourceBuilder {
    async fn build(&self, _commit_sha: &str) -> Result<Vec<u8>, BuildError> {
        Err(BuildError(self.reason.clone()))
    }
}
