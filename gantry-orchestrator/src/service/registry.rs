//! Artifact registry collaborator
//!
//! Each environment owns a content-addressed registry. Digests bind
//! immutably to bytes; tags are mutable pointers. Retention and
//! garbage-collection belong to the registry and surface here only as
//! `NotFound`.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use gantry_core::domain::artifact::ArtifactDigest;
use gantry_core::domain::environment::EnvName;

/// Errors surfaced by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Digest or tag absent: deleted, never published, or expired by the
    /// registry's retention policy.
    NotFound { registry: String, reference: String },
    /// The caller's credentials cannot write to this registry.
    WriteDenied { registry: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotFound {
                registry,
                reference,
            } => write!(f, "{} not found in registry {}", reference, registry),
            RegistryError::WriteDenied { registry } => {
                write!(f, "write to registry {} denied", registry)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Content-addressed artifact registry contract.
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// Registry reference used in error reporting.
    fn registry_ref(&self) -> &str;

    /// Publish bytes under the given tags; returns the content digest.
    /// Publishing existing bytes is idempotent and merges tags.
    async fn publish(
        &self,
        bytes: &[u8],
        tags: &BTreeSet<String>,
    ) -> Result<ArtifactDigest, RegistryError>;

    /// Fetch the exact bytes bound to a digest.
    async fn pull(&self, digest: &ArtifactDigest) -> Result<Vec<u8>, RegistryError>;

    /// Look up the digest a human tag currently points at.
    async fn resolve_tag(&self, tag: &str) -> Result<ArtifactDigest, RegistryError>;

    /// All tags currently pointing at a digest.
    async fn list_tags(&self, digest: &ArtifactDigest) -> Result<BTreeSet<String>, RegistryError>;
}

#[derive(Default)]
struct RegistryContents {
    blobs: HashMap<ArtifactDigest, Vec<u8>>,
    tags: HashMap<String, ArtifactDigest>,
}

/// In-memory standard registry implementation.
pub struct InMemoryRegistry {
    registry_ref: String,
    read_only: bool,
    contents: RwLock<RegistryContents>,
}

impl InMemoryRegistry {
    pub fn new(registry_ref: impl Into<String>) -> Self {
        Self {
            registry_ref: registry_ref.into(),
            read_only: false,
            contents: RwLock::new(RegistryContents::default()),
        }
    }

    /// A registry that refuses writes, for exercising authorization
    /// failures.
    pub fn read_only(registry_ref: impl Into<String>) -> Self {
        Self {
            read_only: true,
            ..Self::new(registry_ref)
        }
    }

    /// Drop a digest and its tags, as the registry's retention policy would.
    pub async fn evict(&self, digest: &ArtifactDigest) {
        let mut contents = self.contents.write().await;
        contents.blobs.remove(digest);
        contents.tags.retain(|_, d| d != digest);
    }
}

#[async_trait]
impl ArtifactRegistry for InMemoryRegistry {
    fn registry_ref(&self) -> &str {
        &self.registry_ref
    }

    async fn publish(
        &self,
        bytes: &[u8],
        tags: &BTreeSet<String>,
    ) -> Result<ArtifactDigest, RegistryError> {
        if self.read_only {
            return Err(RegistryError::WriteDenied {
                registry: self.registry_ref.clone(),
            });
        }

        let digest = ArtifactDigest::from_bytes(bytes);
        let mut contents = self.contents.write().await;
        contents
            .blobs
            .entry(digest.clone())
            .or_insert_with(|| bytes.to_vec());
        for tag in tags {
            contents.tags.insert(tag.clone(), digest.clone());
        }
        Ok(digest)
    }

    async fn pull(&self, digest: &ArtifactDigest) -> Result<Vec<u8>, RegistryError> {
        self.contents
            .read()
            .await
            .blobs
            .get(digest)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                registry: self.registry_ref.clone(),
                reference: digest.to_string(),
            })
    }

    async fn resolve_tag(&self, tag: &str) -> Result<ArtifactDigest, RegistryError> {
        self.contents
            .read()
            .await
            .tags
            .get(tag)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                registry: self.registry_ref.clone(),
                reference: tag.to_string(),
            })
    }

    async fn list_tags(&self, digest: &ArtifactDigest) -> Result<BTreeSet<String>, RegistryError> {
        let contents = self.contents.read().await;
        if !contents.blobs.contains_key(digest) {
            return Err(RegistryError::NotFound {
                registry: self.registry_ref.clone(),
                reference: digest.to_string(),
            });
        }
        Ok(contents
            .tags
            .iter()
            .filter(|(_, d)| *d == digest)
            .map(|(t, _)| t.clone())
            .collect())
    }
}

/// One registry per environment.
#[derive(Clone)]
pub struct RegistrySet {
    registries: Arc<HashMap<EnvName, Arc<dyn ArtifactRegistry>>>,
}

impl RegistrySet {
    pub fn new(registries: HashMap<EnvName, Arc<dyn ArtifactRegistry>>) -> Self {
        Self {
            registries: Arc::new(registries),
        }
    }

    /// In-memory registries for every environment.
    pub fn in_memory() -> Self {
        let mut registries: HashMap<EnvName, Arc<dyn ArtifactRegistry>> = HashMap::new();
        for env in [EnvName::Dev, EnvName::Stage, EnvName::Prod] {
            registries.insert(
                env,
                Arc::new(InMemoryRegistry::new(format!("registry/{}", env))),
            );
        }
        Self::new(registries)
    }

    pub fn for_env(&self, env: EnvName) -> Arc<dyn ArtifactRegistry> {
        Arc::clone(
            self.registries
                .get(&env)
                .unwrap_or_else(|| panic!("no registry configured for {}", env)),
        )
    }
}
