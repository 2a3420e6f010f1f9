//! Remote state collaborator
//!
//! Each environment owns one remote state blob. The backend provides
//! per-environment mutual exclusion natively: an apply opens a transaction
//! that holds the environment's lock until the commit lands or fails, and a
//! second apply for the same environment queues behind it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use gantry_core::domain::artifact::ArtifactDigest;
use gantry_core::domain::environment::EnvName;

/// Remote state of one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvState {
    pub environment: EnvName,
    /// Digest currently deployed; the rollback-safe default for the next
    /// run's plan when no explicit digest is supplied.
    pub deployed_digest: Option<ArtifactDigest>,
    /// Monotonic commit counter.
    pub serial: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EnvState {
    pub fn empty(environment: EnvName) -> Self {
        Self {
            environment,
            deployed_digest: None,
            serial: 0,
            updated_at: None,
        }
    }
}

/// Desired configuration for one environment, parameterized by the digest to
/// deploy. Serialized into the plan payload and applied verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredState {
    pub environment: EnvName,
    pub digest: ArtifactDigest,
}

/// Errors surfaced by the state backend.
#[derive(Debug)]
pub enum StateError {
    UnknownEnvironment(EnvName),
    /// The desired-state payload does not decode or targets the wrong
    /// environment.
    MalformedDesiredState(String),
    /// The backend's commit protocol failed; remote state is whatever it
    /// left behind.
    CommitFailed(String),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::UnknownEnvironment(env) => {
                write!(f, "no state backend for environment {}", env)
            }
            StateError::MalformedDesiredState(msg) => {
                write!(f, "malformed desired state: {}", msg)
            }
            StateError::CommitFailed(msg) => write!(f, "state commit failed: {}", msg),
        }
    }
}

impl std::error::Error for StateError {}

/// An open apply transaction: the environment's lock is held from creation
/// until `commit` returns or the transaction is dropped.
#[async_trait]
pub trait StateTransaction: Send {
    /// State as of lock acquisition.
    fn current(&self) -> &EnvState;

    /// Commit the desired state, releasing the lock.
    async fn commit(self: Box<Self>, desired: DesiredState) -> Result<EnvState, StateError>;
}

/// Remote state backend contract.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read an environment's state without locking. Plan stages only ever
    /// call this.
    async fn read(&self, environment: EnvName) -> Result<EnvState, StateError>;

    /// Open an apply transaction, waiting for the environment's lock.
    async fn begin_apply(
        &self,
        environment: EnvName,
    ) -> Result<Box<dyn StateTransaction>, StateError>;
}

/// In-memory standard state backend.
pub struct InMemoryStateBackend {
    states: HashMap<EnvName, Arc<Mutex<EnvState>>>,
}

impl InMemoryStateBackend {
    pub fn new() -> Self {
        let mut states = HashMap::new();
        for env in [EnvName::Dev, EnvName::Stage, EnvName::Prod] {
            states.insert(env, Arc::new(Mutex::new(EnvState::empty(env))));
        }
        Self { states }
    }
}

impl Default for InMemoryStateBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for InMemoryStateBackend {
    async fn read(&self, environment: EnvName) -> Result<EnvState, StateError> {
        let state = self
            .states
            .get(&environment)
            .ok_or(StateError::UnknownEnvironment(environment))?;
        Ok(state.lock().await.clone())
    }

    async fn begin_apply(
        &self,
        environment: EnvName,
    ) -> Result<Box<dyn StateTransaction>, StateError> {
        let state = self
            .states
            .get(&environment)
            .ok_or(StateError::UnknownEnvironment(environment))?;
        let guard = Arc::clone(state).lock_owned().await;
        Ok(Box::new(InMemoryTransaction { guard }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<EnvState>,
}

#[async_trait]
impl StateTransaction for InMemoryTransaction {
    fn current(&self) -> &EnvState {
        &self.guard
    }

    async fn commit(self: Box<Self>, desired: DesiredState) -> Result<EnvState, StateError> {
        let mut guard = self.guard;
        if desired.environment != guard.environment {
            return Err(StateError::MalformedDesiredState(format!(
                "desired state targets {} but transaction owns {}",
                desired.environment, guard.environment
            )));
        }

        guard.deployed_digest = Some(desired.digest);
        guard.serial += 1;
        guard.updated_at = Some(Utc::now());
        Ok(guard.clone())
    }
}
