//! Service Module
//!
//! Business logic and external-collaborator contracts for the orchestrator.
//! Collaborators (registry, remote state, builder) are trait-based to enable
//! testing and dependency injection; the standard implementations here are
//! in-memory.

pub mod approval;
pub mod builder;
pub mod registry;
pub mod run;
pub mod state;

pub use approval::ApprovalService;
pub use builder::{SourceBuilder, StandardSourceBuilder};
pub use registry::RegistrySet;
pub use run as run_service;
pub use state::{InMemoryStateBackend, StateBackend};
