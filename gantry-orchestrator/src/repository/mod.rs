//! Repository Module
//!
//! Storage layer for the orchestrator. The orchestrator keeps no long-lived
//! state of its own: runs, saved plans, and run events live in process
//! memory; durable state belongs to the per-environment remote state and the
//! registries.

pub mod event;
pub mod plan;
pub mod run;

pub use event::EventRepository;
pub use plan::PlanRepository;
pub use run::RunRepository;
