//! Approval gate service
//!
//! The production apply waits on an explicit reviewer decision. The gate is
//! modeled as a future the gate job awaits; `Pending` is a channel that has
//! not fired, never an ambiguous boolean. Reviewers are a configured set
//! distinct from the run's initiator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

use gantry_core::domain::approval::{ApprovalDecision, ApprovalState, ApprovalTicket};
use gantry_core::domain::environment::EnvName;

/// Errors from resolving an approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    NotFound(Uuid),
    AlreadyResolved(Uuid),
    NotAReviewer(String),
    SelfApproval(String),
}

impl fmt::Display for ApprovalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalError::NotFound(token) => write!(f, "approval {} not found", token),
            ApprovalError::AlreadyResolved(token) => {
                write!(f, "approval {} is already resolved", token)
            }
            ApprovalError::NotAReviewer(who) => {
                write!(f, "{} is not in the reviewer set", who)
            }
            ApprovalError::SelfApproval(who) => {
                write!(f, "{} initiated this run and cannot approve it", who)
            }
        }
    }
}

impl std::error::Error for ApprovalError {}

struct Gate {
    ticket: ApprovalTicket,
    /// Initiator of the run the ticket belongs to; forbidden from resolving.
    initiator: Option<String>,
    /// Present while the gate job is still waiting.
    sender: Option<oneshot::Sender<ApprovalState>>,
}

/// Approval checkpoint registry, cheap to clone.
#[derive(Clone)]
pub struct ApprovalService {
    reviewers: Arc<Vec<String>>,
    gates: Arc<Mutex<HashMap<Uuid, Gate>>>,
}

impl ApprovalService {
    pub fn new(reviewers: Vec<String>) -> Self {
        Self {
            reviewers: Arc::new(reviewers),
            gates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a pending checkpoint for a run. Returns the ticket and the
    /// receiver the gate job awaits.
    pub async fn request(
        &self,
        run_id: Uuid,
        environment: EnvName,
        initiator: Option<String>,
    ) -> (ApprovalTicket, oneshot::Receiver<ApprovalState>) {
        let ticket = ApprovalTicket::new(run_id, environment);
        let (sender, receiver) = oneshot::channel();
        self.gates.lock().await.insert(
            ticket.token,
            Gate {
                ticket: ticket.clone(),
                initiator,
                sender: Some(sender),
            },
        );
        tracing::info!(run = %run_id, token = %ticket.token, "approval requested for {}", environment);
        (ticket, receiver)
    }

    /// Resolve a pending checkpoint with a reviewer decision.
    pub async fn resolve(
        &self,
        token: Uuid,
        reviewer: &str,
        decision: ApprovalDecision,
    ) -> Result<ApprovalTicket, ApprovalError> {
        let mut gates = self.gates.lock().await;
        let gate = gates.get_mut(&token).ok_or(ApprovalError::NotFound(token))?;

        if gate.ticket.state.is_resolved() {
            return Err(ApprovalError::AlreadyResolved(token));
        }
        if !self.reviewers.iter().any(|r| r == reviewer) {
            return Err(ApprovalError::NotAReviewer(reviewer.to_string()));
        }
        if gate.initiator.as_deref() == Some(reviewer) {
            return Err(ApprovalError::SelfApproval(reviewer.to_string()));
        }

        let state = match decision {
            ApprovalDecision::Approved => ApprovalState::Approved,
            ApprovalDecision::Rejected => ApprovalState::Rejected,
        };
        gate.ticket.state = state;
        gate.ticket.resolved_by = Some(reviewer.to_string());
        gate.ticket.resolved_at = Some(chrono::Utc::now());

        if let Some(sender) = gate.sender.take() {
            // The gate job may already be gone (run cancelled); the decision
            // is still recorded on the ticket.
            let _ = sender.send(state);
        }

        tracing::info!(token = %token, reviewer = reviewer, "approval resolved {:?}", state);
        Ok(gate.ticket.clone())
    }

    /// Expire a pending checkpoint (deadline elapsed).
    pub async fn expire(&self, token: Uuid) -> Option<ApprovalTicket> {
        let mut gates = self.gates.lock().await;
        let gate = gates.get_mut(&token)?;
        if gate.ticket.state.is_resolved() {
            return Some(gate.ticket.clone());
        }
        gate.ticket.state = ApprovalState::Expired;
        gate.ticket.resolved_at = Some(chrono::Utc::now());
        if let Some(sender) = gate.sender.take() {
            let _ = sender.send(ApprovalState::Expired);
        }
        Some(gate.ticket.clone())
    }

    pub async fn get(&self, token: Uuid) -> Option<ApprovalTicket> {
        self.gates.lock().await.get(&token).map(|g| g.ticket.clone())
    }

    /// The checkpoint registered for `(run, environment)`, if any.
    pub async fn ticket_for_run(&self, run_id: Uuid, environment: EnvName) -> Option<ApprovalTicket> {
        self.gates
            .lock()
            .await
            .values()
            .find(|g| g.ticket.run_id == run_id && g.ticket.environment == environment)
            .map(|g| g.ticket.clone())
    }

    /// All checkpoints still awaiting a decision.
    pub async fn pending(&self) -> Vec<ApprovalTicket> {
        let mut tickets: Vec<ApprovalTicket> = self
            .gates
            .lock()
            .await
            .values()
            .filter(|g| g.ticket.state == ApprovalState::Pending)
            .map(|g| g.ticket.clone())
            .collect();
        tickets.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        tickets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ApprovalService {
        ApprovalService::new(vec!["sre@example.com".to_string(), "lead@example.com".to_string()])
    }

    #[tokio::test]
    async fn test_approve_fires_the_gate() {
        let svc = service();
        let (ticket, receiver) = svc
            .request(Uuid::new_v4(), EnvName::Prod, Some("dev@example.com".to_string()))
            .await;

        svc.resolve(ticket.token, "sre@example.com", ApprovalDecision::Approved)
            .await
            .unwrap();

        assert_eq!(receiver.await.unwrap(), ApprovalState::Approved);
    }

    #[tokio::test]
    async fn test_reject_fires_the_gate() {
        let svc = service();
        let (ticket, receiver) = svc.request(Uuid::new_v4(), EnvName::Prod, None).await;

        svc.resolve(ticket.token, "lead@example.com", ApprovalDecision::Rejected)
            .await
            .unwrap();

        assert_eq!(receiver.await.unwrap(), ApprovalState::Rejected);
    }

    #[tokio::test]
    async fn test_non_reviewer_cannot_resolve() {
        let svc = service();
        let (ticket, _receiver) = svc.request(Uuid::new_v4(), EnvName::Prod, None).await;

        let err = svc
            .resolve(ticket.token, "stranger@example.com", ApprovalDecision::Approved)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApprovalError::NotAReviewer("stranger@example.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_initiator_cannot_self_approve() {
        let svc = service();
        let (ticket, _receiver) = svc
            .request(Uuid::new_v4(), EnvName::Prod, Some("sre@example.com".to_string()))
            .await;

        let err = svc
            .resolve(ticket.token, "sre@example.com", ApprovalDecision::Approved)
            .await
            .unwrap_err();
        assert_eq!(err, ApprovalError::SelfApproval("sre@example.com".to_string()));

        // Another reviewer may still approve.
        svc.resolve(ticket.token, "lead@example.com", ApprovalDecision::Approved)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resolution_is_exactly_once() {
        let svc = service();
        let (ticket, _receiver) = svc.request(Uuid::new_v4(), EnvName::Prod, None).await;

        svc.resolve(ticket.token, "sre@example.com", ApprovalDecision::Rejected)
            .await
            .unwrap();
        let err = svc
            .resolve(ticket.token, "lead@example.com", ApprovalDecision::Approved)
            .await
            .unwrap_err();
        assert_eq!(err, ApprovalError::AlreadyResolved(ticket.token));
    }

    #[tokio::test]
    async fn test_expire_pending_gate() {
        let svc = service();
        let (ticket, receiver) = svc.request(Uuid::new_v4(), EnvName::Prod, None).await;

        svc.expire(ticket.token).await.unwrap();
        assert_eq!(receiver.await.unwrap(), ApprovalState::Expired);
        assert_eq!(
            svc.get(ticket.token).await.unwrap().state,
            ApprovalState::Expired
        );
    }

    #[tokio::test]
    async fn test_pending_listing() {
        let svc = service();
        let (first, _r1) = svc.request(Uuid::new_v4(), EnvName::Prod, None).await;
        let (second, _r2) = svc.request(Uuid::new_v4(), EnvName::Prod, None).await;

        svc.resolve(first.token, "sre@example.com", ApprovalDecision::Approved)
            .await
            .unwrap();

        let pending = svc.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].token, second.token);
    }
}
