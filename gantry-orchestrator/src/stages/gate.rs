//! Approval gate stage
//!
//! The one stage that suspends on external input. The gate job awaits the
//! reviewer decision as a future with explicit outcomes (`Approved`,
//! `Rejected`, `Expired`), never a flag that could blur "not yet requested"
//! and "rejected". Rejection and expiry fail the gate, which skips the
//! dependent apply.

use uuid::Uuid;

use gantry_core::domain::approval::ApprovalState;
use gantry_core::domain::environment::EnvName;

use crate::context::Context;
use crate::stages::{StageError, fetch_run};

pub async fn execute(ctx: &Context, run_id: Uuid, environment: EnvName) -> Result<(), StageError> {
    let run = fetch_run(ctx, run_id).await?;
    let job_id = format!("gate-{}", environment);

    let (ticket, receiver) = ctx
        .approvals
        .request(run_id, environment, run.trigger.initiator.clone())
        .await;
    ctx.events
        .record(
            run_id,
            Some(&job_id),
            format!(
                "awaiting approval for {} (token {})",
                environment, ticket.token
            ),
        )
        .await;

    let outcome = match ctx.config.approval_timeout {
        Some(deadline) => match tokio::time::timeout(deadline, receiver).await {
            Ok(decision) => decision.unwrap_or(ApprovalState::Expired),
            Err(_) => {
                ctx.approvals.expire(ticket.token).await;
                ApprovalState::Expired
            }
        },
        // No orchestrator-enforced deadline; the surrounding scheduling
        // system owns any further timeout.
        None => receiver.await.unwrap_or(ApprovalState::Expired),
    };

    match outcome {
        ApprovalState::Approved => {
            let resolved = ctx.approvals.get(ticket.token).await;
            ctx.events
                .record(
                    run_id,
                    Some(&job_id),
                    format!(
                        "approved by {}",
                        resolved
                            .and_then(|t| t.resolved_by)
                            .unwrap_or_else(|| "<unknown>".to_string())
                    ),
                )
                .await;
            Ok(())
        }
        ApprovalState::Rejected => {
            let resolved = ctx.approvals.get(ticket.token).await;
            Err(StageError::ApprovalRejected {
                reviewer: resolved.and_then(|t| t.resolved_by),
            })
        }
        ApprovalState::Expired => Err(StageError::ApprovalExpired),
        ApprovalState::Pending => Err(StageError::ApprovalExpired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use gantry_core::domain::approval::ApprovalDecision;
    use gantry_core::domain::environment::DeploymentMode;
    use gantry_core::domain::run::PipelineRun;
    use gantry_core::domain::trigger::{TriggerContext, TriggerKind};
    use std::time::Duration;

    fn tag_trigger(initiator: Option<&str>) -> TriggerContext {
        TriggerContext {
            kind: TriggerKind::Tag,
            ref_name: "v1.2.0".to_string(),
            commit_sha: "abc123def456".to_string(),
            version_tag: Some("v1.2.0".to_string()),
            initiator: initiator.map(String::from),
        }
    }

    fn production_ctx() -> Context {
        Context::new(Config::new(
            DeploymentMode::Production,
            vec!["sre@example.com".to_string()],
        ))
    }

    async fn insert_run(ctx: &Context, initiator: Option<&str>) -> Uuid {
        let run = PipelineRun::new(tag_trigger(initiator), DeploymentMode::Production);
        let id = run.id;
        ctx.runs.insert(run).await;
        id
    }

    #[tokio::test]
    async fn test_gate_succeeds_on_approval() {
        let ctx = production_ctx();
        let run_id = insert_run(&ctx, Some("dev@example.com")).await;

        let gate_ctx = ctx.clone();
        let gate = tokio::spawn(async move { execute(&gate_ctx, run_id, EnvName::Prod).await });

        // Wait for the ticket to show up, then approve it.
        let token = loop {
            if let Some(ticket) = ctx.approvals.ticket_for_run(run_id, EnvName::Prod).await {
                break ticket.token;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        ctx.approvals
            .resolve(token, "sre@example.com", ApprovalDecision::Approved)
            .await
            .unwrap();

        gate.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_gate_fails_on_rejection_with_reviewer() {
        let ctx = production_ctx();
        let run_id = insert_run(&ctx, None).await;

        let gate_ctx = ctx.clone();
        let gate = tokio::spawn(async move { execute(&gate_ctx, run_id, EnvName::Prod).await });

        let token = loop {
            if let Some(ticket) = ctx.approvals.ticket_for_run(run_id, EnvName::Prod).await {
                break ticket.token;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        ctx.approvals
            .resolve(token, "sre@example.com", ApprovalDecision::Rejected)
            .await
            .unwrap();

        let err = gate.await.unwrap().unwrap_err();
        match err {
            StageError::ApprovalRejected { reviewer } => {
                assert_eq!(reviewer.as_deref(), Some("sre@example.com"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_gate_expires_after_configured_deadline() {
        let mut config = Config::new(
            DeploymentMode::Production,
            vec!["sre@example.com".to_string()],
        );
        config.approval_timeout = Some(Duration::from_millis(50));
        let ctx = Context::new(config);
        let run_id = insert_run(&ctx, None).await;

        let err = execute(&ctx, run_id, EnvName::Prod).await.unwrap_err();
        assert!(matches!(err, StageError::ApprovalExpired));

        let ticket = ctx
            .approvals
            .ticket_for_run(run_id, EnvName::Prod)
            .await
            .unwrap();
        assert_eq!(ticket.state, ApprovalState::Expired);
    }
}
