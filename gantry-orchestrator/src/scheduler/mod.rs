//! Run scheduler
//!
//! Drives one pipeline run's job graph to a terminal state. Ready jobs (all
//! dependencies succeeded) start concurrently, each in its own task under
//! the stage wall-clock budget. A failed job cascades `Skipped` through its
//! transitive dependents, and the run never retries anything; retry is a
//! fresh trigger.
//!
//! Cancellation prevents new stages from starting; an in-flight apply is
//! allowed to finish its state mutation. A suspended approval gate is the
//! exception: it mutates nothing and is aborted outright.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use gantry_core::domain::run::{JobInstance, StageKind};

use crate::context::Context;
use crate::stages::{self, StageError};

/// How often the driver re-checks for cancellation while jobs are in flight.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct RunScheduler;

impl RunScheduler {
    /// Spawn the driver task for a run.
    pub fn spawn(ctx: Context, run_id: Uuid) -> JoinHandle<()> {
        tokio::spawn(async move {
            Self::drive(ctx, run_id).await;
        })
    }

    async fn drive(ctx: Context, run_id: Uuid) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, Result<(), StageError>)>();
        // Every in-flight job, with whether it is a suspended gate (abortable
        // on cancellation; applies are not).
        let mut running: HashMap<String, (JoinHandle<()>, bool)> = HashMap::new();
        let mut cancel_handled = false;
        let mut poll = tokio::time::interval(POLL_INTERVAL);

        loop {
            let cancel_requested = ctx
                .runs
                .get(run_id)
                .await
                .map(|r| r.cancel_requested)
                .unwrap_or(false);

            if cancel_requested && !cancel_handled {
                cancel_handled = true;
                ctx.runs.update(run_id, |r| r.cancel_pending_jobs()).await;
                let gate_ids: Vec<String> = running
                    .iter()
                    .filter(|(_, (_, is_gate))| *is_gate)
                    .map(|(id, _)| id.clone())
                    .collect();
                for job_id in gate_ids {
                    if let Some((handle, _)) = running.remove(&job_id) {
                        handle.abort();
                    }
                    ctx.runs.update(run_id, |r| r.mark_cancelled(&job_id)).await;
                    ctx.events
                        .record(run_id, Some(&job_id), "cancelled while awaiting approval")
                        .await;
                }
            }

            if !cancel_handled {
                let ready = ctx
                    .runs
                    .update(run_id, |r| {
                        let ready = r.ready_jobs();
                        for job in &ready {
                            r.mark_running(&job.id);
                        }
                        ready
                    })
                    .await
                    .unwrap_or_default();

                for job in ready {
                    ctx.events.record(run_id, Some(&job.id), "started").await;
                    let is_gate = matches!(job.stage, StageKind::ApprovalGate { .. });
                    let job_id = job.id.clone();
                    let handle = Self::spawn_job(ctx.clone(), run_id, job, tx.clone());
                    running.insert(job_id, (handle, is_gate));
                }
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                completed = rx.recv() => {
                    let Some((job_id, outcome)) = completed else { break };
                    // Completions from jobs already aborted on cancellation
                    // are stale; the job state is settled.
                    if running.remove(&job_id).is_none() {
                        continue;
                    }
                    match outcome {
                        Ok(()) => {
                            ctx.runs.update(run_id, |r| r.mark_succeeded(&job_id)).await;
                            ctx.events.record(run_id, Some(&job_id), "succeeded").await;
                        }
                        Err(err) => {
                            let reason = err.to_string();
                            ctx.runs
                                .update(run_id, |r| r.mark_failed(&job_id, &reason))
                                .await;
                            ctx.events
                                .record(run_id, Some(&job_id), format!("failed: {}", reason))
                                .await;
                        }
                    }
                }
                _ = poll.tick() => {
                    // Fall through to re-check cancellation.
                }
            }
        }

        let final_state = ctx
            .runs
            .update(run_id, |r| {
                r.resolve_state();
                r.state
            })
            .await;
        if let Some(state) = final_state {
            ctx.events
                .record(run_id, None, format!("run finished: {:?}", state))
                .await;
            tracing::info!(run = %run_id, "run finished: {:?}", state);
        }
    }

    /// Execute one job under its wall-clock budget. The approval gate is
    /// exempt, being the single legitimate suspension point.
    fn spawn_job(
        ctx: Context,
        run_id: Uuid,
        job: JobInstance,
        tx: mpsc::UnboundedSender<(String, Result<(), StageError>)>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let budget = match job.stage {
                StageKind::ApprovalGate { .. } => None,
                _ => Some(ctx.config.stage_timeout),
            };

            let result = match budget {
                Some(limit) => {
                    match tokio::time::timeout(limit, stages::execute(&ctx, run_id, job.stage))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(StageError::TimedOut {
                            budget_secs: limit.as_secs(),
                        }),
                    }
                }
                None => stages::execute(&ctx, run_id, job.stage).await,
            };

            let _ = tx.send((job.id, result));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::service::builder::FailingSourceBuilder;
    use crate::service::registry::ArtifactRegistry;
    use crate::service::state::{DesiredState, StateBackend as _, StateTransaction as _};
    use gantry_core::domain::approval::ApprovalDecision;
    use gantry_core::domain::artifact::ArtifactDigest;
    use gantry_core::domain::environment::{DeploymentMode, EnvName};
    use gantry_core::domain::run::{JobState, PipelineRun, RunState};
    use gantry_core::domain::trigger::{TriggerContext, TriggerKind};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn trigger(kind: TriggerKind, version_tag: Option<&str>, initiator: Option<&str>) -> TriggerContext {
        TriggerContext {
            kind,
            ref_name: "main".to_string(),
            commit_sha: "abc123def456".to_string(),
            version_tag: version_tag.map(String::from),
            initiator: initiator.map(String::from),
        }
    }

    fn dev_ctx() -> Context {
        Context::new(Config::new(DeploymentMode::DevOnly, vec![]))
    }

    fn production_ctx() -> Context {
        Context::new(Config::new(
            DeploymentMode::Production,
            vec!["sre@example.com".to_string()],
        ))
    }

    async fn start_run(ctx: &Context, t: TriggerContext) -> Uuid {
        let run = PipelineRun::new(t, ctx.config.mode);
        let id = run.id;
        ctx.runs.insert(run).await;
        RunScheduler::spawn(ctx.clone(), id);
        id
    }

    async fn wait_terminal(ctx: &Context, run_id: Uuid) -> PipelineRun {
        loop {
            let run = ctx.runs.get(run_id).await.unwrap();
            if run.state.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn approve_when_requested(ctx: &Context, run_id: Uuid, decision: ApprovalDecision) {
        let token = loop {
            if let Some(ticket) = ctx.approvals.ticket_for_run(run_id, EnvName::Prod).await {
                break ticket.token;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        ctx.approvals
            .resolve(token, "sre@example.com", decision)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dev_only_merge_deploys_built_digest() {
        let ctx = dev_ctx();
        let run_id = start_run(&ctx, trigger(TriggerKind::Merge, None, None)).await;
        let run = wait_terminal(&ctx, run_id).await;

        assert_eq!(run.state, RunState::Succeeded);
        let digest = run.target_digest.clone().unwrap();

        // dev remote state records exactly the digest Build published.
        let state = ctx.state.read(EnvName::Dev).await.unwrap();
        assert_eq!(state.deployed_digest, Some(digest.clone()));

        // And the registry bytes hash back to it.
        let bytes = ctx
            .registries
            .for_env(EnvName::Dev)
            .pull(&digest)
            .await
            .unwrap();
        assert_eq!(ArtifactDigest::from_bytes(&bytes), digest);
    }

    #[tokio::test]
    async fn test_production_merge_deploys_dev_and_stage() {
        let ctx = production_ctx();
        let run_id = start_run(&ctx, trigger(TriggerKind::Merge, None, None)).await;
        let run = wait_terminal(&ctx, run_id).await;

        assert_eq!(run.state, RunState::Succeeded);
        let digest = run.target_digest.clone().unwrap();

        for env in [EnvName::Dev, EnvName::Stage] {
            let state = ctx.state.read(env).await.unwrap();
            assert_eq!(state.deployed_digest, Some(digest.clone()), "{}", env);
        }
        // Prod was never touched by a merge.
        assert_eq!(ctx.state.read(EnvName::Prod).await.unwrap().serial, 0);

        // Promotion carried the tag set into the stage registry.
        let tags = ctx
            .registries
            .for_env(EnvName::Stage)
            .list_tags(&digest)
            .await
            .unwrap();
        assert!(tags.contains("abc123d"));
        assert!(tags.contains("latest"));
    }

    #[tokio::test]
    async fn test_pull_request_applies_nothing() {
        for ctx in [dev_ctx(), production_ctx()] {
            let run_id = start_run(&ctx, trigger(TriggerKind::PullRequest, None, None)).await;
            let run = wait_terminal(&ctx, run_id).await;

            assert_eq!(run.state, RunState::Succeeded);
            assert!(!run.jobs.iter().any(|j| matches!(j.stage, StageKind::Apply { .. })));
            for env in [EnvName::Dev, EnvName::Stage, EnvName::Prod] {
                assert_eq!(ctx.state.read(env).await.unwrap().serial, 0);
            }
            // The report-only plan is not left behind for any apply.
            assert!(ctx.plans.peek(run_id, EnvName::Dev).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_tag_release_promotes_staged_digest_behind_approval() {
        let ctx = production_ctx();

        // A prior merge placed the artifact in the stage registry under the
        // commit's short sha.
        let tags: BTreeSet<String> = ["abc123d".to_string(), "latest".to_string()]
            .into_iter()
            .collect();
        let staged_digest = ctx
            .registries
            .for_env(EnvName::Stage)
            .publish(b"staged-image", &tags)
            .await
            .unwrap();

        let run_id = start_run(
            &ctx,
            trigger(TriggerKind::Tag, Some("v1.2.0"), Some("dev@example.com")),
        )
        .await;
        approve_when_requested(&ctx, run_id, ApprovalDecision::Approved).await;
        let run = wait_terminal(&ctx, run_id).await;

        assert_eq!(run.state, RunState::Succeeded);
        assert_eq!(
            ctx.state.read(EnvName::Prod).await.unwrap().deployed_digest,
            Some(staged_digest.clone())
        );

        // Prod registry holds identical bytes under the promoted tag set.
        let bytes = ctx
            .registries
            .for_env(EnvName::Prod)
            .pull(&staged_digest)
            .await
            .unwrap();
        assert_eq!(bytes, b"staged-image");
        let prod_tags = ctx
            .registries
            .for_env(EnvName::Prod)
            .list_tags(&staged_digest)
            .await
            .unwrap();
        assert!(prod_tags.contains("abc123d"));
        assert!(prod_tags.contains("latest"));
    }

    #[tokio::test]
    async fn test_rejected_approval_skips_prod_apply() {
        let ctx = production_ctx();
        let tags: BTreeSet<String> = ["abc123d".to_string()].into_iter().collect();
        ctx.registries
            .for_env(EnvName::Stage)
            .publish(b"staged-image", &tags)
            .await
            .unwrap();

        let run_id = start_run(&ctx, trigger(TriggerKind::Tag, Some("v1.2.0"), None)).await;
        approve_when_requested(&ctx, run_id, ApprovalDecision::Rejected).await;
        let run = wait_terminal(&ctx, run_id).await;

        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.job("gate-prod").unwrap().state, JobState::Failed);
        assert_eq!(run.job("apply-prod").unwrap().state, JobState::Skipped);
        // Production state untouched.
        let state = ctx.state.read(EnvName::Prod).await.unwrap();
        assert_eq!(state.deployed_digest, None);
        assert_eq!(state.serial, 0);
    }

    #[tokio::test]
    async fn test_build_failure_fails_run_and_skips_dependents() {
        let mut ctx = Context::new(Config::new(DeploymentMode::DevOnly, vec![]));
        ctx.builder = Arc::new(FailingSourceBuilder {
            reason: "compile error".to_string(),
        });

        let run_id = start_run(&ctx, trigger(TriggerKind::Merge, None, None)).await;
        let run = wait_terminal(&ctx, run_id).await;

        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.job("build").unwrap().state, JobState::Failed);
        assert_eq!(run.job("plan-dev").unwrap().state, JobState::Skipped);
        assert_eq!(run.job("apply-dev").unwrap().state, JobState::Skipped);
        assert_eq!(ctx.state.read(EnvName::Dev).await.unwrap().serial, 0);
    }

    #[tokio::test]
    async fn test_expired_tag_resolution_fails_run() {
        let ctx = production_ctx();
        // Nothing staged: retention already evicted the artifact.
        let run_id = start_run(&ctx, trigger(TriggerKind::Tag, Some("v1.2.0"), None)).await;
        let run = wait_terminal(&ctx, run_id).await;

        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.job("resolve-stage").unwrap().state, JobState::Failed);
        for skipped in ["promote-stage-prod", "plan-prod", "gate-prod", "apply-prod"] {
            assert_eq!(run.job(skipped).unwrap().state, JobState::Skipped);
        }
    }

    #[tokio::test]
    async fn test_overlapping_runs_serialize_per_environment() {
        let ctx = dev_ctx();
        let first = start_run(&ctx, trigger(TriggerKind::Merge, None, None)).await;
        let second = start_run(&ctx, trigger(TriggerKind::Merge, None, None)).await;

        let first_run = wait_terminal(&ctx, first).await;
        let second_run = wait_terminal(&ctx, second).await;

        assert_eq!(first_run.state, RunState::Succeeded);
        assert_eq!(second_run.state, RunState::Succeeded);
        // Both applies committed, one behind the other.
        assert_eq!(ctx.state.read(EnvName::Dev).await.unwrap().serial, 2);
    }

    #[tokio::test]
    async fn test_cancellation_stops_pending_jobs_and_aborts_gate() {
        let ctx = production_ctx();
        let tags: BTreeSet<String> = ["abc123d".to_string()].into_iter().collect();
        ctx.registries
            .for_env(EnvName::Stage)
            .publish(b"staged-image", &tags)
            .await
            .unwrap();

        let run_id = start_run(&ctx, trigger(TriggerKind::Tag, Some("v1.2.0"), None)).await;

        // Wait until the run is suspended on the gate, then cancel.
        loop {
            let run = ctx.runs.get(run_id).await.unwrap();
            if run
                .job("gate-prod")
                .map(|j| j.state == JobState::Running)
                .unwrap_or(false)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        ctx.runs
            .update(run_id, |r| r.cancel_requested = true)
            .await;

        let run = wait_terminal(&ctx, run_id).await;
        assert_eq!(run.state, RunState::Cancelled);
        assert_eq!(run.job("gate-prod").unwrap().state, JobState::Cancelled);
        assert_eq!(run.job("apply-prod").unwrap().state, JobState::Cancelled);
        // Work completed before the cancel stays completed.
        assert_eq!(run.job("promote-stage-prod").unwrap().state, JobState::Succeeded);
        assert_eq!(ctx.state.read(EnvName::Prod).await.unwrap().serial, 0);
    }

    #[tokio::test]
    async fn test_plan_reads_never_mutate_state() {
        let ctx = dev_ctx();
        // Seed dev state so the serial is observable.
        let txn = ctx.state.begin_apply(EnvName::Dev).await.unwrap();
        txn.commit(DesiredState {
            environment: EnvName::Dev,
            digest: ArtifactDigest::from_bytes(b"seed"),
        })
        .await
        .unwrap();

        let run_id = start_run(&ctx, trigger(TriggerKind::PullRequest, None, None)).await;
        wait_terminal(&ctx, run_id).await;

        // The report-only plan read the state but committed nothing.
        assert_eq!(ctx.state.read(EnvName::Dev).await.unwrap().serial, 1);
    }
}
