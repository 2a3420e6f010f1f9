//! Build stage
//!
//! Builds the artifact from source once per run and publishes it to the dev
//! registry. The content digest recorded here is what every downstream stage
//! deploys; nothing is ever rebuilt further down the pipeline.

use std::collections::BTreeSet;
use uuid::Uuid;

use gantry_core::domain::artifact::Artifact;
use gantry_core::domain::environment::EnvName;
use gantry_core::domain::trigger::TriggerKind;

use crate::context::Context;
use crate::service::builder::SourceBuilder as _;
use crate::service::registry::ArtifactRegistry as _;
use crate::stages::{StageError, fetch_run};

pub async fn execute(ctx: &Context, run_id: Uuid) -> Result<(), StageError> {
    let run = fetch_run(ctx, run_id).await?;

    let bytes = ctx
        .builder
        .build(&run.trigger.commit_sha)
        .await
        .map_err(|e| StageError::Build(e.0))?;

    let mut tags: BTreeSet<String> = BTreeSet::new();
    tags.insert(run.trigger.short_sha().to_string());
    match run.trigger.kind {
        TriggerKind::Merge | TriggerKind::Manual => {
            tags.insert("latest".to_string());
        }
        TriggerKind::Tag => {
            if let Some(version) = &run.trigger.version_tag {
                tags.insert(version.clone());
            }
        }
        TriggerKind::PullRequest => {}
    }

    let registry = ctx.registries.for_env(EnvName::Dev);
    let digest = registry.publish(&bytes, &tags).await?;
    let artifact = Artifact {
        digest,
        tags,
        source_environment: EnvName::Dev,
    };

    ctx.runs
        .update(run_id, |r| r.target_digest = Some(artifact.digest.clone()))
        .await;
    ctx.events
        .record(
            run_id,
            Some("build"),
            format!(
                "published {} to {} with tags [{}]",
                artifact.digest,
                registry.registry_ref(),
                artifact.tags.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
        )
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::service::builder::FailingSourceBuilder;
    use crate::service::registry::ArtifactRegistry;
    use gantry_core::domain::environment::DeploymentMode;
    use gantry_core::domain::run::PipelineRun;
    use gantry_core::domain::trigger::TriggerContext;
    use std::sync::Arc;

    fn trigger(kind: TriggerKind, version_tag: Option<&str>) -> TriggerContext {
        TriggerContext {
            kind,
            ref_name: "main".to_string(),
            commit_sha: "abc123def456".to_string(),
            version_tag: version_tag.map(String::from),
            initiator: None,
        }
    }

    async fn insert_run(ctx: &Context, kind: TriggerKind, version_tag: Option<&str>) -> Uuid {
        let run = PipelineRun::new(trigger(kind, version_tag), ctx.config.mode);
        let id = run.id;
        ctx.runs.insert(run).await;
        id
    }

    #[tokio::test]
    async fn test_merge_build_tags_short_sha_and_latest() {
        let ctx = Context::new(Config::new(DeploymentMode::DevOnly, vec![]));
        let run_id = insert_run(&ctx, TriggerKind::Merge, None).await;

        execute(&ctx, run_id).await.unwrap();

        let run = ctx.runs.get(run_id).await.unwrap();
        let digest = run.target_digest.unwrap();
        let registry = ctx.registries.for_env(EnvName::Dev);
        let tags = registry.list_tags(&digest).await.unwrap();
        assert!(tags.contains("abc123d"));
        assert!(tags.contains("latest"));
    }

    #[tokio::test]
    async fn test_tag_build_carries_version_tag_not_latest() {
        let ctx = Context::new(Config::new(DeploymentMode::DevOnly, vec![]));
        let run_id = insert_run(&ctx, TriggerKind::Tag, Some("v1.2.0")).await;

        execute(&ctx, run_id).await.unwrap();

        let run = ctx.runs.get(run_id).await.unwrap();
        let tags = ctx
            .registries
            .for_env(EnvName::Dev)
            .list_tags(&run.target_digest.unwrap())
            .await
            .unwrap();
        assert!(tags.contains("v1.2.0"));
        assert!(!tags.contains("latest"));
    }

    #[tokio::test]
    async fn test_pull_request_build_tags_short_sha_only() {
        let ctx = Context::new(Config::new(DeploymentMode::DevOnly, vec![]));
        let run_id = insert_run(&ctx, TriggerKind::PullRequest, None).await;

        execute(&ctx, run_id).await.unwrap();

        let run = ctx.runs.get(run_id).await.unwrap();
        let tags = ctx
            .registries
            .for_env(EnvName::Dev)
            .list_tags(&run.target_digest.unwrap())
            .await
            .unwrap();
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("abc123d"));
    }

    #[tokio::test]
    async fn test_build_failure_is_fatal() {
        let mut ctx = Context::new(Config::new(DeploymentMode::DevOnly, vec![]));
        ctx.builder = Arc::new(FailingSourceBuilder {
            reason: "compile error".to_string(),
        });
        let run_id = insert_run(&ctx, TriggerKind::Merge, None).await;

        let err = execute(&ctx, run_id).await.unwrap_err();
        assert!(matches!(err, StageError::Build(_)));
        assert!(ctx.runs.get(run_id).await.unwrap().target_digest.is_none());
    }
}
