//! Promotion stage
//!
//! Republishes an artifact by digest from one environment's registry into
//! the next, preserving the full tag set. Promotion never rebuilds and never
//! re-reads source: the transfer is keyed by digest, so the downstream bytes
//! are provably identical to what was validated upstream.

use uuid::Uuid;

use gantry_core::domain::artifact::Artifact;
use gantry_core::domain::environment::EnvName;

use crate::context::Context;
use crate::service::registry::ArtifactRegistry as _;
use crate::stages::{StageError, fetch_run};

pub async fn execute(
    ctx: &Context,
    run_id: Uuid,
    source: EnvName,
    target: EnvName,
) -> Result<(), StageError> {
    let run = fetch_run(ctx, run_id).await?;
    let digest = run.target_digest.clone().ok_or(StageError::MissingDigest)?;
    let job_id = format!("promote-{}-{}", source, target);

    let source_registry = ctx.registries.for_env(source);
    let bytes = source_registry.pull(&digest).await?;
    let tags = source_registry.list_tags(&digest).await?;

    let target_registry = ctx.registries.for_env(target);
    let republished = target_registry.publish(&bytes, &tags).await?;

    // Content addressing makes this structurally true; verify anyway so a
    // misbehaving registry cannot smuggle different bytes downstream.
    if republished != digest {
        return Err(StageError::DigestMismatch {
            expected: digest,
            found: republished,
        });
    }

    let promoted = Artifact {
        digest: republished,
        tags,
        source_environment: source,
    };
    ctx.events
        .record(
            run_id,
            Some(&job_id),
            format!(
                "promoted {} from {} to {} with tags [{}]",
                promoted.digest,
                source_registry.registry_ref(),
                target_registry.registry_ref(),
                promoted.tags.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
        )
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::service::registry::{ArtifactRegistry, InMemoryRegistry, RegistrySet};
    use gantry_core::domain::artifact::ArtifactDigest;
    use gantry_core::domain::environment::DeploymentMode;
    use gantry_core::domain::run::PipelineRun;
    use gantry_core::domain::trigger::{TriggerContext, TriggerKind};
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    fn merge_trigger() -> TriggerContext {
        TriggerContext {
            kind: TriggerKind::Merge,
            ref_name: "main".to_string(),
            commit_sha: "abc123def456".to_string(),
            version_tag: None,
            initiator: None,
        }
    }

    fn production_ctx() -> Context {
        Context::new(Config::new(
            DeploymentMode::Production,
            vec!["sre@example.com".to_string()],
        ))
    }

    async fn run_with_digest(ctx: &Context, digest: Option<ArtifactDigest>) -> Uuid {
        let mut run = PipelineRun::new(merge_trigger(), ctx.config.mode);
        run.target_digest = digest;
        let id = run.id;
        ctx.runs.insert(run).await;
        id
    }

    fn tag_set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_promotion_preserves_bytes_and_tags() {
        let ctx = production_ctx();
        let dev = ctx.registries.for_env(EnvName::Dev);
        let digest = dev
            .publish(b"image-bytes", &tag_set(&["abc123d", "latest"]))
            .await
            .unwrap();
        let run_id = run_with_digest(&ctx, Some(digest.clone())).await;

        execute(&ctx, run_id, EnvName::Dev, EnvName::Stage)
            .await
            .unwrap();

        let stage = ctx.registries.for_env(EnvName::Stage);
        let bytes = stage.pull(&digest).await.unwrap();
        assert_eq!(ArtifactDigest::from_bytes(&bytes), digest);
        assert_eq!(
            stage.list_tags(&digest).await.unwrap(),
            tag_set(&["abc123d", "latest"])
        );
    }

    #[tokio::test]
    async fn test_missing_source_digest_is_fatal() {
        let ctx = production_ctx();
        let absent = ArtifactDigest::from_bytes(b"never-published");
        let run_id = run_with_digest(&ctx, Some(absent)).await;

        let err = execute(&ctx, run_id, EnvName::Dev, EnvName::Stage)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::DigestNotFound { .. }));
    }

    #[tokio::test]
    async fn test_denied_target_write_is_fatal_and_names_registry() {
        let mut ctx = production_ctx();
        let mut registries: HashMap<EnvName, Arc<dyn ArtifactRegistry>> = HashMap::new();
        registries.insert(EnvName::Dev, Arc::new(InMemoryRegistry::new("registry/dev")));
        registries.insert(
            EnvName::Stage,
            Arc::new(InMemoryRegistry::read_only("registry/stage")),
        );
        registries.insert(EnvName::Prod, Arc::new(InMemoryRegistry::new("registry/prod")));
        ctx.registries = RegistrySet::new(registries);

        let dev = ctx.registries.for_env(EnvName::Dev);
        let digest = dev.publish(b"image", &tag_set(&["abc123d"])).await.unwrap();
        let run_id = run_with_digest(&ctx, Some(digest)).await;

        let err = execute(&ctx, run_id, EnvName::Dev, EnvName::Stage)
            .await
            .unwrap_err();
        match err {
            StageError::PublishDenied { registry } => assert_eq!(registry, "registry/stage"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_promotion_without_digest_fails() {
        let ctx = production_ctx();
        let run_id = run_with_digest(&ctx, None).await;

        let err = execute(&ctx, run_id, EnvName::Dev, EnvName::Stage)
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::MissingDigest));
    }
}
