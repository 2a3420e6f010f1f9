//! Digest resolver stage
//!
//! Tag events carry no digest; the bytes were built and promoted during the
//! originating merge. This stage recovers that digest by looking up the
//! commit's short-sha tag in the upstream registry. A missing tag means
//! retention expired it: a reported, non-retried failure that requires a
//! fresh merge/tag cycle.

use uuid::Uuid;

use gantry_core::domain::environment::EnvName;

use crate::context::Context;
use crate::service::registry::ArtifactRegistry as _;
use crate::stages::{StageError, fetch_run};

pub async fn execute(ctx: &Context, run_id: Uuid, environment: EnvName) -> Result<(), StageError> {
    let run = fetch_run(ctx, run_id).await?;
    let tag = run.trigger.short_sha().to_string();
    let job_id = format!("resolve-{}", environment);

    let registry = ctx.registries.for_env(environment);
    let digest = registry.resolve_tag(&tag).await?;

    ctx.runs
        .update(run_id, |r| r.target_digest = Some(digest.clone()))
        .await;
    ctx.events
        .record(
            run_id,
            Some(&job_id),
            format!(
                "resolved tag {} to {} in {}",
                tag,
                digest,
                registry.registry_ref()
            ),
        )
        .await;

    Ok(())
}
