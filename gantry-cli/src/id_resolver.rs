//! ID resolver module
//!
//! Handles resolution of UUID prefixes to full UUIDs by querying the API.
//! This allows users to specify short, unambiguous prefixes instead of full
//! UUIDs.

use anyhow::{Context, Result, anyhow};
use uuid::Uuid;

use crate::types::IdOrPrefix;
use gantry_client::OrchestratorClient;

/// Resolve a run ID or prefix to a full UUID
///
/// If the input is already a full UUID, returns it immediately.
/// Otherwise, fetches all runs and finds the one matching the prefix.
///
/// # Errors
/// Returns an error if:
/// - No run matches the prefix
/// - Multiple runs match the prefix (ambiguous)
/// - API call fails
pub async fn resolve_run_id(
    client: &OrchestratorClient,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    // If it's already a full UUID, return it
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let prefix = id_or_prefix.as_str().to_lowercase();

    let runs = client
        .list_runs()
        .await
        .context("Failed to fetch runs for ID resolution")?;

    let matches: Vec<_> = runs
        .iter()
        .filter(|r| r.id.to_string().to_lowercase().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => Err(anyhow!("No run found with ID starting with '{}'", prefix)),
        1 => Ok(matches[0].id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|r| r.id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple runs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
