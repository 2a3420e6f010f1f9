//! Trigger command handlers
//!
//! Submits source-control events to the orchestrator, mirroring what the
//! forge webhook would deliver.

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use gantry_client::OrchestratorClient;
use gantry_core::dto::trigger::SubmitTrigger;

use crate::config::Config;

/// Trigger subcommands
#[derive(Subcommand)]
pub enum TriggerCommands {
    /// Submit a branch push (a push to the main line becomes a merge run)
    Push {
        /// Branch name
        #[arg(long, default_value = "main")]
        branch: String,

        /// Commit SHA
        commit: String,

        /// Initiating account
        #[arg(long)]
        initiator: Option<String>,
    },
    /// Submit a pull request event (plan-only review run)
    Pr {
        /// Target branch
        #[arg(long, default_value = "main")]
        branch: String,

        /// Commit SHA
        commit: String,

        /// PR action
        #[arg(long, default_value = "synchronize")]
        action: String,

        /// Initiating account
        #[arg(long)]
        initiator: Option<String>,
    },
    /// Submit a release tag event
    Tag {
        /// Tag name (v<semver>)
        tag: String,

        /// Commit SHA the tag points at
        commit: String,

        /// Initiating account
        #[arg(long)]
        initiator: Option<String>,
    },
}

/// Handle trigger commands
pub async fn handle_trigger_command(command: TriggerCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    let req = match command {
        TriggerCommands::Push {
            branch,
            commit,
            initiator,
        } => SubmitTrigger {
            event_kind: "push".to_string(),
            ref_name: branch,
            commit_sha: commit,
            action: None,
            tag: None,
            initiator,
        },
        TriggerCommands::Pr {
            branch,
            commit,
            action,
            initiator,
        } => SubmitTrigger {
            event_kind: "pull_request".to_string(),
            ref_name: branch,
            commit_sha: commit,
            action: Some(action),
            tag: None,
            initiator,
        },
        TriggerCommands::Tag {
            tag,
            commit,
            initiator,
        } => SubmitTrigger {
            event_kind: "tag".to_string(),
            ref_name: tag.clone(),
            commit_sha: commit,
            action: None,
            tag: Some(tag),
            initiator,
        },
    };

    let run = client.submit_trigger(req).await?;

    println!("{}", "Run created:".bold());
    println!("  ID:      {}", run.id.to_string().cyan());
    println!("  Trigger: {:?}", run.trigger.kind);
    println!("  Mode:    {:?}", run.mode);
    println!("  Jobs:");
    for job in &run.jobs {
        println!("    {} {}", "▸".cyan(), job.id);
    }

    Ok(())
}
