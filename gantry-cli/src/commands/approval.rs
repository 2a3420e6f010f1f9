//! Approval command handlers
//!
//! Lists pending production approvals and resolves them.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use uuid::Uuid;

use gantry_client::OrchestratorClient;
use gantry_core::domain::approval::ApprovalDecision;
use gantry_core::dto::approval::ResolveApproval;

use crate::config::Config;

/// Approval subcommands
#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List approvals awaiting a decision
    List,
    /// Approve a pending production change
    Approve {
        /// Approval token
        token: Uuid,

        /// Reviewer identity
        #[arg(long)]
        reviewer: String,
    },
    /// Reject a pending production change
    Reject {
        /// Approval token
        token: Uuid,

        /// Reviewer identity
        #[arg(long)]
        reviewer: String,
    },
}

/// Handle approval commands
pub async fn handle_approval_command(command: ApprovalCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        ApprovalCommands::List => list_pending(&client).await,
        ApprovalCommands::Approve { token, reviewer } => {
            resolve(&client, token, reviewer, ApprovalDecision::Approved).await
        }
        ApprovalCommands::Reject { token, reviewer } => {
            resolve(&client, token, reviewer, ApprovalDecision::Rejected).await
        }
    }
}

/// List pending approvals
async fn list_pending(client: &OrchestratorClient) -> Result<()> {
    let tickets = client.list_pending_approvals().await?;

    if tickets.is_empty() {
        println!("{}", "No pending approvals.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} pending approval(s):", tickets.len()).bold()
        );
        println!();
        for ticket in tickets {
            println!("  {} Token {}", "▸".cyan(), ticket.token.to_string().cyan());
            println!("    Run:         {}", ticket.run_id.to_string().dimmed());
            println!("    Environment: {}", ticket.environment);
            println!(
                "    Requested:   {}",
                ticket
                    .requested_at
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
                    .dimmed()
            );
            println!();
        }
    }

    Ok(())
}

/// Resolve an approval
async fn resolve(
    client: &OrchestratorClient,
    token: Uuid,
    reviewer: String,
    decision: ApprovalDecision,
) -> Result<()> {
    let ticket = client
        .resolve_approval(token, ResolveApproval { reviewer, decision })
        .await?;

    let state = format!("{:?}", ticket.state);
    let state_colored = match decision {
        ApprovalDecision::Approved => state.green(),
        ApprovalDecision::Rejected => state.red(),
    };
    println!("Approval {} is now {}", ticket.token, state_colored);
    if let Some(who) = &ticket.resolved_by {
        println!("  Resolved by {}", who);
    }

    Ok(())
}
