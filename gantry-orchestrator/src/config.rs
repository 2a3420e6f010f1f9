//! Orchestrator configuration
//!
//! Defines all configurable parameters for the orchestrator including the
//! deployment mode, reviewer set, stage budgets, and plan retention.

use std::time::Duration;

use gantry_core::domain::environment::{DeploymentMode, EnvName, Environment};

/// Orchestrator configuration
///
/// The deployment mode is read here once at startup; the job graph of every
/// run is derived from the value captured in this struct.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub bind_addr: String,

    /// Which environment set pipelines instantiate.
    pub mode: DeploymentMode,

    /// Branch whose pushes count as merges.
    pub main_branch: String,

    /// Accounts allowed to resolve production approvals.
    pub reviewers: Vec<String>,

    /// Wall-clock budget per stage; exceeding it fails the job.
    pub stage_timeout: Duration,

    /// Retention window for saved plans, in days.
    pub plan_retention_days: i64,

    /// Optional deadline for pending approvals; `None` means the gate waits
    /// for the surrounding scheduling system to intervene.
    pub approval_timeout: Option<Duration>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(mode: DeploymentMode, reviewers: Vec<String>) -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            mode,
            main_branch: "main".to_string(),
            reviewers,
            stage_timeout: Duration::from_secs(1800), // 30 minutes
            plan_retention_days: 7,
            approval_timeout: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - GANTRY_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - DEPLOYMENT_MODE (optional, "dev-only" or "production", default: dev-only)
    /// - MAIN_BRANCH (optional, default: main)
    /// - REVIEWERS (comma-separated accounts; required in production mode)
    /// - STAGE_TIMEOUT_SECS (optional, default: 1800)
    /// - PLAN_RETENTION_DAYS (optional, default: 7)
    /// - APPROVAL_TIMEOUT_SECS (optional, unset means no orchestrator deadline)
    pub fn from_env() -> Result<Self, String> {
        let mode = match std::env::var("DEPLOYMENT_MODE") {
            Ok(raw) => raw.parse::<DeploymentMode>()?,
            Err(_) => DeploymentMode::DevOnly,
        };

        let reviewers = std::env::var("REVIEWERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut config = Config::new(mode, reviewers);

        if let Ok(addr) = std::env::var("GANTRY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(branch) = std::env::var("MAIN_BRANCH") {
            config.main_branch = branch;
        }
        if let Some(secs) = parse_env_u64("STAGE_TIMEOUT_SECS") {
            config.stage_timeout = Duration::from_secs(secs);
        }
        if let Some(days) = parse_env_u64("PLAN_RETENTION_DAYS") {
            config.plan_retention_days = days as i64;
        }
        if let Some(secs) = parse_env_u64("APPROVAL_TIMEOUT_SECS") {
            config.approval_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bind_addr.is_empty() {
            return Err("bind_addr cannot be empty".to_string());
        }

        if self.main_branch.is_empty() {
            return Err("main_branch cannot be empty".to_string());
        }

        if self.stage_timeout.as_secs() == 0 {
            return Err("stage_timeout must be greater than 0".to_string());
        }

        if self.plan_retention_days <= 0 {
            return Err("plan_retention_days must be greater than 0".to_string());
        }

        if self.mode == DeploymentMode::Production && self.reviewers.is_empty() {
            return Err("production mode requires at least one reviewer".to_string());
        }

        Ok(())
    }

    /// Environments instantiated under the configured mode, in promotion
    /// order.
    pub fn environments(&self) -> Vec<Environment> {
        let names = match self.mode {
            DeploymentMode::DevOnly => vec![EnvName::Dev],
            DeploymentMode::Production => vec![EnvName::Dev, EnvName::Stage, EnvName::Prod],
        };
        names
            .into_iter()
            .map(|name| {
                Environment::new(
                    name,
                    format!("registry/{}", name),
                    format!("state/{}", name),
                )
            })
            .collect()
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok())
}
