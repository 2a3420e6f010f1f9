//! Environment domain types
//!
//! The three ordered deployment tiers and the process-wide deployment mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the ordered deployment tiers: dev ≺ stage ≺ prod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvName {
    Dev,
    Stage,
    Prod,
}

impl EnvName {
    /// Production is the only tier gated on human approval.
    pub fn requires_approval(&self) -> bool {
        matches!(self, EnvName::Prod)
    }

    /// The next tier in promotion order, if any.
    pub fn next(&self) -> Option<EnvName> {
        match self {
            EnvName::Dev => Some(EnvName::Stage),
            EnvName::Stage => Some(EnvName::Prod),
            EnvName::Prod => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvName::Dev => "dev",
            EnvName::Stage => "stage",
            EnvName::Prod => "prod",
        }
    }
}

impl fmt::Display for EnvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(EnvName::Dev),
            "stage" => Ok(EnvName::Stage),
            "prod" => Ok(EnvName::Prod),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// Which environment set a deployment pipeline instantiates.
///
/// Read once from configuration at startup and threaded into DAG
/// construction as a value; never consulted again at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentMode {
    DevOnly,
    Production,
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev-only" => Ok(DeploymentMode::DevOnly),
            "production" => Ok(DeploymentMode::Production),
            other => Err(format!("unknown deployment mode: {}", other)),
        }
    }
}

/// A deployment tier together with its collaborator references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub name: EnvName,
    /// Reference to the tier's artifact registry.
    pub registry_ref: String,
    /// Reference to the tier's remote state backend.
    pub state_backend_ref: String,
    pub requires_approval: bool,
}

impl Environment {
    pub fn new(name: EnvName, registry_ref: impl Into<String>, state_backend_ref: impl Into<String>) -> Self {
        Self {
            name,
            registry_ref: registry_ref.into(),
            state_backend_ref: state_backend_ref.into(),
            requires_approval: name.requires_approval(),
        }
    }
}
