//! Trigger domain types
//!
//! Classifies raw source-control events into the trigger contexts that drive
//! pipeline construction. Classification is a pure function of the event; an
//! event that matches none of the recognized shapes is rejected before any
//! job is scheduled.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the short commit identifier used as a registry tag.
const SHORT_SHA_LEN: usize = 7;

/// Raw source-control event as delivered by the forge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Forge event kind: "push", "pull_request", or "tag".
    pub event_kind: String,
    /// Branch name for pushes and pull requests (the target branch).
    pub ref_name: String,
    /// Full commit SHA the event points at.
    pub commit_sha: String,
    /// Pull request action ("opened", "synchronize"), if applicable.
    pub action: Option<String>,
    /// Tag name for tag pushes.
    pub tag: Option<String>,
    /// Account that caused the event; used by the approval gate to forbid
    /// self-approval.
    pub initiator: Option<String>,
}

/// What kind of source-control event started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    PullRequest,
    Merge,
    Tag,
    Manual,
}

/// Immutable description of the event that started a pipeline run.
///
/// Created once per run by [`classify`] and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerContext {
    pub kind: TriggerKind,
    pub ref_name: String,
    pub commit_sha: String,
    pub version_tag: Option<String>,
    pub initiator: Option<String>,
}

impl TriggerContext {
    /// Short commit identifier used as the human registry tag.
    pub fn short_sha(&self) -> &str {
        let end = self.commit_sha.len().min(SHORT_SHA_LEN);
        &self.commit_sha[..end]
    }
}

/// Reasons an event cannot be classified into a trigger.
///
/// All variants are reported to the caller before any stage is scheduled;
/// none of them create a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("unrecognized event kind: {0}")]
    UnknownEventKind(String),

    #[error("push to non-mainline ref '{0}' is not deployable")]
    NonMainlinePush(String),

    #[error("pull request against '{0}' does not target the main line")]
    NonMainlinePullRequest(String),

    #[error("unsupported pull request action: {0}")]
    UnsupportedAction(String),

    #[error("tag '{0}' does not match the release version pattern")]
    InvalidVersionTag(String),

    #[error("tag event carries no tag name")]
    MissingTag,

    #[error("event carries no commit sha")]
    MissingCommit,
}

/// Classify a raw event against the configured main branch.
///
/// Rules:
/// - push to the main line with no tag → `Merge`
/// - pull request opened/synchronized against the main line → `PullRequest`
/// - tag push matching `v<semver>` → `Tag` with the version recorded
/// - anything else is rejected
pub fn classify(event: &SourceEvent, main_branch: &str) -> Result<TriggerContext, ClassifyError> {
    if event.commit_sha.is_empty() {
        return Err(ClassifyError::MissingCommit);
    }

    match event.event_kind.as_str() {
        "push" => match &event.tag {
            Some(tag) => classify_tag(event, tag),
            None if event.ref_name == main_branch => Ok(TriggerContext {
                kind: TriggerKind::Merge,
                ref_name: event.ref_name.clone(),
                commit_sha: event.commit_sha.clone(),
                version_tag: None,
                initiator: event.initiator.clone(),
            }),
            None => Err(ClassifyError::NonMainlinePush(event.ref_name.clone())),
        },
        "pull_request" => {
            match event.action.as_deref() {
                Some("opened") | Some("synchronize") => {}
                other => {
                    return Err(ClassifyError::UnsupportedAction(
                        other.unwrap_or("<none>").to_string(),
                    ));
                }
            }
            if event.ref_name != main_branch {
                return Err(ClassifyError::NonMainlinePullRequest(
                    event.ref_name.clone(),
                ));
            }
            Ok(TriggerContext {
                kind: TriggerKind::PullRequest,
                ref_name: event.ref_name.clone(),
                commit_sha: event.commit_sha.clone(),
                version_tag: None,
                initiator: event.initiator.clone(),
            })
        }
        "tag" => {
            let tag = event
                .tag
                .clone()
                .or_else(|| Some(event.ref_name.clone()).filter(|r| !r.is_empty()))
                .ok_or(ClassifyError::MissingTag)?;
            classify_tag(event, &tag)
        }
        other => Err(ClassifyError::UnknownEventKind(other.to_string())),
    }
}

fn classify_tag(event: &SourceEvent, tag: &str) -> Result<TriggerContext, ClassifyError> {
    if !is_version_tag(tag) {
        return Err(ClassifyError::InvalidVersionTag(tag.to_string()));
    }

    Ok(TriggerContext {
        kind: TriggerKind::Tag,
        ref_name: tag.to_string(),
        commit_sha: event.commit_sha.clone(),
        version_tag: Some(tag.to_string()),
        initiator: event.initiator.clone(),
    })
}

/// A release tag is `v` followed by a valid semantic version.
fn is_version_tag(tag: &str) -> bool {
    tag.strip_prefix('v')
        .map(|rest| semver::Version::parse(rest).is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_event(ref_name: &str, tag: Option<&str>) -> SourceEvent {
        SourceEvent {
            event_kind: "push".to_string(),
            ref_name: ref_name.to_string(),
            commit_sha: "abc123def456".to_string(),
            action: None,
            tag: tag.map(String::from),
            initiator: Some("dev@example.com".to_string()),
        }
    }

    #[test]
    fn test_mainline_push_is_merge() {
        let ctx = classify(&push_event("main", None), "main").unwrap();
        assert_eq!(ctx.kind, TriggerKind::Merge);
        assert_eq!(ctx.commit_sha, "abc123def456");
        assert_eq!(ctx.version_tag, None);
    }

    #[test]
    fn test_feature_branch_push_rejected() {
        let err = classify(&push_event("feature/x", None), "main").unwrap_err();
        assert_eq!(err, ClassifyError::NonMainlinePush("feature/x".to_string()));
    }

    #[test]
    fn test_version_tag_push_is_tag() {
        let ctx = classify(&push_event("main", Some("v1.2.0")), "main").unwrap();
        assert_eq!(ctx.kind, TriggerKind::Tag);
        assert_eq!(ctx.version_tag, Some("v1.2.0".to_string()));
    }

    #[test]
    fn test_non_version_tag_rejected() {
        let err = classify(&push_event("main", Some("nightly")), "main").unwrap_err();
        assert_eq!(err, ClassifyError::InvalidVersionTag("nightly".to_string()));
    }

    #[test]
    fn test_tag_event_kind_uses_ref_as_tag_name() {
        let event = SourceEvent {
            event_kind: "tag".to_string(),
            ref_name: "v2.0.0".to_string(),
            commit_sha: "abc123def456".to_string(),
            action: None,
            tag: None,
            initiator: None,
        };
        let ctx = classify(&event, "main").unwrap();
        assert_eq!(ctx.kind, TriggerKind::Tag);
        assert_eq!(ctx.version_tag, Some("v2.0.0".to_string()));
    }

    #[test]
    fn test_pull_request_against_main() {
        let event = SourceEvent {
            event_kind: "pull_request".to_string(),
            ref_name: "main".to_string(),
            commit_sha: "abc123def456".to_string(),
            action: Some("synchronize".to_string()),
            tag: None,
            initiator: None,
        };
        let ctx = classify(&event, "main").unwrap();
        assert_eq!(ctx.kind, TriggerKind::PullRequest);
    }

    #[test]
    fn test_pull_request_closed_action_rejected() {
        let event = SourceEvent {
            event_kind: "pull_request".to_string(),
            ref_name: "main".to_string(),
            commit_sha: "abc123def456".to_string(),
            action: Some("closed".to_string()),
            tag: None,
            initiator: None,
        };
        let err = classify(&event, "main").unwrap_err();
        assert_eq!(err, ClassifyError::UnsupportedAction("closed".to_string()));
    }

    #[test]
    fn test_unknown_event_kind_rejected() {
        let event = SourceEvent {
            event_kind: "deployment_status".to_string(),
            ref_name: "main".to_string(),
            commit_sha: "abc123def456".to_string(),
            action: None,
            tag: None,
            initiator: None,
        };
        let err = classify(&event, "main").unwrap_err();
        assert_eq!(
            err,
            ClassifyError::UnknownEventKind("deployment_status".to_string())
        );
    }

    #[test]
    fn test_short_sha() {
        let ctx = classify(&push_event("main", None), "main").unwrap();
        assert_eq!(ctx.short_sha(), "abc123d");
    }

    #[test]
    fn test_is_version_tag() {
        assert!(is_version_tag("v1.0.0"));
        assert!(is_version_tag("v0.2.10"));
        assert!(!is_version_tag("1.0.0"));
        assert!(!is_version_tag("v1.0"));
        assert!(!is_version_tag("release-1"));
    }
}
