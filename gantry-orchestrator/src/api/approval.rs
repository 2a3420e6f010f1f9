//! Approval API Handlers
//!
//! The human approval interface: list outstanding checkpoints and resolve
//! them with an explicit reviewer decision.

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use gantry_core::domain::approval::ApprovalTicket;
use gantry_core::dto::approval::ResolveApproval;

use crate::api::error::{ApiError, ApiResult};
use crate::context::Context;
use crate::service::approval::ApprovalError;

/// GET /approval/list
/// List approvals still awaiting a decision
pub async fn list_pending(State(ctx): State<Context>) -> ApiResult<Json<Vec<ApprovalTicket>>> {
    tracing::debug!("Listing pending approvals");

    Ok(Json(ctx.approvals.pending().await))
}

/// POST /approval/{token}/resolve
/// Resolve a pending approval with a reviewer decision
pub async fn resolve(
    State(ctx): State<Context>,
    Path(token): Path<Uuid>,
    Json(req): Json<ResolveApproval>,
) -> ApiResult<Json<ApprovalTicket>> {
    tracing::info!("Resolving approval {} by {}", token, req.reviewer);

    let ticket = ctx
        .approvals
        .resolve(token, &req.reviewer, req.decision)
        .await
        .map_err(|e| match e {
            ApprovalError::NotFound(token) => {
                ApiError::NotFound(format!("Approval {} not found", token))
            }
            ApprovalError::AlreadyResolved(_) => ApiError::BadRequest(e.to_string()),
            ApprovalError::NotAReviewer(_) | ApprovalError::SelfApproval(_) => {
                ApiError::Forbidden(e.to_string())
            }
        })?;

    Ok(Json(ticket))
}
