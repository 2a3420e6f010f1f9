//! Approval-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::domain::approval::ApprovalTicket;
use gantry_core::dto::approval::ResolveApproval;
use uuid::Uuid;

impl OrchestratorClient {
    /// List approvals still awaiting a decision
    pub async fn list_pending_approvals(&self) -> Result<Vec<ApprovalTicket>> {
        let url = format!("{}/approval/list", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Resolve a pending approval with a reviewer decision
    ///
    /// # Arguments
    /// * `token` - The approval token
    /// * `req` - The reviewer identity and decision
    pub async fn resolve_approval(
        &self,
        token: Uuid,
        req: ResolveApproval,
    ) -> Result<ApprovalTicket> {
        let url = format!("{}/approval/{}/resolve", self.base_url, token);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }
}
