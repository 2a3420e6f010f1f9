//! Trigger-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::domain::run::PipelineRun;
use gantry_core::dto::trigger::SubmitTrigger;

impl OrchestratorClient {
    /// Submit a source-control event for classification and scheduling
    ///
    /// # Arguments
    /// * `req` - The raw event (kind, ref, commit, optional tag)
    ///
    /// # Returns
    /// The created run with its instantiated job graph
    pub async fn submit_trigger(&self, req: SubmitTrigger) -> Result<PipelineRun> {
        let url = format!("{}/trigger", self.base_url);
        tracing::debug!("Submitting {} event for {}", req.event_kind, req.commit_sha);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }
}
