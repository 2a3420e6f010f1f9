//! Run-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use gantry_core::domain::event::RunEvent;
use gantry_core::domain::run::PipelineRun;
use gantry_core::dto::run::RunDto;
use uuid::Uuid;

impl OrchestratorClient {
    /// List all runs, newest first
    pub async fn list_runs(&self) -> Result<Vec<RunDto>> {
        let url = format!("{}/run/list", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get a run by ID, including its full job graph
    ///
    /// # Arguments
    /// * `run_id` - The run UUID
    pub async fn get_run(&self, run_id: Uuid) -> Result<PipelineRun> {
        let url = format!("{}/run/{}", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get the timeline of a run
    pub async fn get_run_events(&self, run_id: Uuid) -> Result<Vec<RunEvent>> {
        let url = format!("{}/run/{}/events", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Request cancellation of a run
    ///
    /// Pending jobs stop before starting; an in-flight apply finishes its
    /// state mutation first.
    pub async fn cancel_run(&self, run_id: Uuid) -> Result<()> {
        let url = format!("{}/run/{}/cancel", self.base_url, run_id);
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
