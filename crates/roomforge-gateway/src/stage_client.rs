//! Stage agents reached over HTTP.

use async_trait::async_trait;
use roomforge_core::collaborators::StageClient;
use roomforge_core::error::PipelineError;
use roomforge_core::stage::StageDescriptor;
use serde_json::Value;
use tracing::{debug, instrument};

/// Posts stage request bodies to each stage's configured endpoint.
#[derive(Debug, Clone, Default)]
pub struct HttpStageClient {
    client: reqwest::Client,
}

impl HttpStageClient {
    /// Creates a stage client sharing `client`'s connection pool.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StageClient for HttpStageClient {
    #[instrument(skip_all, fields(stage = %descriptor.stage, endpoint = %descriptor.endpoint))]
    async fn call(&self, descriptor: &StageDescriptor, body: Value) -> Result<Value, PipelineError> {
        let stage = descriptor.stage;
        let transport = |message: String| PipelineError::Transport { stage, message };

        let response = self
            .client
            .post(&descriptor.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(transport(format!("agent returned {status}: {text}")));
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| transport(format!("unreadable response body: {e}")))?;
        debug!(%status, "stage agent responded");
        Ok(payload)
    }
}
