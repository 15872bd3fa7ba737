//! Completion rewards.

use async_trait::async_trait;
use roomforge_core::collaborators::RewardService;
use roomforge_core::error::PipelineError;
use roomforge_core::room::RoomId;
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RewardRequest<'a> {
    room_id: &'a RoomId,
    amount: u64,
}

/// Sends `POST {url}` with `{"roomId": ..., "amount": ...}`.
#[derive(Debug, Clone)]
pub struct HttpRewardService {
    client: reqwest::Client,
    url: String,
}

impl HttpRewardService {
    /// Creates a reward service posting to `url`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RewardService for HttpRewardService {
    #[instrument(skip_all, fields(room_id = %room_id, amount = amount))]
    async fn reward_user(&self, room_id: &RoomId, amount: u64) -> Result<(), PipelineError> {
        let response = self
            .client
            .post(&self.url)
            .json(&RewardRequest { room_id, amount })
            .send()
            .await
            .map_err(|e| PipelineError::Collaborator(format!("reward request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Collaborator(format!(
                "reward service returned {status}"
            )));
        }
        info!("reward issued");
        Ok(())
    }
}

/// Reward service used when none is configured; it only traces.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRewardService;

#[async_trait]
impl RewardService for TracingRewardService {
    async fn reward_user(&self, room_id: &RoomId, amount: u64) -> Result<(), PipelineError> {
        info!(room_id = %room_id, amount, "reward issued (no reward service configured)");
        Ok(())
    }
}
