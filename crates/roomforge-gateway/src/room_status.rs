//! Room status writes against the room CRUD service.

use async_trait::async_trait;
use roomforge_core::collaborators::RoomStatusUpdater;
use roomforge_core::error::PipelineError;
use roomforge_core::room::{RoomId, RoomStatus};
use serde::Serialize;
use tracing::{info, instrument};

use crate::join_url;

#[derive(Debug, Serialize)]
struct StatusUpdate {
    status: RoomStatus,
}

/// Sends `PATCH {base_url}/rooms/{roomId}` with `{"status": ...}`.
#[derive(Debug, Clone)]
pub struct HttpRoomStatusUpdater {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRoomStatusUpdater {
    /// Creates an updater for the room service at `base_url`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RoomStatusUpdater for HttpRoomStatusUpdater {
    #[instrument(skip_all, fields(room_id = %room_id, status = %status))]
    async fn update_room_status(
        &self,
        room_id: &RoomId,
        status: RoomStatus,
    ) -> Result<(), PipelineError> {
        let url = join_url(&self.base_url, &format!("rooms/{room_id}"));
        let response = self
            .client
            .patch(&url)
            .json(&StatusUpdate { status })
            .send()
            .await
            .map_err(|e| PipelineError::Collaborator(format!("room status update failed: {e}")))?;

        let code = response.status();
        if !code.is_success() {
            return Err(PipelineError::Collaborator(format!(
                "room service returned {code} for {url}"
            )));
        }
        info!("room status updated");
        Ok(())
    }
}

/// Status updater used when no room service is configured; it only traces.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRoomStatusUpdater;

#[async_trait]
impl RoomStatusUpdater for TracingRoomStatusUpdater {
    async fn update_room_status(
        &self,
        room_id: &RoomId,
        status: RoomStatus,
    ) -> Result<(), PipelineError> {
        info!(room_id = %room_id, status = %status, "room status changed (no room service configured)");
        Ok(())
    }
}
