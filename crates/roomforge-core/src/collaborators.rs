//! Traits for the external systems the pipeline talks to.
//!
//! The engine only ever sees these traits; HTTP implementations live in
//! `roomforge-gateway`, the in-process log broker in `roomforge-realtime`,
//! and mocks in `roomforge-test-support`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PipelineError;
use crate::room::{RoomId, RoomStatus};
use crate::stage::StageDescriptor;

/// Performs one remote stage call. Implementations do not enforce the
/// descriptor's timeout; the Stage Invoker does.
#[async_trait]
pub trait StageClient: Send + Sync {
    /// POSTs `body` to the stage and returns its JSON response.
    ///
    /// Any non-success response or network failure is a
    /// `PipelineError::Transport`.
    async fn call(&self, descriptor: &StageDescriptor, body: Value)
    -> Result<Value, PipelineError>;
}

/// Publish side of a pub/sub transport.
///
/// A single publisher is shared by every concurrently running workflow.
/// Implementations must accept concurrent `publish` calls and serialize them
/// internally so that messages from one caller keep their order.
#[async_trait]
pub trait LogPublisher: Send + Sync {
    /// Publishes `message` on `channel`, returning how many subscribers
    /// received it. No acknowledgment, no buffering.
    async fn publish(&self, channel: &str, message: String) -> Result<usize, PipelineError>;
}

/// Writes the externally visible room status.
#[async_trait]
pub trait RoomStatusUpdater: Send + Sync {
    /// Sets `room_id`'s status.
    async fn update_room_status(
        &self,
        room_id: &RoomId,
        status: RoomStatus,
    ) -> Result<(), PipelineError>;
}

/// Credits the owner of a room after a fully successful workflow.
#[async_trait]
pub trait RewardService: Send + Sync {
    /// Rewards the user behind `room_id` with `amount`.
    async fn reward_user(&self, room_id: &RoomId, amount: u64) -> Result<(), PipelineError>;
}
