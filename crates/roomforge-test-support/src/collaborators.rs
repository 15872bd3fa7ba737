//! Test doubles for the room status and reward collaborators.

use std::sync::Mutex;

use async_trait::async_trait;
use roomforge_core::collaborators::{RewardService, RoomStatusUpdater};
use roomforge_core::error::PipelineError;
use roomforge_core::room::{RoomId, RoomStatus};

/// Records every status update.
#[derive(Debug, Default)]
pub struct RecordingRoomStatus {
    updates: Mutex<Vec<(RoomId, RoomStatus)>>,
}

impl RecordingRoomStatus {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all updates in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn updates(&self) -> Vec<(RoomId, RoomStatus)> {
        self.updates.lock().unwrap().clone()
    }

    /// Statuses written for `room_id`, in call order.
    pub fn statuses_for(&self, room_id: &RoomId) -> Vec<RoomStatus> {
        self.updates()
            .into_iter()
            .filter(|(id, _)| id == room_id)
            .map(|(_, status)| status)
            .collect()
    }
}

#[async_trait]
impl RoomStatusUpdater for RecordingRoomStatus {
    async fn update_room_status(
        &self,
        room_id: &RoomId,
        status: RoomStatus,
    ) -> Result<(), PipelineError> {
        self.updates.lock().unwrap().push((room_id.clone(), status));
        Ok(())
    }
}

/// A status updater whose calls always fail.
#[derive(Debug)]
pub struct FailingRoomStatus;

#[async_trait]
impl RoomStatusUpdater for FailingRoomStatus {
    async fn update_room_status(
        &self,
        _room_id: &RoomId,
        _status: RoomStatus,
    ) -> Result<(), PipelineError> {
        Err(PipelineError::Collaborator("room service unavailable".into()))
    }
}

/// Records every reward call.
#[derive(Debug, Default)]
pub struct RecordingRewardService {
    rewards: Mutex<Vec<(RoomId, u64)>>,
}

impl RecordingRewardService {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all reward calls in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rewards(&self) -> Vec<(RoomId, u64)> {
        self.rewards.lock().unwrap().clone()
    }
}

#[async_trait]
impl RewardService for RecordingRewardService {
    async fn reward_user(&self, room_id: &RoomId, amount: u64) -> Result<(), PipelineError> {
        self.rewards.lock().unwrap().push((room_id.clone(), amount));
        Ok(())
    }
}

/// A reward service whose calls always fail.
#[derive(Debug)]
pub struct FailingRewardService;

#[async_trait]
impl RewardService for FailingRewardService {
    async fn reward_user(&self, _room_id: &RoomId, _amount: u64) -> Result<(), PipelineError> {
        Err(PipelineError::Collaborator("ledger unavailable".into()))
    }
}
