//! Shared test mocks and utilities for the Roomforge orchestrator.

mod clock;
mod collaborators;
mod publisher;
mod stage_client;

pub use clock::FixedClock;
pub use collaborators::{
    FailingRewardService, FailingRoomStatus, RecordingRewardService, RecordingRoomStatus,
};
pub use publisher::{FailingLogPublisher, RecordingLogPublisher};
pub use stage_client::{ScriptedResponse, ScriptedStageClient};
