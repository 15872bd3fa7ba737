//! Structured progress logs published to a room's log channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::room::RoomId;
use crate::stage::Stage;

/// Which component produced a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// The story stage.
    Story,
    /// The asset stage.
    Asset,
    /// The code stage.
    Code,
    /// The deploy stage.
    Deploy,
    /// The workflow engine itself.
    Orchestrator,
}

impl From<Stage> for AgentType {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Story => Self::Story,
            Stage::Asset => Self::Asset,
            Stage::Code => Self::Code,
            Stage::Deploy => Self::Deploy,
        }
    }
}

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Progress information.
    Info,
    /// A recoverable failure, e.g. a retry.
    Warn,
    /// A terminal failure.
    Error,
    /// A completed step.
    Success,
}

/// One published progress event. Serialized once, published, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentLog {
    /// ISO-8601 creation time.
    pub timestamp: String,
    /// Producer of the log.
    pub agent_type: AgentType,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Name of the pub/sub channel carrying a room's logs.
#[must_use]
pub fn log_channel(room_id: &RoomId) -> String {
    format!("room:{room_id}:logs")
}
