//! Log Emitter: publishes `AgentLog`s to a room's log channel.

use std::sync::Arc;

use roomforge_core::clock::Clock;
use roomforge_core::collaborators::LogPublisher;
use roomforge_core::log::{AgentLog, AgentType, LogLevel, log_channel};
use roomforge_core::room::RoomId;
use serde_json::Value;
use tracing::{debug, warn};

/// Fire-and-forget publisher of progress logs.
///
/// `emit` never fails: serialization and publish errors are traced locally
/// and dropped so that logging can never abort a workflow. Delivery is
/// at-most-once with no replay; subscribers that join late miss history.
#[derive(Clone)]
pub struct LogEmitter {
    publisher: Arc<dyn LogPublisher>,
    clock: Arc<dyn Clock>,
}

impl LogEmitter {
    /// Creates an emitter over a shared publisher.
    #[must_use]
    pub fn new(publisher: Arc<dyn LogPublisher>, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, clock }
    }

    /// Publishes one log on `room:<room_id>:logs`.
    pub async fn emit(
        &self,
        room_id: &RoomId,
        agent_type: AgentType,
        level: LogLevel,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) {
        let log = AgentLog {
            timestamp: self.clock.timestamp(),
            agent_type,
            level,
            message: message.into(),
            metadata,
        };
        let channel = log_channel(room_id);

        let body = match serde_json::to_string(&log) {
            Ok(body) => body,
            Err(err) => {
                warn!(%room_id, error = %err, "failed to serialize agent log");
                return;
            }
        };

        match self.publisher.publish(&channel, body).await {
            Ok(receivers) => {
                debug!(%room_id, ?agent_type, ?level, receivers, message = %log.message, "agent log published");
            }
            Err(err) => {
                warn!(%room_id, %channel, error = %err, "failed to publish agent log");
            }
        }
    }
}
