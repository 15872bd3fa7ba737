//! In-process pub/sub for room log channels.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use roomforge_core::collaborators::LogPublisher;
use roomforge_core::error::PipelineError;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 256;

/// Channel-keyed broadcast hub.
///
/// One long-lived broker is shared by every running workflow. All publishes
/// go through a single mutex, so concurrent publishers are serialized and a
/// single publisher's messages keep their order. Messages published while a
/// channel has no subscribers are dropped.
#[derive(Debug)]
pub struct LogBroker {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

impl Default for LogBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBroker {
    /// Creates a broker whose subscribers may lag by up to 256 messages.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a broker with a per-channel buffer of `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to `channel`. Only messages published afterwards are seen.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Forgets `channel` if nobody is subscribed to it any more.
    ///
    /// Returns `true` when the channel was removed. Subscribers call this
    /// after dropping their receiver so that rooms which never publish
    /// again do not keep a sender alive.
    pub fn release(&self, channel: &str) -> bool {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = channels
            .get(channel)
            .is_some_and(|sender| sender.receiver_count() == 0);
        if idle {
            channels.remove(channel);
            debug!(%channel, "released idle channel");
        }
        idle
    }

    /// Number of channels currently tracked.
    pub fn channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl LogPublisher for LogBroker {
    async fn publish(&self, channel: &str, message: String) -> Result<usize, PipelineError> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(channel) else {
            return Ok(0);
        };

        if let Ok(receivers) = sender.send(message) {
            Ok(receivers)
        } else {
            // Every receiver is gone.
            channels.remove(channel);
            debug!(%channel, "pruned channel without subscribers");
            Ok(0)
        }
    }
}
