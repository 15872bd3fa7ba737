//! Test publishers: mock `LogPublisher` implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use roomforge_core::collaborators::LogPublisher;
use roomforge_core::error::PipelineError;
use roomforge_core::log::AgentLog;

/// A publisher that records every `(channel, message)` pair and reports a
/// single subscriber.
#[derive(Debug, Default)]
pub struct RecordingLogPublisher {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingLogPublisher {
    /// Creates an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all published `(channel, message)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Parses every message published on `channel` as an `AgentLog`.
    ///
    /// # Panics
    ///
    /// Panics if a message is not a valid `AgentLog`.
    pub fn logs_on(&self, channel: &str) -> Vec<AgentLog> {
        self.published()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, message)| serde_json::from_str(&message).unwrap())
            .collect()
    }
}

#[async_trait]
impl LogPublisher for RecordingLogPublisher {
    async fn publish(&self, channel: &str, message: String) -> Result<usize, PipelineError> {
        self.published
            .lock()
            .unwrap()
            .push((channel.to_owned(), message));
        Ok(1)
    }
}

/// A publisher whose every publish fails. Counts the attempts.
#[derive(Debug, Default)]
pub struct FailingLogPublisher {
    attempts: AtomicUsize,
}

impl FailingLogPublisher {
    /// Creates a failing publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of publish calls received.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogPublisher for FailingLogPublisher {
    async fn publish(&self, _channel: &str, _message: String) -> Result<usize, PipelineError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PipelineError::Publish("connection reset by peer".into()))
    }
}
