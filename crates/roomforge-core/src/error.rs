//! Pipeline error taxonomy.

use thiserror::Error;

use crate::stage::Stage;

/// Top-level error type for stage execution and its collaborators.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stage call failed at the network or HTTP layer.
    #[error("{stage} stage transport failure: {message}")]
    Transport {
        /// The stage that was being called.
        stage: Stage,
        /// Description of the failure.
        message: String,
    },

    /// The stage did not answer before its deadline.
    #[error("{stage} stage timed out after {timeout_ms}ms")]
    Timeout {
        /// The stage that was being called.
        stage: Stage,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// Every allowed attempt of a stage failed. Terminal for the workflow.
    #[error("{stage} stage failed after {attempts} attempts: {source}")]
    RetryExhausted {
        /// The stage that gave up.
        stage: Stage,
        /// How many attempts were made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: Box<PipelineError>,
    },

    /// A log or notification could not be delivered.
    #[error("publish error: {0}")]
    Publish(String),

    /// A stage name that the pipeline does not know.
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// A room status or reward call failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// Invalid startup configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Whether the Retry Coordinator may attempt the stage again after this
    /// error. Only transport failures and timeouts are recoverable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
