//! Stage Invoker: one bounded-timeout call to a stage.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use roomforge_core::collaborators::StageClient;
use roomforge_core::error::PipelineError;
use roomforge_core::room::RoomId;
use roomforge_core::stage::{StageDescriptor, StageInput, StageOutput};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Identifies one stage call so that a result arriving after its deadline
/// can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationToken(u64);

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// A stage call that finished within its deadline.
#[derive(Debug, Clone)]
pub struct StageCall {
    /// The typed stage output.
    pub output: StageOutput,
    /// Wall time from call start to response.
    pub elapsed_ms: u64,
    /// Token of the call.
    pub token: OperationToken,
}

/// Races each stage call against the stage's deadline.
///
/// The remote call runs on its own task and reports back over a oneshot
/// channel. When the deadline wins, the receiver is dropped; the task keeps
/// running (it is not cancelled) and its eventual result is discarded.
pub struct StageInvoker {
    client: Arc<dyn StageClient>,
    next_token: AtomicU64,
}

impl StageInvoker {
    /// Creates an invoker over `client`.
    #[must_use]
    pub fn new(client: Arc<dyn StageClient>) -> Self {
        Self {
            client,
            next_token: AtomicU64::new(1),
        }
    }

    /// Calls the stage described by `descriptor` with `input`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Timeout` once `descriptor.timeout_ms` elapses,
    /// or whatever error the stage client reported.
    #[instrument(skip_all, fields(room_id = %room_id, stage = %descriptor.stage))]
    pub async fn call(
        &self,
        room_id: &RoomId,
        descriptor: &StageDescriptor,
        input: &StageInput,
    ) -> Result<StageCall, PipelineError> {
        let stage = descriptor.stage;
        let token = OperationToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let started = Instant::now();

        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let task_descriptor = descriptor.clone();
        let body = input.to_body(room_id);

        tokio::spawn(async move {
            let result = client.call(&task_descriptor, body).await;
            if tx.send(result).is_err() {
                debug!(%token, stage = %task_descriptor.stage, "discarding late stage result");
            }
        });

        let deadline = Duration::from_millis(descriptor.timeout_ms);
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(Ok(payload))) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                debug!(%token, elapsed_ms, "stage call succeeded");
                Ok(StageCall {
                    output: StageOutput::decode(stage, payload),
                    elapsed_ms,
                    token,
                })
            }
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_)) => Err(PipelineError::Transport {
                stage,
                message: "stage call ended without a result".into(),
            }),
            Err(_) => {
                warn!(%token, timeout_ms = descriptor.timeout_ms, "stage call timed out");
                Err(PipelineError::Timeout {
                    stage,
                    timeout_ms: descriptor.timeout_ms,
                })
            }
        }
    }
}
