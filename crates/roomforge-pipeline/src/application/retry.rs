//! Retry Coordinator: bounded retries with capped exponential backoff.

use std::sync::Arc;

use roomforge_core::config::PipelineConfig;
use roomforge_core::error::PipelineError;
use roomforge_core::log::{AgentType, LogLevel};
use roomforge_core::stage::{Stage, StageInput, StageOutput};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::application::emitter::LogEmitter;
use crate::application::invoker::StageInvoker;
use crate::domain::state::WorkflowState;

pub(crate) fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::Story => "Story",
        Stage::Asset => "Asset",
        Stage::Code => "Code",
        Stage::Deploy => "Deploy",
    }
}

/// Runs one stage to completion or terminal failure.
pub struct RetryCoordinator {
    config: Arc<PipelineConfig>,
    invoker: StageInvoker,
    emitter: LogEmitter,
}

impl RetryCoordinator {
    /// Creates a coordinator using `config`'s stage table and retry policy.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>, invoker: StageInvoker, emitter: LogEmitter) -> Self {
        Self {
            config,
            invoker,
            emitter,
        }
    }

    /// Calls the stage `input` is addressed to, at most
    /// `retry.max_attempts` times, sleeping the policy's backoff between
    /// attempts. Progress is recorded in `state` and on the log channel.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownStage` without calling anything when
    /// the stage has no descriptor (the stage is still recorded as failed), the stage client's error unchanged when it
    /// is not retryable, and `PipelineError::RetryExhausted` once the final
    /// attempt fails.
    #[instrument(skip_all, fields(room_id = %state.room_id, stage = %input.stage()))]
    pub async fn run(
        &self,
        input: &StageInput,
        state: &mut WorkflowState,
    ) -> Result<StageOutput, PipelineError> {
        let stage = input.stage();
        let descriptor = match self.config.descriptor(stage) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                state.record_failure(stage);
                warn!(error = %err, "stage has no descriptor");
                return Err(err);
            }
        };
        let policy = self.config.retry;
        let agent = AgentType::from(stage);
        let title = stage_title(stage);
        let room_id = state.room_id.clone();

        let mut attempt = 1;
        loop {
            state.record_attempt(stage, attempt);

            let err = match self.invoker.call(&room_id, descriptor, input).await {
                Ok(call) => {
                    info!(attempt, elapsed_ms = call.elapsed_ms, "stage completed");
                    state.record_success(call.output.clone());
                    self.emitter
                        .emit(
                            &room_id,
                            agent,
                            LogLevel::Success,
                            format!("{title} agent completed"),
                            Some(json!({ "attempts": attempt, "elapsedMs": call.elapsed_ms })),
                        )
                        .await;
                    return Ok(call.output);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= policy.max_attempts {
                state.record_failure(stage);
                warn!(attempt, error = %err, "stage failed terminally");
                self.emitter
                    .emit(
                        &room_id,
                        agent,
                        LogLevel::Error,
                        format!("{title} agent failed after {attempt} attempt(s): {err}"),
                        Some(json!({ "attempts": attempt, "error": err.to_string() })),
                    )
                    .await;

                if !err.is_retryable() {
                    return Err(err);
                }
                return Err(PipelineError::RetryExhausted {
                    stage,
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay_ms = policy.delay_ms_for_attempt(attempt);
            warn!(attempt, delay_ms, error = %err, "stage attempt failed, backing off");
            self.emitter
                .emit(
                    &room_id,
                    agent,
                    LogLevel::Warn,
                    format!(
                        "{title} agent failed (attempt {attempt}/{}), retrying in {delay_ms}ms: {err}",
                        policy.max_attempts
                    ),
                    Some(json!({ "attempt": attempt, "delayMs": delay_ms, "error": err.to_string() })),
                )
                .await;
            tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomforge_core::config::RetryPolicy;
    use roomforge_core::log::{AgentLog, log_channel};
    use roomforge_core::room::RoomId;
    use roomforge_core::stage::{StageDescriptor, WorkflowInput};
    use roomforge_test_support::{FixedClock, RecordingLogPublisher, ScriptedStageClient};

    struct Harness {
        coordinator: RetryCoordinator,
        client: Arc<ScriptedStageClient>,
        publisher: Arc<RecordingLogPublisher>,
    }

    fn harness(client: ScriptedStageClient, config: PipelineConfig) -> Harness {
        let client = Arc::new(client);
        let publisher = Arc::new(RecordingLogPublisher::new());
        let emitter = LogEmitter::new(publisher.clone(), Arc::new(FixedClock::at_reference_time()));
        let coordinator = RetryCoordinator::new(
            Arc::new(config),
            StageInvoker::new(client.clone()),
            emitter,
        );
        Harness {
            coordinator,
            client,
            publisher,
        }
    }

    fn default_config() -> PipelineConfig {
        PipelineConfig::from_lookup(|_| None).unwrap()
    }

    fn story_input() -> StageInput {
        StageInput::Story(WorkflowInput(json!({ "theme": "lighthouse" })))
    }

    fn logs_with_level(logs: &[AgentLog], level: LogLevel) -> Vec<&AgentLog> {
        logs.iter().filter(|l| l.level == level).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_records_and_logs_once() {
        // Arrange
        let h = harness(ScriptedStageClient::new(), default_config());
        let mut state = WorkflowState::new(RoomId::from("r1"));

        // Act
        let output = h.coordinator.run(&story_input(), &mut state).await.unwrap();

        // Assert
        assert_eq!(output.stage(), Stage::Story);
        assert_eq!(h.client.call_count(Stage::Story), 1);
        assert_eq!(state.attempts(Stage::Story), 1);
        assert_eq!(state.completed_stages(), &[Stage::Story]);

        let logs = h.publisher.logs_on(&log_channel(&RoomId::from("r1")));
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Success);
        assert_eq!(logs[0].agent_type, AgentType::Story);
        assert_eq!(logs[0].metadata.as_ref().unwrap()["attempts"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_warn_twice_then_error_once() {
        // Arrange
        let h = harness(
            ScriptedStageClient::new().always_failing(Stage::Story),
            default_config(),
        );
        let mut state = WorkflowState::new(RoomId::from("r1"));
        let started = tokio::time::Instant::now();

        // Act
        let result = h.coordinator.run(&story_input(), &mut state).await;

        // Assert
        match result {
            Err(PipelineError::RetryExhausted {
                stage,
                attempts,
                source,
            }) => {
                assert_eq!(stage, Stage::Story);
                assert_eq!(attempts, 3);
                assert!(matches!(*source, PipelineError::Transport { .. }));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        assert_eq!(h.client.call_count(Stage::Story), 3);
        assert_eq!(state.attempts(Stage::Story), 3);
        assert!(state.failed_stages().contains(&Stage::Story));
        assert!(state.completed_stages().is_empty());
        assert!(started.elapsed() >= std::time::Duration::from_millis(6_000));

        let logs = h.publisher.logs_on("room:r1:logs");
        let warns = logs_with_level(&logs, LogLevel::Warn);
        let delays: Vec<u64> = warns
            .iter()
            .map(|l| l.metadata.as_ref().unwrap()["delayMs"].as_u64().unwrap())
            .collect();
        assert_eq!(delays, vec![2_000, 4_000]);

        let errors = logs_with_level(&logs, LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].metadata.as_ref().unwrap()["attempts"], 3);
        assert_eq!(logs.last().unwrap().level, LogLevel::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_third_attempt_has_no_error_log() {
        // Arrange
        let h = harness(
            ScriptedStageClient::new().failing_first(Stage::Story, 2),
            default_config(),
        );
        let mut state = WorkflowState::new(RoomId::from("r1"));

        // Act
        let result = h.coordinator.run(&story_input(), &mut state).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(h.client.call_count(Stage::Story), 3);
        assert_eq!(state.attempts(Stage::Story), 3);

        let logs = h.publisher.logs_on("room:r1:logs");
        assert_eq!(logs_with_level(&logs, LogLevel::Warn).len(), 2);
        assert!(logs_with_level(&logs, LogLevel::Error).is_empty());
        assert_eq!(logs.last().unwrap().level, LogLevel::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_never_sleeps() {
        // Arrange
        let config = PipelineConfig::new(
            default_config().stages().to_vec(),
            RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            100,
        )
        .unwrap();
        let h = harness(
            ScriptedStageClient::new().always_failing(Stage::Story),
            config,
        );
        let mut state = WorkflowState::new(RoomId::from("r1"));

        // Act
        let result = h.coordinator.run(&story_input(), &mut state).await;

        // Assert
        assert!(matches!(
            result,
            Err(PipelineError::RetryExhausted { attempts: 1, .. })
        ));
        let logs = h.publisher.logs_on("room:r1:logs");
        assert!(logs_with_level(&logs, LogLevel::Warn).is_empty());
    }

    #[tokio::test]
    async fn test_missing_descriptor_is_unknown_stage_without_calls() {
        // Arrange
        let config = PipelineConfig::new(
            vec![StageDescriptor {
                stage: Stage::Asset,
                timeout_ms: 1_000,
                endpoint: "http://asset".into(),
            }],
            RetryPolicy::default(),
            100,
        )
        .unwrap();
        let h = harness(ScriptedStageClient::new(), config);
        let mut state = WorkflowState::new(RoomId::from("r1"));

        // Act
        let result = h.coordinator.run(&story_input(), &mut state).await;

        // Assert
        assert!(matches!(result, Err(PipelineError::UnknownStage(_))));
        assert!(h.client.calls().is_empty());
        assert_eq!(state.attempts(Stage::Story), 0);
        assert!(state.failed_stages().contains(&Stage::Story));
    }
}
