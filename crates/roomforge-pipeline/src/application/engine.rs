//! Workflow Engine: drives the stage sequence for one room.
//!
//! `Started → Story → Asset → Code → Deploy → Completed`, or `→ Failed` at the
//! first stage whose retries run out. Single-shot: there is no pause, resume
//! or external cancellation. Workflow state is never persisted, so a process
//! restart mid-run leaves the room in `running`.

use std::sync::Arc;

use roomforge_core::clock::Clock;
use roomforge_core::collaborators::{LogPublisher, RewardService, RoomStatusUpdater, StageClient};
use roomforge_core::config::PipelineConfig;
use roomforge_core::error::PipelineError;
use roomforge_core::log::{AgentType, LogLevel};
use roomforge_core::room::{RoomId, RoomStatus};
use roomforge_core::stage::{Stage, StageInput, WorkflowInput};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::application::emitter::LogEmitter;
use crate::application::invoker::StageInvoker;
use crate::application::retry::{RetryCoordinator, stage_title};
use crate::domain::state::WorkflowState;

/// External systems the engine reports to.
pub struct EngineCollaborators {
    /// Remote stage calls.
    pub stage_client: Arc<dyn StageClient>,
    /// Room log channel transport.
    pub log_publisher: Arc<dyn LogPublisher>,
    /// Room status writes.
    pub room_status: Arc<dyn RoomStatusUpdater>,
    /// Reward minting.
    pub rewards: Arc<dyn RewardService>,
    /// Timestamp source for logs.
    pub clock: Arc<dyn Clock>,
}

/// Sequential orchestrator for room generation.
pub struct WorkflowEngine {
    config: Arc<PipelineConfig>,
    coordinator: RetryCoordinator,
    emitter: LogEmitter,
    room_status: Arc<dyn RoomStatusUpdater>,
    rewards: Arc<dyn RewardService>,
}

fn stage_names(stages: impl IntoIterator<Item = Stage>) -> Vec<&'static str> {
    stages.into_iter().map(Stage::as_str).collect()
}

impl WorkflowEngine {
    /// Creates an engine over an immutable configuration.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>, collaborators: EngineCollaborators) -> Self {
        let emitter = LogEmitter::new(collaborators.log_publisher, collaborators.clock);
        let coordinator = RetryCoordinator::new(
            Arc::clone(&config),
            StageInvoker::new(collaborators.stage_client),
            emitter.clone(),
        );
        Self {
            config,
            coordinator,
            emitter,
            room_status: collaborators.room_status,
            rewards: collaborators.rewards,
        }
    }

    /// Marks the room `running` and executes its workflow on a new task.
    ///
    /// Distinct rooms run fully concurrently; each execution owns its state.
    pub fn start_workflow(
        self: Arc<Self>,
        room_id: RoomId,
        input: WorkflowInput,
    ) -> JoinHandle<WorkflowState> {
        tokio::spawn(async move {
            self.set_status(&room_id, RoomStatus::Running).await;
            self.execute_workflow(room_id, input).await
        })
    }

    /// Runs every stage in order for `room_id`.
    ///
    /// Never fails: the outcome is visible through the room's status and log
    /// channel, and in the returned state.
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn execute_workflow(&self, room_id: RoomId, input: WorkflowInput) -> WorkflowState {
        let mut state = WorkflowState::new(room_id);
        info!(run_id = %state.run_id, "starting workflow");
        self.emitter
            .emit(
                &state.room_id,
                AgentType::Orchestrator,
                LogLevel::Info,
                "Starting room generation workflow",
                Some(json!({
                    "runId": state.run_id,
                    "stages": stage_names(Stage::ORDER),
                })),
            )
            .await;

        match self.run_stages(input, &mut state).await {
            Ok(()) => self.complete(&state).await,
            Err(err) => self.fail(&state, &err).await,
        }

        state
    }

    async fn run_stages(
        &self,
        input: WorkflowInput,
        state: &mut WorkflowState,
    ) -> Result<(), PipelineError> {
        let mut next = Some(StageInput::Story(input));
        while let Some(stage_input) = next {
            let stage = stage_input.stage();
            self.emitter
                .emit(
                    &state.room_id,
                    AgentType::from(stage),
                    LogLevel::Info,
                    format!("{} agent started", stage_title(stage)),
                    None,
                )
                .await;

            let output = self.coordinator.run(&stage_input, state).await?;
            next = StageInput::following(&output);
        }
        Ok(())
    }

    async fn complete(&self, state: &WorkflowState) {
        let room_id = &state.room_id;
        info!(run_id = %state.run_id, "workflow completed");

        self.set_status(room_id, RoomStatus::Done).await;
        self.emitter
            .emit(
                room_id,
                AgentType::Orchestrator,
                LogLevel::Success,
                "Room generation complete",
                Some(json!({ "completedStages": stage_names(state.completed_stages().iter().copied()) })),
            )
            .await;

        let amount = self.config.reward_amount;
        match self.rewards.reward_user(room_id, amount).await {
            Ok(()) => {
                self.emitter
                    .emit(
                        room_id,
                        AgentType::Orchestrator,
                        LogLevel::Success,
                        format!("Reward of {amount} issued"),
                        Some(json!({ "amount": amount })),
                    )
                    .await;
            }
            Err(err) => {
                warn!(%room_id, error = %err, "reward could not be issued");
                self.emitter
                    .emit(
                        room_id,
                        AgentType::Orchestrator,
                        LogLevel::Warn,
                        format!("Reward could not be issued: {err}"),
                        Some(json!({ "amount": amount, "error": err.to_string() })),
                    )
                    .await;
            }
        }
    }

    async fn fail(&self, state: &WorkflowState, err: &PipelineError) {
        let room_id = &state.room_id;
        error!(run_id = %state.run_id, error = %err, "workflow failed");

        self.set_status(room_id, RoomStatus::Error).await;

        let completed = stage_names(state.completed_stages().iter().copied());
        let failed = stage_names(state.failed_stages().iter().copied());
        self.emitter
            .emit(
                room_id,
                AgentType::Orchestrator,
                LogLevel::Error,
                format!(
                    "Workflow failed: {err}. Completed: [{}]. Failed: [{}]",
                    completed.join(", "),
                    failed.join(", ")
                ),
                Some(json!({
                    "completedStages": completed,
                    "failedStages": failed,
                    "error": err.to_string(),
                })),
            )
            .await;
    }

    async fn set_status(&self, room_id: &RoomId, status: RoomStatus) {
        if let Err(err) = self.room_status.update_room_status(room_id, status).await {
            warn!(%room_id, %status, error = %err, "failed to update room status");
        }
    }
}
