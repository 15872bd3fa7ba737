//! State of one workflow execution.

use std::collections::{BTreeMap, BTreeSet};

use roomforge_core::room::RoomId;
use roomforge_core::stage::{Stage, StageOutput};
use uuid::Uuid;

/// Mutable record of a single `execute_workflow` call.
///
/// Created fresh per execution and owned by it; nothing is shared between
/// executions and nothing outlives the call.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Identifier of this execution, for tracing.
    pub run_id: Uuid,
    /// The room being generated.
    pub room_id: RoomId,
    completed_stages: Vec<Stage>,
    failed_stages: BTreeSet<Stage>,
    attempt_counts: BTreeMap<Stage, u32>,
    results: BTreeMap<Stage, StageOutput>,
}

impl WorkflowState {
    /// Creates an empty state for `room_id`.
    #[must_use]
    pub fn new(room_id: RoomId) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            room_id,
            completed_stages: Vec::new(),
            failed_stages: BTreeSet::new(),
            attempt_counts: BTreeMap::new(),
            results: BTreeMap::new(),
        }
    }

    /// The stage that must run next to keep `completed_stages` a prefix of
    /// [`Stage::ORDER`], or `None` once all stages completed.
    #[must_use]
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ORDER.get(self.completed_stages.len()).copied()
    }

    /// Records that `stage` is on attempt number `attempt`.
    pub fn record_attempt(&mut self, stage: Stage, attempt: u32) {
        self.attempt_counts.insert(stage, attempt);
    }

    /// Records a successful stage and its output.
    pub fn record_success(&mut self, output: StageOutput) {
        let stage = output.stage();
        debug_assert_eq!(Some(stage), self.next_stage(), "stages must complete in order");
        self.completed_stages.push(stage);
        self.results.insert(stage, output);
    }

    /// Records a terminal failure of `stage`.
    pub fn record_failure(&mut self, stage: Stage) {
        self.failed_stages.insert(stage);
    }

    /// Stages that completed, in execution order.
    #[must_use]
    pub fn completed_stages(&self) -> &[Stage] {
        &self.completed_stages
    }

    /// Stages that failed terminally.
    #[must_use]
    pub fn failed_stages(&self) -> &BTreeSet<Stage> {
        &self.failed_stages
    }

    /// Attempts made on `stage`; zero if it never ran.
    #[must_use]
    pub fn attempts(&self, stage: Stage) -> u32 {
        self.attempt_counts.get(&stage).copied().unwrap_or(0)
    }

    /// Output of `stage`, if it completed.
    #[must_use]
    pub fn result(&self, stage: Stage) -> Option<&StageOutput> {
        self.results.get(&stage)
    }

    /// Whether every configured stage completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_stages == Stage::ORDER
    }
}
