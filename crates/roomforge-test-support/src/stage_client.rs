//! Scripted `StageClient` for driving the pipeline through chosen outcomes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use roomforge_core::collaborators::StageClient;
use roomforge_core::error::PipelineError;
use roomforge_core::stage::{Stage, StageDescriptor};
use serde_json::{Value, json};

/// One scripted answer to a stage call.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Return this payload immediately.
    Succeed(Value),
    /// Fail with a transport error carrying this message.
    Fail(String),
    /// Never answer.
    Hang,
    /// Answer with the payload after the delay.
    Delayed(Duration, Value),
}

/// A stage client that answers from per-stage scripts and records every call.
///
/// Once a stage's script is used up it succeeds with `{"stage": "<name>"}`,
/// unless the stage was marked with [`ScriptedStageClient::always_failing`].
#[derive(Debug, Default)]
pub struct ScriptedStageClient {
    scripts: Mutex<HashMap<Stage, VecDeque<ScriptedResponse>>>,
    failing: Mutex<HashSet<Stage>>,
    calls: Mutex<Vec<(Stage, Value)>>,
}

impl ScriptedStageClient {
    /// A client on which every stage succeeds on the first call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `responses` for `stage`, answered in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_script(self, stage: Stage, responses: Vec<ScriptedResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .extend(responses);
        self
    }

    /// `stage` fails `times` times, then succeeds.
    #[must_use]
    pub fn failing_first(self, stage: Stage, times: usize) -> Self {
        let failures = (1..=times)
            .map(|n| ScriptedResponse::Fail(format!("scripted failure {n}")))
            .collect();
        self.with_script(stage, failures)
    }

    /// `stage` fails on every call.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn always_failing(self, stage: Stage) -> Self {
        self.failing.lock().unwrap().insert(stage);
        self
    }

    /// Stages called so far, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<Stage> {
        self.calls.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    /// Number of calls made to `stage`.
    pub fn call_count(&self, stage: Stage) -> usize {
        self.calls().into_iter().filter(|s| *s == stage).count()
    }

    /// Request bodies sent to `stage`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn bodies(&self, stage: Stage) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn next_response(&self, stage: Stage) -> ScriptedResponse {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(response) => response,
            None if self.failing.lock().unwrap().contains(&stage) => {
                ScriptedResponse::Fail(format!("{stage} agent unavailable"))
            }
            None => ScriptedResponse::Succeed(json!({ "stage": stage.as_str() })),
        }
    }
}

#[async_trait]
impl StageClient for ScriptedStageClient {
    async fn call(
        &self,
        descriptor: &StageDescriptor,
        body: Value,
    ) -> Result<Value, PipelineError> {
        let stage = descriptor.stage;
        self.calls.lock().unwrap().push((stage, body));

        match self.next_response(stage) {
            ScriptedResponse::Succeed(payload) => Ok(payload),
            ScriptedResponse::Fail(message) => Err(PipelineError::Transport { stage, message }),
            ScriptedResponse::Hang => std::future::pending().await,
            ScriptedResponse::Delayed(delay, payload) => {
                tokio::time::sleep(delay).await;
                Ok(payload)
            }
        }
    }
}
