//! Shared application state.

use std::sync::Arc;

use roomforge_core::config::PipelineConfig;
use roomforge_pipeline::application::engine::WorkflowEngine;
use roomforge_realtime::hub::NotificationHub;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Immutable pipeline configuration.
    pub config: Arc<PipelineConfig>,
    /// Runs room workflows.
    pub engine: Arc<WorkflowEngine>,
    /// Live viewer connections and their rooms.
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        config: Arc<PipelineConfig>,
        engine: Arc<WorkflowEngine>,
        hub: Arc<NotificationHub>,
    ) -> Self {
        Self {
            config,
            engine,
            hub,
        }
    }
}
