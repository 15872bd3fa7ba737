//! Health check endpoint.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use roomforge_core::stage::StageDescriptor;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Configured stages, in execution order.
    pub stages: Vec<&'static str>,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        stages: state
            .config
            .stages()
            .iter()
            .map(|descriptor: &StageDescriptor| descriptor.stage.as_str())
            .collect(),
    })
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
