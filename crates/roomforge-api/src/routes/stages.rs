//! Read-only view of the configured stage table.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use roomforge_core::stage::{Stage, StageDescriptor};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /
async fn list_stages(State(state): State<AppState>) -> Json<Vec<StageDescriptor>> {
    Json(state.config.stages().to_vec())
}

/// GET /{stage}
async fn get_stage(
    State(state): State<AppState>,
    Path(stage): Path<String>,
) -> Result<Json<StageDescriptor>, ApiError> {
    let stage: Stage = stage.parse()?;
    let descriptor = state.config.descriptor(stage)?;
    Ok(Json(descriptor.clone()))
}

/// Returns the router for stage configuration queries.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stages))
        .route("/{stage}", get(get_stage))
}
