//! Routes for room workflows and room-scoped notifications.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    Json, Router,
    routing::{get, post},
};
use roomforge_core::room::{RoomId, RoomStatus};
use roomforge_core::stage::WorkflowInput;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /{room_id}/workflow.
#[derive(Debug, Deserialize)]
pub struct StartWorkflowRequest {
    /// Caller-supplied input handed to the story stage.
    #[serde(default)]
    pub input: Value,
}

/// Response body for POST /{room_id}/workflow.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowResponse {
    /// The room whose workflow was started.
    pub room_id: RoomId,
    /// Always `running`; the outcome is reported on the room's log channel.
    pub status: RoomStatus,
}

/// Request body for POST /{room_id}/notifications.
#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    /// Application-defined notification type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Arbitrary payload.
    #[serde(default)]
    pub data: Value,
}

/// Response body for POST /{room_id}/notifications.
#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    /// Number of connections the notification was handed to.
    pub delivered: usize,
}

/// Response body for GET /{room_id}/clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedClientsResponse {
    /// The queried room.
    pub room_id: RoomId,
    /// Connections currently joined to it.
    pub connected_clients: usize,
}

fn room_id_from_path(raw: String) -> Result<RoomId, ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::Validation("Room ID required".into()));
    }
    Ok(RoomId::from(raw))
}

/// POST /{room_id}/workflow
#[instrument(skip(state, request))]
async fn start_workflow(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<StartWorkflowRequest>,
) -> Result<(StatusCode, Json<StartWorkflowResponse>), ApiError> {
    let room_id = room_id_from_path(room_id)?;

    info!("starting room workflow");
    // Detached: the workflow reports through room status and logs.
    drop(Arc::clone(&state.engine).start_workflow(room_id.clone(), WorkflowInput(request.input)));

    Ok((
        StatusCode::ACCEPTED,
        Json(StartWorkflowResponse {
            room_id,
            status: RoomStatus::Running,
        }),
    ))
}

/// POST /{room_id}/notifications
#[instrument(skip(state, request), fields(kind = %request.kind))]
async fn send_notification(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>, ApiError> {
    let room_id = room_id_from_path(room_id)?;
    if request.kind.trim().is_empty() {
        return Err(ApiError::Validation("notification type required".into()));
    }

    let delivered = state
        .hub
        .send_notification(&room_id, &request.kind, request.data);

    Ok(Json(SendNotificationResponse { delivered }))
}

/// GET /{room_id}/clients
async fn connected_clients(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<ConnectedClientsResponse>, ApiError> {
    let room_id = room_id_from_path(room_id)?;
    let connected_clients = state.hub.connected_clients_count(&room_id);

    Ok(Json(ConnectedClientsResponse {
        room_id,
        connected_clients,
    }))
}

/// Returns the router for room operations.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{room_id}/workflow", post(start_workflow))
        .route("/{room_id}/notifications", post(send_notification))
        .route("/{room_id}/clients", get(connected_clients))
}
