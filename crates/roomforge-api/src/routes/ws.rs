//! Websocket endpoint for live viewers.
//!
//! Frames are JSON text messages shaped `{"event": ..., "data": ...}`. A
//! viewer sends `authenticate` with a `roomId` to join that room; it then
//! receives the room's `notification` and `agent_log` events until it sends
//! `leave` or disconnects.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::{Router, routing::get};
use roomforge_realtime::events::{ClientEvent, ServerEvent};
use roomforge_realtime::hub::NotificationHub;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Result of waiting on either side of a connection.
enum Step {
    Incoming(Option<Result<Message, axum::Error>>),
    Outgoing(Option<ServerEvent>),
}

/// Parses a client text frame.
///
/// # Errors
///
/// Returns the JSON error when the frame is not a known client event.
pub fn decode_client_frame(text: &str) -> Result<ClientEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Renders a server event as a text frame.
///
/// # Errors
///
/// Returns the JSON error if the event cannot be serialized.
pub fn encode_server_event(event: &ServerEvent) -> Result<Message, serde_json::Error> {
    Ok(Message::Text(serde_json::to_string(event)?.into()))
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_connection(socket, state.hub))
}

async fn serve_connection(mut socket: WebSocket, hub: Arc<NotificationHub>) {
    let (connection_id, mut events) = hub.connect();
    info!(connection_id = %connection_id, "websocket opened");

    loop {
        let step = tokio::select! {
            incoming = socket.recv() => Step::Incoming(incoming),
            outgoing = events.recv() => Step::Outgoing(outgoing),
        };

        match step {
            Step::Incoming(Some(Ok(Message::Text(text)))) => {
                match decode_client_frame(text.as_str()) {
                    Ok(event) => hub.handle(connection_id, event),
                    Err(err) => {
                        debug!(connection_id = %connection_id, error = %err, "rejecting client frame");
                        let reply = ServerEvent::Error {
                            message: format!("invalid message: {err}"),
                        };
                        if !send_event(&mut socket, &reply).await {
                            break;
                        }
                    }
                }
            }
            Step::Incoming(Some(Ok(Message::Close(_))) | None) => break,
            Step::Incoming(Some(Ok(_))) => {}
            Step::Incoming(Some(Err(err))) => {
                warn!(connection_id = %connection_id, error = %err, "websocket receive failed");
                break;
            }
            Step::Outgoing(Some(event)) => {
                if !send_event(&mut socket, &event).await {
                    break;
                }
            }
            Step::Outgoing(None) => break,
        }
    }

    hub.disconnect(connection_id);
    info!(connection_id = %connection_id, "websocket closed");
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    let frame = match encode_server_event(event) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "dropping unserializable event");
            return true;
        }
    };
    socket.send(frame).await.is_ok()
}

/// Returns the websocket router.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}
