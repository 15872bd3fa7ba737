//! Wire events exchanged with live viewers.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use roomforge_core::log::AgentLog;
use roomforge_core::room::{NotificationPayload, RoomId};
use serde::{Deserialize, Serialize};

/// Events a viewer sends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a room's broadcast group. Only the presence of `roomId` is
    /// checked; `token` is accepted and ignored.
    #[serde(rename_all = "camelCase")]
    Authenticate {
        /// Room to join.
        #[serde(default)]
        room_id: Option<String>,
        /// Reserved for credential checks; currently unused.
        #[serde(default)]
        token: Option<String>,
    },
    /// Leave a previously joined room.
    #[serde(rename_all = "camelCase")]
    Leave {
        /// Room to leave.
        room_id: String,
    },
}

/// Events pushed to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The connection joined `room_id`.
    #[serde(rename_all = "camelCase")]
    Authenticated {
        /// The joined room.
        room_id: RoomId,
    },
    /// The connection left `room_id`.
    #[serde(rename_all = "camelCase")]
    Left {
        /// The room left.
        room_id: RoomId,
    },
    /// A request from the viewer was rejected.
    Error {
        /// Why.
        message: String,
    },
    /// A room-scoped notification.
    Notification(NotificationPayload),
    /// A progress log from a joined room's workflow.
    AgentLog(AgentLog),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authenticate_parses_with_optional_token() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "authenticate",
            "data": { "roomId": "r1", "token": "t" }
        }))
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::Authenticate {
                room_id: Some("r1".into()),
                token: Some("t".into()),
            }
        );
    }

    #[test]
    fn test_authenticate_without_room_id_still_parses() {
        let event: ClientEvent =
            serde_json::from_value(json!({ "event": "authenticate", "data": {} })).unwrap();

        assert_eq!(
            event,
            ClientEvent::Authenticate {
                room_id: None,
                token: None,
            }
        );
    }

    #[test]
    fn test_authenticated_reply_wire_shape() {
        let value = serde_json::to_value(ServerEvent::Authenticated {
            room_id: RoomId::from("r1"),
        })
        .unwrap();

        assert_eq!(
            value,
            json!({ "event": "authenticated", "data": { "roomId": "r1" } })
        );
    }

    #[test]
    fn test_notification_event_wraps_payload() {
        let payload = NotificationPayload {
            kind: "room_ready".into(),
            room_id: RoomId::from("r1"),
            data: json!({ "url": "https://rooms.example/r1" }),
            timestamp: "2026-01-15T10:00:00.000Z".into(),
        };

        let value = serde_json::to_value(ServerEvent::Notification(payload)).unwrap();

        assert_eq!(value["event"], "notification");
        assert_eq!(value["data"]["type"], "room_ready");
        assert_eq!(value["data"]["roomId"], "r1");
    }
}
