//! Notification Hub: room membership and room-scoped fan-out.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use roomforge_core::clock::Clock;
use roomforge_core::log::{AgentLog, log_channel};
use roomforge_core::room::{NotificationPayload, RoomId};
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::LogBroker;
use crate::events::{ClientEvent, ServerEvent};

const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Identifies one live viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Connection {
    sender: mpsc::Sender<ServerEvent>,
    /// Joined rooms. Dropping a room's stop handle ends its log relay.
    rooms: HashMap<RoomId, oneshot::Sender<()>>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl Registry {
    fn detach(&mut self, connection_id: ConnectionId, room_id: &RoomId) {
        if let Some(members) = self.rooms.get_mut(room_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }
}

/// Offers `event` to one viewer queue without waiting.
///
/// A full queue drops the event; delivery is at-most-once.
fn offer(sender: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> Result<(), TrySendError<()>> {
    sender.try_send(event).map_err(|err| match err {
        TrySendError::Full(_) => TrySendError::Full(()),
        TrySendError::Closed(_) => TrySendError::Closed(()),
    })
}

/// Tracks which live connections have joined which rooms.
///
/// Joining a room also subscribes the connection to that room's log
/// channel on the shared [`LogBroker`]; every published [`AgentLog`] is
/// forwarded to the connection as [`ServerEvent::AgentLog`] until it leaves
/// or disconnects. Each connection's queue is bounded: events that find it
/// full are dropped rather than buffered.
pub struct NotificationHub {
    registry: RwLock<Registry>,
    broker: Arc<LogBroker>,
    clock: Arc<dyn Clock>,
    queue_capacity: usize,
}

impl NotificationHub {
    /// Creates an empty hub relaying logs from `broker`, with room for 128
    /// pending events per connection.
    #[must_use]
    pub fn new(broker: Arc<LogBroker>, clock: Arc<dyn Clock>) -> Self {
        Self::with_queue_capacity(broker, clock, DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates an empty hub whose connections hold at most `capacity`
    /// pending events.
    #[must_use]
    pub fn with_queue_capacity(
        broker: Arc<LogBroker>,
        clock: Arc<dyn Clock>,
        capacity: usize,
    ) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            broker,
            clock,
            queue_capacity: capacity.max(1),
        }
    }

    /// Registers a new connection. Events for it arrive on the returned
    /// receiver until [`disconnect`](Self::disconnect) is called.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let id = ConnectionId::generate();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .insert(
                id,
                Connection {
                    sender,
                    rooms: HashMap::new(),
                },
            );
        debug!(connection_id = %id, "viewer connected");
        (id, receiver)
    }

    /// Applies one event received from `connection_id` and replies on its
    /// event stream.
    pub fn handle(&self, connection_id: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::Authenticate { room_id, .. } => {
                let Some(room_id) = room_id.filter(|id| !id.trim().is_empty()) else {
                    self.deliver(
                        connection_id,
                        ServerEvent::Error {
                            message: "Room ID required".into(),
                        },
                    );
                    return;
                };
                let room_id = RoomId::from(room_id);
                self.join(connection_id, &room_id);
                self.deliver(connection_id, ServerEvent::Authenticated { room_id });
            }
            ClientEvent::Leave { room_id } => {
                let room_id = RoomId::from(room_id);
                self.leave(connection_id, &room_id);
                self.deliver(connection_id, ServerEvent::Left { room_id });
            }
        }
    }

    /// Adds `connection_id` to `room_id`'s broadcast group.
    ///
    /// Returns `false` when the connection is unknown or already joined.
    pub fn join(&self, connection_id: ConnectionId, room_id: &RoomId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let Some(connection) = registry.connections.get_mut(&connection_id) else {
            return false;
        };
        if connection.rooms.contains_key(room_id) {
            return false;
        }

        let logs = self.broker.subscribe(&log_channel(room_id));
        let (stop, stopped) = oneshot::channel();
        tokio::spawn(relay_room_logs(
            connection.sender.clone(),
            room_id.clone(),
            Arc::clone(&self.broker),
            logs,
            stopped,
        ));
        connection.rooms.insert(room_id.clone(), stop);
        registry
            .rooms
            .entry(room_id.clone())
            .or_default()
            .insert(connection_id);

        info!(connection_id = %connection_id, room_id = %room_id, "viewer joined room");
        true
    }

    /// Removes `connection_id` from `room_id`'s broadcast group.
    ///
    /// Returns `false` when the connection was not joined.
    pub fn leave(&self, connection_id: ConnectionId, room_id: &RoomId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let Some(stop) = registry
            .connections
            .get_mut(&connection_id)
            .and_then(|connection| connection.rooms.remove(room_id))
        else {
            return false;
        };
        drop(stop);
        registry.detach(connection_id, room_id);
        info!(connection_id = %connection_id, room_id = %room_id, "viewer left room");
        true
    }

    /// Forgets `connection_id` and removes it from every room it joined.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let Some(connection) = registry.connections.remove(&connection_id) else {
            return;
        };
        for room_id in connection.rooms.into_keys() {
            registry.detach(connection_id, &room_id);
        }
        debug!(connection_id = %connection_id, "viewer disconnected");
    }

    /// Offers a `notification` event to every connection currently joined
    /// to `room_id` and returns how many accepted it. Nobody joined means
    /// nobody receives it; nothing is queued for absent or saturated
    /// viewers.
    pub fn send_notification(&self, room_id: &RoomId, kind: &str, data: Value) -> usize {
        let payload = NotificationPayload {
            kind: kind.to_owned(),
            room_id: room_id.clone(),
            data,
            timestamp: self.clock.timestamp(),
        };

        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let Some(members) = registry.rooms.get(room_id) else {
            debug!(room_id = %room_id, kind, "notification dropped, room has no viewers");
            return 0;
        };

        let mut delivered = 0;
        for connection_id in members {
            let Some(connection) = registry.connections.get(connection_id) else {
                continue;
            };
            match offer(&connection.sender, ServerEvent::Notification(payload.clone())) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(())) => {
                    warn!(connection_id = %connection_id, room_id = %room_id, kind, "viewer queue full, notification dropped");
                }
                Err(TrySendError::Closed(())) => {
                    warn!(connection_id = %connection_id, room_id = %room_id, kind, "notification delivery failed");
                }
            }
        }

        info!(room_id = %room_id, kind, delivered, "notification sent");
        delivered
    }

    /// Number of connections currently joined to `room_id`.
    pub fn connected_clients_count(&self, room_id: &RoomId) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .get(room_id)
            .map_or(0, HashSet::len)
    }

    /// Whether `connection_id` is joined to `room_id`.
    pub fn is_member(&self, connection_id: ConnectionId, room_id: &RoomId) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .get(room_id)
            .is_some_and(|members| members.contains(&connection_id))
    }

    fn deliver(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let Some(connection) = registry.connections.get(&connection_id) else {
            return false;
        };
        match offer(&connection.sender, event) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                warn!(connection_id = %connection_id, "viewer queue full, reply dropped");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

/// Forwards one room's logs to one viewer until `stop` fires, the viewer's
/// queue closes, or the channel closes. On exit the broker is asked to
/// release the channel.
async fn relay_room_logs(
    sender: mpsc::Sender<ServerEvent>,
    room_id: RoomId,
    broker: Arc<LogBroker>,
    mut logs: broadcast::Receiver<String>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let received = tokio::select! {
            _ = &mut stop => break,
            received = logs.recv() => received,
        };

        let message = match received {
            Ok(message) => message,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(room_id = %room_id, skipped, "viewer fell behind, logs skipped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let log = match serde_json::from_str::<AgentLog>(&message) {
            Ok(log) => log,
            Err(err) => {
                warn!(room_id = %room_id, error = %err, "ignoring malformed log message");
                continue;
            }
        };

        match offer(&sender, ServerEvent::AgentLog(log)) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                warn!(room_id = %room_id, "viewer queue full, log dropped");
            }
            Err(TrySendError::Closed(())) => break,
        }
    }

    drop(logs);
    broker.release(&log_channel(&room_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomforge_core::collaborators::LogPublisher;
    use roomforge_core::log::{AgentType, LogLevel};
    use roomforge_test_support::FixedClock;
    use serde_json::json;

    fn hub() -> (NotificationHub, Arc<LogBroker>) {
        let broker = Arc::new(LogBroker::new());
        let hub = NotificationHub::new(
            Arc::clone(&broker),
            Arc::new(FixedClock::at_reference_time()),
        );
        (hub, broker)
    }

    fn authenticate(room_id: &str) -> ClientEvent {
        ClientEvent::Authenticate {
            room_id: Some(room_id.into()),
            token: None,
        }
    }

    #[tokio::test]
    async fn test_authenticate_joins_room_and_replies() {
        // Arrange
        let (hub, _broker) = hub();
        let (conn, mut events) = hub.connect();

        // Act
        hub.handle(conn, authenticate("room-a"));

        // Assert
        assert_eq!(
            events.recv().await.unwrap(),
            ServerEvent::Authenticated {
                room_id: RoomId::from("room-a")
            }
        );
        assert_eq!(hub.connected_clients_count(&RoomId::from("room-a")), 1);
        assert!(hub.is_member(conn, &RoomId::from("room-a")));
    }

    #[tokio::test]
    async fn test_authenticate_without_room_id_is_rejected() {
        // Arrange
        let (hub, _broker) = hub();
        let (conn, mut events) = hub.connect();

        // Act
        hub.handle(
            conn,
            ClientEvent::Authenticate {
                room_id: None,
                token: Some("secret".into()),
            },
        );
        hub.handle(conn, authenticate(""));

        // Assert
        for _ in 0..2 {
            assert_eq!(
                events.recv().await.unwrap(),
                ServerEvent::Error {
                    message: "Room ID required".into()
                }
            );
        }
        assert_eq!(hub.connected_clients_count(&RoomId::from("")), 0);
    }

    #[tokio::test]
    async fn test_notification_reaches_only_the_addressed_room() {
        // Arrange
        let (hub, _broker) = hub();
        let (conn_a, mut events_a) = hub.connect();
        let (conn_b, mut events_b) = hub.connect();
        assert!(hub.join(conn_a, &RoomId::from("A")));
        assert!(hub.join(conn_b, &RoomId::from("B")));

        // Act
        let delivered = hub.send_notification(&RoomId::from("A"), "room_ready", json!({ "n": 1 }));

        // Assert
        assert_eq!(delivered, 1);
        match events_a.recv().await.unwrap() {
            ServerEvent::Notification(payload) => {
                assert_eq!(payload.kind, "room_ready");
                assert_eq!(payload.room_id, RoomId::from("A"));
                assert_eq!(payload.data, json!({ "n": 1 }));
                assert_eq!(payload.timestamp, "2026-01-15T10:00:00.000Z");
            }
            other => panic!("expected notification, got {other:?}"),
        }
        assert!(events_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notification_to_empty_room_delivers_nothing() {
        let (hub, _broker) = hub();

        let delivered = hub.send_notification(&RoomId::from("nobody"), "room_ready", json!({}));

        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_count_returns_to_zero_after_disconnects() {
        // Arrange
        let (hub, _broker) = hub();
        let room = RoomId::from("A");
        let (first, _first_events) = hub.connect();
        let (second, _second_events) = hub.connect();
        hub.join(first, &room);
        hub.join(second, &room);
        assert_eq!(hub.connected_clients_count(&room), 2);

        // Act
        hub.disconnect(first);
        let after_one = hub.connected_clients_count(&room);
        hub.disconnect(second);

        // Assert
        assert_eq!(after_one, 1);
        assert_eq!(hub.connected_clients_count(&room), 0);
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let (hub, _broker) = hub();
        let (conn, _events) = hub.connect();

        assert!(hub.join(conn, &RoomId::from("A")));
        assert!(!hub.join(conn, &RoomId::from("A")));

        assert_eq!(hub.connected_clients_count(&RoomId::from("A")), 1);
    }

    #[tokio::test]
    async fn test_leave_stops_notifications() {
        // Arrange
        let (hub, _broker) = hub();
        let (conn, mut events) = hub.connect();
        hub.join(conn, &RoomId::from("A"));

        // Act
        hub.handle(
            conn,
            ClientEvent::Leave {
                room_id: "A".into(),
            },
        );
        let delivered = hub.send_notification(&RoomId::from("A"), "room_ready", json!({}));

        // Assert
        assert_eq!(
            events.recv().await.unwrap(),
            ServerEvent::Left {
                room_id: RoomId::from("A")
            }
        );
        assert_eq!(delivered, 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_joined_viewer_receives_room_logs() {
        // Arrange
        let (hub, broker) = hub();
        let (conn, mut events) = hub.connect();
        hub.join(conn, &RoomId::from("A"));
        let log = AgentLog {
            timestamp: "2026-01-15T10:00:00.000Z".into(),
            agent_type: AgentType::Story,
            level: LogLevel::Info,
            message: "Story agent started".into(),
            metadata: None,
        };

        // Act
        let delivered = broker
            .publish(&log_channel(&RoomId::from("A")), serde_json::to_string(&log).unwrap())
            .await
            .unwrap();

        // Assert
        assert_eq!(delivered, 1);
        assert_eq!(events.recv().await.unwrap(), ServerEvent::AgentLog(log));
    }

    #[tokio::test]
    async fn test_unknown_connection_cannot_join() {
        let (hub, _broker) = hub();
        let (conn, _events) = hub.connect();
        hub.disconnect(conn);

        assert!(!hub.join(conn, &RoomId::from("A")));
        assert_eq!(hub.connected_clients_count(&RoomId::from("A")), 0);
    }

    async fn wait_for_idle_channels(broker: &LogBroker) {
        for _ in 0..100 {
            if broker.channel_count() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }

    fn drain(events: &mut mpsc::Receiver<ServerEvent>) -> usize {
        let mut count = 0;
        while events.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_log_channels_released_after_join_disconnect_cycles() {
        // Arrange
        let (hub, broker) = hub();

        // Act
        for i in 0..100 {
            let (conn, _events) = hub.connect();
            hub.join(conn, &RoomId::from(format!("room-{i}")));
            hub.disconnect(conn);
        }
        wait_for_idle_channels(&broker).await;

        // Assert
        assert_eq!(broker.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_log_channel_released_after_leave() {
        // Arrange
        let (hub, broker) = hub();
        let (conn, _events) = hub.connect();
        hub.join(conn, &RoomId::from("A"));
        assert_eq!(broker.channel_count(), 1);

        // Act
        hub.leave(conn, &RoomId::from("A"));
        wait_for_idle_channels(&broker).await;

        // Assert
        assert_eq!(broker.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_shared_log_channel_survives_one_viewer_leaving() {
        // Arrange
        let (hub, broker) = hub();
        let (first, _first_events) = hub.connect();
        let (second, mut second_events) = hub.connect();
        hub.join(first, &RoomId::from("A"));
        hub.join(second, &RoomId::from("A"));

        // Act
        hub.disconnect(first);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let delivered = broker
            .publish(
                &log_channel(&RoomId::from("A")),
                serde_json::to_string(&AgentLog {
                    timestamp: "2026-01-15T10:00:00.000Z".into(),
                    agent_type: AgentType::Orchestrator,
                    level: LogLevel::Info,
                    message: "still here".into(),
                    metadata: None,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        // Assert
        assert_eq!(delivered, 1);
        assert!(matches!(
            second_events.recv().await,
            Some(ServerEvent::AgentLog(_))
        ));
    }

    #[tokio::test]
    async fn test_stalled_viewer_queue_never_exceeds_capacity_for_notifications() {
        // Arrange
        let broker = Arc::new(LogBroker::new());
        let hub = NotificationHub::with_queue_capacity(
            broker,
            Arc::new(FixedClock::at_reference_time()),
            4,
        );
        let (conn, mut events) = hub.connect();
        hub.join(conn, &RoomId::from("A"));

        // Act
        let delivered: usize = (0..10)
            .map(|n| hub.send_notification(&RoomId::from("A"), "tick", json!({ "n": n })))
            .sum();

        // Assert
        assert_eq!(delivered, 4);
        assert_eq!(drain(&mut events), 4);
    }

    #[tokio::test]
    async fn test_stalled_viewer_queue_never_exceeds_capacity_for_logs() {
        // Arrange
        let broker = Arc::new(LogBroker::new());
        let hub = NotificationHub::with_queue_capacity(
            Arc::clone(&broker),
            Arc::new(FixedClock::at_reference_time()),
            4,
        );
        let (conn, mut events) = hub.connect();
        hub.join(conn, &RoomId::from("A"));
        let channel = log_channel(&RoomId::from("A"));

        // Act
        for n in 0..50 {
            let log = AgentLog {
                timestamp: "2026-01-15T10:00:00.000Z".into(),
                agent_type: AgentType::Code,
                level: LogLevel::Info,
                message: format!("line {n}"),
                metadata: None,
            };
            broker
                .publish(&channel, serde_json::to_string(&log).unwrap())
                .await
                .unwrap();
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Assert
        let queued = drain(&mut events);
        assert!(queued <= 4, "queued {queued} events");
        assert!(queued > 0);
    }
}
