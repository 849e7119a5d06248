//! The connection registry — fan-out and lifecycle for live connections.
//!
//! The registry is plain shared state handed to whoever needs it; nothing
//! here is global. Registering a connection starts its heartbeat watcher,
//! unregistering stops it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use lifeline_core::OutboundEvent;

use crate::metrics::{WS_BROADCAST_DROPS_TOTAL, WS_DISCONNECTIONS_TOTAL};

use super::connection::ClientConnection;
use super::heartbeat::{run_heartbeat, HeartbeatResult};

/// Tracks live connections and fans events out to them.
pub struct ConnectionRegistry {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    /// Seconds between liveness checks.
    heartbeat_interval: Duration,
    /// Seconds without a pong before a connection is dropped.
    heartbeat_timeout: Duration,
}

impl ConnectionRegistry {
    /// Create a registry with the given heartbeat window.
    pub fn new(heartbeat_interval: Duration, heartbeat_timeout: Duration) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            heartbeat_interval,
            heartbeat_timeout,
        }
    }

    /// Register a connection and start its heartbeat watcher.
    ///
    /// When the watcher observes a timeout it closes the connection, which
    /// ends the session loop; the session then unregisters itself.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        {
            let mut conns = self.connections.write().await;
            let _ = conns.insert(connection.id.clone(), connection.clone());
        }

        let interval = self.heartbeat_interval;
        let timeout = self.heartbeat_timeout;
        let cancel = connection.cancel_token();
        drop(tokio::spawn(async move {
            let result = run_heartbeat(connection.clone(), interval, timeout, cancel).await;
            if result == HeartbeatResult::TimedOut {
                warn!(conn_id = %connection.id, "heartbeat timed out, closing connection");
                counter!(WS_DISCONNECTIONS_TOTAL, "reason" => "heartbeat_timeout").increment(1);
                connection.close();
            }
        }));
    }

    /// Unregister a connection and stop its heartbeat watcher.
    pub async fn remove(&self, connection_id: &str) {
        let removed = {
            let mut conns = self.connections.write().await;
            conns.remove(connection_id)
        };
        if let Some(conn) = removed {
            conn.close();
            debug!(conn_id = %connection_id, "connection unregistered");
        }
    }

    /// Send an event to every live connection.
    pub async fn broadcast_all(&self, event: &OutboundEvent) {
        self.fan_out(event, None).await;
    }

    /// Send an event to every live connection except the named one.
    pub async fn broadcast_except(&self, event: &OutboundEvent, excluded_id: &str) {
        self.fan_out(event, Some(excluded_id)).await;
    }

    async fn fan_out(&self, event: &OutboundEvent, excluded_id: Option<&str>) {
        // Serialize once, share the frame across recipients.
        let frame = Arc::new(event.to_json());
        let conns = self.connections.read().await;
        let mut recipients = 0usize;
        for conn in conns.values() {
            if excluded_id == Some(conn.id.as_str()) {
                continue;
            }
            recipients += 1;
            if !conn.send(frame.clone()) {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(conn_id = %conn.id, "dropped frame for slow or closed client");
            }
        }
        debug!(recipients, excluded = excluded_id.is_some(), "event fanned out");
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Close every connection (used during shutdown).
    pub async fn close_all(&self) {
        let conns = self.connections.read().await;
        info!(count = conns.len(), "closing all connections");
        for conn in conns.values() {
            conn.close();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lifeline_core::ClientRole;
    use tokio::sync::mpsc;

    use crate::ws::connection::ClientIdentity;

    fn make_registry() -> ConnectionRegistry {
        ConnectionRegistry::new(Duration::from_secs(30), Duration::from_secs(90))
    }

    fn make_connection(
        id: &str,
        user_id: i64,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(
            id.into(),
            ClientIdentity {
                user_id,
                role: ClientRole::User,
            },
            tx,
        );
        (Arc::new(conn), rx)
    }

    #[tokio::test]
    async fn add_and_remove_connection() {
        let registry = make_registry();
        let (conn, _rx) = make_connection("c1", 1);
        registry.add(conn).await;
        assert_eq!(registry.connection_count().await, 1);
        registry.remove("c1").await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn remove_nonexistent_is_harmless() {
        let registry = make_registry();
        registry.remove("no_such").await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn remove_closes_the_connection() {
        let registry = make_registry();
        let (conn, _rx) = make_connection("c1", 1);
        registry.add(conn.clone()).await;
        registry.remove("c1").await;
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn broadcast_all_reaches_everyone() {
        let registry = make_registry();
        let (c1, mut rx1) = make_connection("c1", 1);
        let (c2, mut rx2) = make_connection("c2", 2);
        registry.add(c1).await;
        registry.add(c2).await;

        registry
            .broadcast_all(&OutboundEvent::error("note"))
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_except_skips_the_sender() {
        let registry = make_registry();
        let (c1, mut rx1) = make_connection("c1", 1);
        let (c2, mut rx2) = make_connection("c2", 2);
        let (c3, mut rx3) = make_connection("c3", 3);
        registry.add(c1).await;
        registry.add(c2).await;
        registry.add(c3).await;

        let event = OutboundEvent::location_update(1, 0.5, 1.5, None, ClientRole::User);
        registry.broadcast_except(&event, "c1").await;

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_frames_are_valid_json() {
        let registry = make_registry();
        let (c1, mut rx1) = make_connection("c1", 1);
        registry.add(c1).await;

        let event = OutboundEvent::location_update(7, -1.29, 36.82, Some(10.0), ClientRole::User);
        registry.broadcast_all(&event).await;

        let frame = rx1.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["type"], "location_update");
        assert_eq!(parsed["data"]["id"], 7);
    }

    #[tokio::test]
    async fn broadcast_to_empty_registry_does_not_panic() {
        let registry = make_registry();
        registry.broadcast_all(&OutboundEvent::error("nobody home")).await;
    }

    #[tokio::test]
    async fn full_queue_does_not_block_other_recipients() {
        let registry = make_registry();
        let (tx, _full_rx) = mpsc::channel(1);
        let slow = Arc::new(ClientConnection::new(
            "slow".into(),
            ClientIdentity {
                user_id: 1,
                role: ClientRole::User,
            },
            tx,
        ));
        // Fill the slow client's queue
        assert!(slow.send(Arc::new("filler".into())));
        let (fast, mut fast_rx) = make_connection("fast", 2);

        registry.add(slow.clone()).await;
        registry.add(fast).await;

        registry.broadcast_all(&OutboundEvent::error("frame")).await;

        assert!(fast_rx.try_recv().is_ok());
        assert_eq!(slow.drop_count(), 1);
    }

    #[tokio::test]
    async fn heartbeat_timeout_closes_connection() {
        let registry =
            ConnectionRegistry::new(Duration::from_millis(10), Duration::from_millis(10));
        let (conn, _rx) = make_connection("c1", 1);
        conn.is_alive
            .store(false, std::sync::atomic::Ordering::Relaxed);
        registry.add(conn.clone()).await;

        // The watcher should observe the miss and close the connection.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn close_all_cancels_every_connection() {
        let registry = make_registry();
        let (c1, _rx1) = make_connection("c1", 1);
        let (c2, _rx2) = make_connection("c2", 2);
        registry.add(c1.clone()).await;
        registry.add(c2.clone()).await;

        registry.close_all().await;
        assert!(c1.is_closed());
        assert!(c2.is_closed());
    }

    #[tokio::test]
    async fn add_connection_overwrites_same_id() {
        let registry = make_registry();
        let (c1, _rx1) = make_connection("same", 1);
        let (c2, _rx2) = make_connection("same", 2);
        registry.add(c1).await;
        registry.add(c2).await;
        assert_eq!(registry.connection_count().await, 1);
    }
}
