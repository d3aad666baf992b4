use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use genflow_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing control frames to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

pub struct WsConnection {
    pub owner_id: DbId,
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Registry of open WebSocket connections.
///
/// Job events do not pass through here; each connection reads its own
/// owner subscription. The manager carries control traffic (heartbeat
/// pings, shutdown closes) and connection bookkeeping.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and return the receiver its writer task drains.
    pub async fn add(&self, conn_id: String, owner_id: DbId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            owner_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Drop a connection and return how long it was open.
    pub async fn remove(&self, conn_id: &str) -> Option<chrono::Duration> {
        let conn = self.connections.write().await.remove(conn_id)?;
        Some(chrono::Utc::now() - conn.connected_at)
    }

    /// Number of open connections held by `owner_id`.
    pub async fn owner_connection_count(&self, owner_id: DbId) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| conn.owner_id == owner_id)
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connection.
    ///
    /// Closed channels are skipped; their reader loop removes them.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
