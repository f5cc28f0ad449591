use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use ripple_types::PushEvent;

/// Commands delivered to a per-connection task.
pub enum ClientCommand {
    Event(PushEvent),
    Close,
}

/// Tracks all open client connections and fans events out to them.
/// Broadcast iterates a snapshot of the current senders; a dead client's
/// send error is ignored locally and never affects the others.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<RwLock<HashMap<Uuid, mpsc::UnboundedSender<ClientCommand>>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<ClientCommand>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    pub async fn unregister(&self, conn_id: Uuid) {
        self.inner.write().await.remove(&conn_id);
    }

    pub async fn broadcast(&self, event: PushEvent) {
        let senders: Vec<_> = self.inner.read().await.values().cloned().collect();
        for tx in senders {
            let _ = tx.send(ClientCommand::Event(event.clone()));
        }
    }

    /// Forcibly close every open connection (operational/test hook).
    pub async fn drop_all(&self) {
        let mut clients = self.inner.write().await;
        for (_, tx) in clients.drain() {
            let _ = tx.send(ClientCommand::Close);
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_registered_client() {
        let registry = ClientRegistry::new();
        let (_a, mut rx_a) = registry.register().await;
        let (_b, mut rx_b) = registry.register().await;
        assert_eq!(registry.len().await, 2);

        registry.broadcast(PushEvent::Pong).await;

        assert!(matches!(rx_a.recv().await, Some(ClientCommand::Event(PushEvent::Pong))));
        assert!(matches!(rx_b.recv().await, Some(ClientCommand::Event(PushEvent::Pong))));
    }

    #[tokio::test]
    async fn dead_client_does_not_break_broadcast() {
        let registry = ClientRegistry::new();
        let (_dead, rx_dead) = registry.register().await;
        drop(rx_dead);
        let (_live, mut rx_live) = registry.register().await;

        registry.broadcast(PushEvent::Pong).await;
        assert!(matches!(rx_live.recv().await, Some(ClientCommand::Event(PushEvent::Pong))));
    }

    #[tokio::test]
    async fn drop_all_sends_close_and_clears() {
        let registry = ClientRegistry::new();
        let (_a, mut rx_a) = registry.register().await;

        registry.drop_all().await;
        assert!(matches!(rx_a.recv().await, Some(ClientCommand::Close)));
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn unregister_removes_client() {
        let registry = ClientRegistry::new();
        let (id, _rx) = registry.register().await;
        registry.unregister(id).await;
        assert_eq!(registry.len().await, 0);
    }
}
