use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

/// Fans gateway events out to all connected clients and tracks presence.
///
/// Room scoping happens at the connection, not here: every connection
/// receives every event and forwards only those whose `group_id()` is in its
/// joined-room set. Join/leave are idempotent set operations with no ordering
/// guarantee relative to concurrent broadcasts.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Online users: user_id -> (conn_id, name)
    online_users: RwLock<HashMap<Uuid, (Uuid, String)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                online_users: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a user as online. Returns the connection id owning the
    /// presence entry; a reconnect takes over from the previous connection.
    pub async fn user_online(&self, user_id: Uuid, name: String) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner
            .online_users
            .write()
            .await
            .insert(user_id, (conn_id, name.clone()));

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            name,
            online: true,
        });
        conn_id
    }

    /// Register a user as offline. Only cleans up if conn_id still owns the
    /// presence entry — a newer connection may have taken over.
    pub async fn user_offline(&self, user_id: Uuid, conn_id: Uuid) {
        let name = {
            let mut users = self.inner.online_users.write().await;
            match users.get(&user_id) {
                Some((owner, _)) if *owner == conn_id => users.remove(&user_id).map(|(_, n)| n),
                _ => None,
            }
        };

        if let Some(name) = name {
            self.broadcast(GatewayEvent::PresenceUpdate {
                user_id,
                name,
                online: false,
            });
        }
    }

    /// Get the list of online users.
    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        self.inner
            .online_users
            .read()
            .await
            .iter()
            .map(|(id, (_, name))| (*id, name.clone()))
            .collect()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn presence_survives_stale_disconnects() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();

        let first = dispatcher.user_online(user, "ada".into()).await;
        let second = dispatcher.user_online(user, "ada".into()).await;

        // The stale connection's cleanup must not evict the newer one.
        dispatcher.user_offline(user, first).await;
        assert_eq!(dispatcher.online_users().await.len(), 1);

        dispatcher.user_offline(user, second).await;
        assert!(dispatcher.online_users().await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        let user = Uuid::new_v4();
        dispatcher.broadcast(GatewayEvent::PresenceUpdate {
            user_id: user,
            name: "ada".into(),
            online: true,
        });

        match rx.recv().await {
            Ok(GatewayEvent::PresenceUpdate { user_id, .. }) => assert_eq!(user_id, user),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
