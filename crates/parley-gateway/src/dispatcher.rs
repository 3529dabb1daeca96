use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

/// Tracks connected users and broadcasts global events (presence) to every
/// gateway connection. Conversation snapshots do not go through here; each
/// connection subscribes to its open conversation directly.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events. All connected clients receive all events.
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Online users: user_id -> their open connections. A user stays online
    /// until the last one closes.
    online_users: RwLock<HashMap<Uuid, OnlineUser>>,
}

struct OnlineUser {
    email: String,
    connections: HashSet<Uuid>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
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

    /// Register a connection for `user_id`. The user is announced as active
    /// on their first connection only. Returns the connection id to hand back
    /// to `user_offline`.
    pub async fn user_online(&self, user_id: Uuid, email: String) -> Uuid {
        let conn_id = Uuid::new_v4();
        let first = {
            let mut online = self.inner.online_users.write().await;
            let entry = online.entry(user_id).or_insert_with(|| OnlineUser {
                email: email.clone(),
                connections: HashSet::new(),
            });
            entry.connections.insert(conn_id);
            entry.connections.len() == 1
        };

        if first {
            self.broadcast(GatewayEvent::PresenceUpdate {
                user_id,
                email,
                active: true,
            });
        }
        conn_id
    }

    /// Forget one connection. Returns true when it was the user's last, in
    /// which case they are announced as inactive.
    pub async fn user_offline(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let email = {
            let mut online = self.inner.online_users.write().await;
            let Some(entry) = online.get_mut(&user_id) else {
                return false;
            };
            if !entry.connections.remove(&conn_id) || !entry.connections.is_empty() {
                return false;
            }
            online.remove(&user_id).map(|user| user.email)
        };

        let Some(email) = email else {
            return false;
        };

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            email,
            active: false,
        });
        true
    }

    /// Open connections for `user_id`.
    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner
            .online_users
            .read()
            .await
            .get(&user_id)
            .map_or(0, |user| user.connections.len())
    }

    /// Get list of online users.
    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        self.inner
            .online_users
            .read()
            .await
            .iter()
            .map(|(id, user)| (*id, user.email.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn online_then_offline_broadcasts_presence() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();
        let user = Uuid::new_v4();

        let conn = dispatcher.user_online(user, "a@x.com".into()).await;
        assert!(matches!(rx.recv().await.unwrap(), GatewayEvent::PresenceUpdate { active: true, .. }));
        assert_eq!(dispatcher.online_users().await.len(), 1);

        assert!(dispatcher.user_offline(user, conn).await);
        assert!(matches!(rx.recv().await.unwrap(), GatewayEvent::PresenceUpdate { active: false, .. }));
        assert!(dispatcher.online_users().await.is_empty());
    }

    #[tokio::test]
    async fn user_stays_online_until_last_connection_closes() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();
        let user = Uuid::new_v4();

        let old = dispatcher.user_online(user, "a@x.com".into()).await;
        let new = dispatcher.user_online(user, "a@x.com".into()).await;
        assert_eq!(dispatcher.connection_count(user).await, 2);

        // Newest closes first; the older socket is still open.
        assert!(!dispatcher.user_offline(user, new).await);
        assert_eq!(dispatcher.online_users().await.len(), 1);
        assert!(dispatcher.user_offline(user, old).await);
        assert_eq!(dispatcher.connection_count(user).await, 0);

        // Only one announcement each way.
        assert!(matches!(rx.recv().await.unwrap(), GatewayEvent::PresenceUpdate { active: true, .. }));
        assert!(matches!(rx.recv().await.unwrap(), GatewayEvent::PresenceUpdate { active: false, .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_connection_is_ignored() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let conn = dispatcher.user_online(user, "a@x.com".into()).await;

        assert!(!dispatcher.user_offline(user, Uuid::new_v4()).await);
        assert!(!dispatcher.user_offline(Uuid::new_v4(), conn).await);
        assert_eq!(dispatcher.connection_count(user).await, 1);
    }
}
