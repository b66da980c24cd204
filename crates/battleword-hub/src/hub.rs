//! The registry itself.
//!
//! # Concurrency note
//!
//! The map sits behind a `tokio::sync::RwLock`. `broadcast` and `list`
//! take the read lock only long enough to clone the channel handles for
//! one key; the sends happen after the lock is released, so a slow peer
//! never blocks `add`/`remove` for anyone else.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use battleword_transport::{ChannelHandle, ConnectionId};
use tokio::sync::RwLock;

type Members<K> = HashMap<K, HashMap<ConnectionId, ChannelHandle>>;

/// Concurrent key → channel-set membership table.
///
/// Cheap to clone; clones share the same table.
pub struct Hub<K> {
    members: Arc<RwLock<Members<K>>>,
}

impl<K> Clone for Hub<K> {
    fn clone(&self) -> Self {
        Self {
            members: Arc::clone(&self.members),
        }
    }
}

impl<K> Default for Hub<K> {
    fn default() -> Self {
        Self {
            members: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K> Hub<K>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `channel` under `key`. Adding the same connection twice
    /// replaces the earlier handle.
    pub async fn add(&self, key: K, channel: ChannelHandle) {
        let conn_id = channel.id();
        let mut members = self.members.write().await;
        members.entry(key.clone()).or_default().insert(conn_id, channel);
        tracing::debug!(%key, %conn_id, "channel registered");
    }

    /// Unregisters one connection from `key`.
    ///
    /// Returns how many channels remain under `key`; keys with no
    /// channels left are deleted.
    pub async fn remove(&self, key: &K, conn_id: ConnectionId) -> usize {
        let mut members = self.members.write().await;
        let Some(set) = members.get_mut(key) else {
            return 0;
        };
        if set.remove(&conn_id).is_some() {
            tracing::debug!(%key, %conn_id, "channel unregistered");
        }
        let remaining = set.len();
        if remaining == 0 {
            members.remove(key);
        }
        remaining
    }

    /// Sends `payload` to every channel under `key`.
    ///
    /// Returns the number of channels that accepted the payload. Channels
    /// whose send fails are removed; they are never retried.
    pub async fn broadcast(&self, key: &K, payload: &[u8]) -> usize {
        let targets = self.list(key).await;
        if targets.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut dead = Vec::new();
        for channel in &targets {
            match channel.send(payload) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        %key,
                        conn_id = %channel.id(),
                        error = %e,
                        "delivery failed, dropping channel"
                    );
                    dead.push(channel.id());
                }
            }
        }

        if !dead.is_empty() {
            let mut members = self.members.write().await;
            if let Some(set) = members.get_mut(key) {
                for conn_id in &dead {
                    set.remove(conn_id);
                }
                if set.is_empty() {
                    members.remove(key);
                }
            }
        }

        delivered
    }

    /// Returns a snapshot of the channels currently under `key`.
    pub async fn list(&self, key: &K) -> Vec<ChannelHandle> {
        self.members
            .read()
            .await
            .get(key)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    /// `true` if at least one channel is registered under `key`.
    pub async fn is_connected(&self, key: &K) -> bool {
        self.members.read().await.contains_key(key)
    }

    /// Number of keys with at least one channel.
    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    /// `true` if no key has a channel.
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battleword_transport::{Outgoing, QueuedChannel};

    fn channel() -> (ChannelHandle, tokio::sync::mpsc::UnboundedReceiver<Outgoing>) {
        let (chan, rx) = QueuedChannel::new();
        (chan.into_handle(), rx)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_channel_under_key() {
        let hub: Hub<String> = Hub::new();
        let (a, mut rx_a) = channel();
        let (b, mut rx_b) = channel();
        let (other, mut rx_other) = channel();
        hub.add("g1".into(), a).await;
        hub.add("g1".into(), b).await;
        hub.add("g2".into(), other).await;

        let delivered = hub.broadcast(&"g1".to_string(), b"state").await;

        assert_eq!(delivered, 2);
        assert_eq!(rx_a.try_recv().unwrap(), Outgoing::Frame(b"state".to_vec()));
        assert_eq!(rx_b.try_recv().unwrap(), Outgoing::Frame(b"state".to_vec()));
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_unknown_key_delivers_nothing() {
        let hub: Hub<String> = Hub::new();
        assert_eq!(hub.broadcast(&"nobody".to_string(), b"x").await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_failed_send_drops_channel() {
        let hub: Hub<String> = Hub::new();
        let (live, _rx_live) = channel();
        let (dead, rx_dead) = channel();
        let dead_id = dead.id();
        hub.add("g1".into(), live).await;
        hub.add("g1".into(), dead).await;
        drop(rx_dead);

        assert_eq!(hub.broadcast(&"g1".to_string(), b"x").await, 1);

        let remaining: Vec<_> =
            hub.list(&"g1".to_string()).await.iter().map(|c| c.id()).collect();
        assert_eq!(remaining.len(), 1);
        assert!(!remaining.contains(&dead_id));
    }

    #[tokio::test]
    async fn test_broadcast_all_dead_removes_key() {
        let hub: Hub<String> = Hub::new();
        let (dead, rx) = channel();
        hub.add("g1".into(), dead).await;
        drop(rx);

        hub.broadcast(&"g1".to_string(), b"x").await;

        assert!(!hub.is_connected(&"g1".to_string()).await);
        assert!(hub.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_last_channel_deletes_key() {
        let hub: Hub<String> = Hub::new();
        let (a, _rx_a) = channel();
        let (b, _rx_b) = channel();
        let (a_id, b_id) = (a.id(), b.id());
        hub.add("p1".into(), a).await;
        hub.add("p1".into(), b).await;

        assert_eq!(hub.remove(&"p1".to_string(), a_id).await, 1);
        assert!(hub.is_connected(&"p1".to_string()).await);
        assert_eq!(hub.remove(&"p1".to_string(), b_id).await, 0);
        assert!(!hub.is_connected(&"p1".to_string()).await);
    }

    #[tokio::test]
    async fn test_remove_unknown_connection_is_noop() {
        let hub: Hub<String> = Hub::new();
        let (a, _rx) = channel();
        hub.add("p1".into(), a).await;

        let remaining = hub
            .remove(&"p1".to_string(), ConnectionId::new(u64::MAX))
            .await;

        assert_eq!(remaining, 1);
        assert_eq!(hub.remove(&"ghost".to_string(), ConnectionId::new(1)).await, 0);
    }

    #[tokio::test]
    async fn test_add_same_connection_twice_keeps_one_entry() {
        let hub: Hub<String> = Hub::new();
        let (a, _rx) = channel();
        hub.add("g".into(), a.clone()).await;
        hub.add("g".into(), a).await;
        assert_eq!(hub.list(&"g".to_string()).await.len(), 1);
        assert_eq!(hub.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_all_registered() {
        let hub: Hub<String> = Hub::new();
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();
        for _ in 0..32 {
            let (chan, rx) = channel();
            receivers.push(rx);
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                hub.add("busy".into(), chan).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(hub.broadcast(&"busy".to_string(), b"x").await, 32);
    }
}
