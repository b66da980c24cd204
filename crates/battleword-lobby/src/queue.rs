//! First-come, first-served matchmaking.

use std::collections::VecDeque;
use std::sync::Arc;

use battleword_game::GameFactory;
use battleword_protocol::{Codec, GameId, JsonCodec, PlayerId, ServerMessage};
use battleword_transport::{ChannelHandle, ConnectionId};
use tokio::sync::Mutex;

use crate::LobbyError;

struct QueueEntry {
    player_id: PlayerId,
    channel: ChannelHandle,
}

/// Two queued players that now share a game.
pub struct Match {
    pub game_id: GameId,
    /// In queue order; the first player moves first.
    pub players: [PlayerId; 2],
    pub channels: [ChannelHandle; 2],
}

impl Match {
    /// Sends `match_found` to both players and closes their queue
    /// channels. Delivery failures are logged and otherwise ignored.
    pub fn announce(&self, codec: &JsonCodec) -> Result<(), LobbyError> {
        let payload = codec.encode(&ServerMessage::MatchFound {
            game_id: self.game_id.clone(),
        })?;
        for (player_id, channel) in self.players.iter().zip(&self.channels) {
            if let Err(e) = channel.send(&payload) {
                tracing::debug!(%player_id, error = %e, "match_found not delivered");
            }
            channel.close();
        }
        Ok(())
    }
}

/// Ordered queue of players waiting for an anonymous opponent.
pub struct MatchmakingQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    games: Arc<dyn GameFactory>,
}

impl MatchmakingQueue {
    pub fn new(games: Arc<dyn GameFactory>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            games,
        }
    }

    /// Appends `player_id` to the queue.
    ///
    /// Returns `false` (and keeps the existing entry) if the player is
    /// already waiting.
    pub async fn join(&self, player_id: PlayerId, channel: ChannelHandle) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|e| e.player_id == player_id) {
            tracing::debug!(%player_id, "already queued");
            return false;
        }
        tracing::info!(%player_id, waiting = entries.len() + 1, "player queued");
        entries.push_back(QueueEntry { player_id, channel });
        true
    }

    /// Removes `player_id` from the queue. Returns whether it was there.
    pub async fn leave(&self, player_id: &PlayerId) -> bool {
        self.remove_where(player_id, |_| true).await
    }

    /// Removes `player_id` only if it was queued through `conn_id`.
    ///
    /// An entry made later by another connection of the same player is
    /// left alone.
    pub async fn leave_if(&self, player_id: &PlayerId, conn_id: ConnectionId) -> bool {
        self.remove_where(player_id, |e| e.channel.id() == conn_id).await
    }

    /// Pairs the two longest-waiting players into a new game.
    ///
    /// Returns `None` with fewer than two waiting. If the game cannot be
    /// created both players go back to the front, in their original order.
    pub async fn try_match(&self) -> Option<Match> {
        let mut entries = self.entries.lock().await;
        if entries.len() < 2 {
            return None;
        }
        let (Some(first), Some(second)) = (entries.pop_front(), entries.pop_front())
        else {
            return None;
        };

        match self.games.start_game(&first.player_id, &second.player_id).await {
            Ok(game_id) => {
                tracing::info!(
                    %game_id,
                    first = %first.player_id,
                    second = %second.player_id,
                    "match found"
                );
                Some(Match {
                    game_id,
                    players: [first.player_id, second.player_id],
                    channels: [first.channel, second.channel],
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to create matched game, requeueing");
                entries.push_front(second);
                entries.push_front(first);
                None
            }
        }
    }

    /// Number of waiting players.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn contains(&self, player_id: &PlayerId) -> bool {
        self.entries.lock().await.iter().any(|e| e.player_id == *player_id)
    }

    async fn remove_where(
        &self,
        player_id: &PlayerId,
        matches: impl Fn(&QueueEntry) -> bool,
    ) -> bool {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.player_id != *player_id || !matches(e));
        let removed = entries.len() != before;
        if removed {
            tracing::info!(%player_id, "player left queue");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use battleword_game::GameError;
    use battleword_transport::{Outgoing, QueuedChannel};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    #[derive(Default)]
    struct StubFactory {
        fail: AtomicBool,
        created: std::sync::Mutex<Vec<(PlayerId, PlayerId)>>,
    }

    #[async_trait]
    impl GameFactory for StubFactory {
        async fn start_game(
            &self,
            first: &PlayerId,
            second: &PlayerId,
        ) -> Result<GameId, GameError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(GameError::NotFound(GameId::from("unavailable")));
            }
            let mut created = self.created.lock().unwrap();
            created.push((first.clone(), second.clone()));
            Ok(GameId::from(format!("game-{}", created.len())))
        }
    }

    fn queue() -> (MatchmakingQueue, Arc<StubFactory>) {
        let factory = Arc::new(StubFactory::default());
        (MatchmakingQueue::new(factory.clone()), factory)
    }

    fn channel() -> (ChannelHandle, UnboundedReceiver<Outgoing>) {
        let (chan, rx) = QueuedChannel::new();
        (chan.into_handle(), rx)
    }

    async fn enqueue(q: &MatchmakingQueue, ids: &[&str]) -> Vec<UnboundedReceiver<Outgoing>> {
        let mut receivers = Vec::new();
        for id in ids {
            let (chan, rx) = channel();
            assert!(q.join(PlayerId::from(*id), chan).await);
            receivers.push(rx);
        }
        receivers
    }

    #[tokio::test]
    async fn test_join_twice_is_noop() {
        let (q, _) = queue();
        let (a, _rx_a) = channel();
        let (again, _rx_again) = channel();
        assert!(q.join("alice".into(), a).await);
        assert!(!q.join("alice".into(), again).await);
        assert_eq!(q.len().await, 1);
    }

    #[tokio::test]
    async fn test_leave_if_keeps_entry_from_newer_connection() {
        let (q, _) = queue();
        let (old, _rx_old) = channel();
        let (new, _rx_new) = channel();
        assert!(q.join("alice".into(), old.clone()).await);
        assert!(q.leave(&"alice".into()).await);
        assert!(q.join("alice".into(), new.clone()).await);

        // Late cleanup for the first connection.
        assert!(!q.leave_if(&"alice".into(), old.id()).await);
        assert!(q.contains(&"alice".into()).await);

        assert!(q.leave_if(&"alice".into(), new.id()).await);
        assert!(q.is_empty().await);
    }

    #[tokio::test]
    async fn test_leave_removes_waiting_player() {
        let (q, _) = queue();
        let _rx = enqueue(&q, &["alice", "bob"]).await;

        assert!(q.leave(&"alice".into()).await);
        assert!(!q.leave(&"alice".into()).await);
        assert!(!q.contains(&"alice".into()).await);
        assert!(q.contains(&"bob".into()).await);
    }

    #[tokio::test]
    async fn test_try_match_single_player_returns_none() {
        let (q, factory) = queue();
        let _rx = enqueue(&q, &["alice"]).await;
        assert!(q.try_match().await.is_none());
        assert!(factory.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_try_match_pairs_in_arrival_order() {
        let (q, factory) = queue();
        let _rx = enqueue(&q, &["a", "b", "c", "d"]).await;

        let first = q.try_match().await.expect("first pair");
        let second = q.try_match().await.expect("second pair");

        assert_eq!(first.players, [PlayerId::from("a"), PlayerId::from("b")]);
        assert_eq!(second.players, [PlayerId::from("c"), PlayerId::from("d")]);
        assert!(q.is_empty().await);
        assert_eq!(factory.created.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_try_match_after_leave_skips_departed() {
        let (q, _) = queue();
        let _rx = enqueue(&q, &["a", "b", "c"]).await;
        q.leave(&"a".into()).await;

        let m = q.try_match().await.expect("pair");
        assert_eq!(m.players, [PlayerId::from("b"), PlayerId::from("c")]);
    }

    #[tokio::test]
    async fn test_try_match_failure_requeues_in_order() {
        let (q, factory) = queue();
        let _rx = enqueue(&q, &["a", "b", "c"]).await;
        factory.fail.store(true, Ordering::SeqCst);

        assert!(q.try_match().await.is_none());
        assert_eq!(q.len().await, 3);

        factory.fail.store(false, Ordering::SeqCst);
        let m = q.try_match().await.expect("pair after recovery");
        assert_eq!(m.players, [PlayerId::from("a"), PlayerId::from("b")]);
        assert!(q.contains(&"c".into()).await);
    }

    #[tokio::test]
    async fn test_announce_sends_match_found_then_closes() {
        let (q, _) = queue();
        let mut rx = enqueue(&q, &["a", "b"]).await;
        let m = q.try_match().await.expect("pair");

        m.announce(&JsonCodec).unwrap();

        for rx in &mut rx {
            let Outgoing::Frame(bytes) = rx.try_recv().unwrap() else {
                panic!("expected a frame first");
            };
            let msg: ServerMessage = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(msg, ServerMessage::MatchFound { game_id: m.game_id.clone() });
            assert_eq!(rx.try_recv().unwrap(), Outgoing::Close);
        }
    }
}
