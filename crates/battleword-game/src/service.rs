//! Live game sessions.
//!
//! [`GameService`] keeps an in-memory session for each game that is being
//! played or watched. Sessions are loaded from the repository on first use
//! and evicted once the game is finished and saved, or once its last
//! watcher leaves. Each game sits behind its own `tokio::sync::Mutex`, so
//! guesses on one game never wait on another. The arena map itself is a
//! `RwLock` that is only held to look up, insert or remove a session.
//!
//! A game whose latest state could not be saved is pinned in memory until
//! a later save succeeds.
//!
//! # Lock order
//!
//! A game lock may be held while taking the arena lock or the unsaved
//! set. The arena lock is never held while taking a game lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use battleword_hub::Hub;
use battleword_protocol::{
    Codec, GameId, GameStateView, JsonCodec, PlayerId, PlayerSummary,
    ServerMessage,
};
use battleword_transport::{ChannelHandle, ConnectionId};
use tokio::sync::{Mutex, RwLock};

use crate::{
    Game, GameError, GameRepository, GuessOutcome, PlayerDirectory, WordList,
    feedbacks,
};

/// Shown for players the directory does not know.
pub const UNKNOWN_PLAYER_NAME: &str = "Unknown";

type Session = Arc<Mutex<Game>>;

/// Starts a game between two players and returns its id.
///
/// This is all the lobby needs from the game layer; tests substitute
/// their own implementation.
#[async_trait]
pub trait GameFactory: Send + Sync + 'static {
    async fn start_game(
        &self,
        first: &PlayerId,
        second: &PlayerId,
    ) -> Result<GameId, GameError>;
}

/// The session arena plus its collaborators.
pub struct GameService {
    sessions: RwLock<HashMap<GameId, Session>>,
    unsaved: Mutex<HashSet<GameId>>,
    repository: Arc<dyn GameRepository>,
    directory: Arc<dyn PlayerDirectory>,
    hub: Hub<GameId>,
    words: WordList,
    codec: JsonCodec,
}

impl GameService {
    pub fn new(
        words: WordList,
        repository: Arc<dyn GameRepository>,
        directory: Arc<dyn PlayerDirectory>,
        hub: Hub<GameId>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            unsaved: Mutex::new(HashSet::new()),
            repository,
            directory,
            hub,
            words,
            codec: JsonCodec,
        }
    }

    /// The per-game channel registry state updates are broadcast through.
    pub fn hub(&self) -> &Hub<GameId> {
        &self.hub
    }

    /// Creates and persists a new game with a random solution.
    ///
    /// The session is not loaded until someone plays or watches the game.
    ///
    /// # Errors
    /// Fails if the repository rejects the record.
    pub async fn create_game(
        &self,
        first: &PlayerId,
        second: &PlayerId,
    ) -> Result<Game, GameError> {
        let game = Game::new(
            GameId::generate(),
            self.words.draw(),
            first.clone(),
            second.clone(),
        );
        self.repository.create_game(&game).await?;

        tracing::info!(game_id = %game.id, %first, %second, "game created");
        self.broadcast_state(&game).await;
        Ok(game)
    }

    /// Applies a guess and broadcasts the new state.
    ///
    /// Ignored guesses change nothing and broadcast nothing. When a guess
    /// ends the game a rematch (players swapped) is created and linked
    /// via `rematch_game_id`, and the finished session is evicted once it
    /// is saved. Persistence failures after the move are logged; the
    /// in-memory game stays authoritative and pinned.
    pub async fn submit_guess(
        &self,
        game_id: &GameId,
        player: &PlayerId,
        word: &str,
    ) -> Result<GuessOutcome, GameError> {
        let session = self.session(game_id).await?;

        let (outcome, game, saved) = {
            let mut game = session.lock().await;
            let outcome = game.apply_guess(player, word);
            if let GuessOutcome::Ignored(reason) = outcome {
                tracing::debug!(%game_id, %player, %reason, "guess ignored");
                return Ok(outcome);
            }

            if let GuessOutcome::Finished(result) = &outcome {
                tracing::info!(%game_id, %player, %result, "game finished");
                let (first, second) =
                    (game.second_player.clone(), game.first_player.clone());
                match self.create_game(&first, &second).await {
                    Ok(rematch) => game.rematch_game_id = Some(rematch.id),
                    Err(e) => {
                        tracing::warn!(%game_id, error = %e, "failed to create rematch");
                    }
                }
            } else {
                tracing::debug!(%game_id, %player, "guess recorded");
            }

            let saved = match self.repository.update_game(&game).await {
                Ok(()) => {
                    self.unsaved.lock().await.remove(game_id);
                    true
                }
                Err(e) => {
                    tracing::warn!(%game_id, error = %e, "failed to persist guess");
                    self.unsaved.lock().await.insert(game_id.clone());
                    // Eviction may have raced with this guess; keep it live.
                    self.sessions
                        .write()
                        .await
                        .entry(game_id.clone())
                        .or_insert_with(|| Arc::clone(&session));
                    false
                }
            };
            (outcome, game.clone(), saved)
        };

        if saved && game.is_finished() {
            self.evict(game_id).await;
        }
        self.broadcast_state(&game).await;
        Ok(outcome)
    }

    /// Subscribes `channel` to state updates of `game_id`.
    pub async fn watch(&self, game_id: &GameId, channel: ChannelHandle) {
        self.hub.add(game_id.clone(), channel).await;
    }

    /// Drops one watcher of `game_id`.
    ///
    /// When it was the last one the session is released from memory,
    /// unless its latest state is still unsaved.
    pub async fn unwatch(&self, game_id: &GameId, conn_id: ConnectionId) {
        if self.hub.remove(game_id, conn_id).await > 0 {
            return;
        }
        let Some(session) = self.sessions.read().await.get(game_id).cloned() else {
            return;
        };
        // Let an in-flight guess finish first.
        let _game = session.lock().await;
        if self.unsaved.lock().await.contains(game_id) {
            tracing::debug!(%game_id, "unsaved session kept");
            return;
        }
        self.evict(game_id).await;
    }

    /// Number of sessions currently held in memory.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// A copy of the game, loading it from the repository on first use.
    pub async fn get_game(&self, game_id: &GameId) -> Result<Game, GameError> {
        let session = self.session(game_id).await?;
        let game = session.lock().await;
        Ok(game.clone())
    }

    /// Every stored game `player` takes part in, newest first.
    pub async fn games_for_player(
        &self,
        player: &PlayerId,
    ) -> Result<Vec<Game>, GameError> {
        Ok(self.repository.games_by_player(player).await?)
    }

    /// Sends the current state of `game_id` to a single channel.
    pub async fn send_state(
        &self,
        game_id: &GameId,
        channel: &ChannelHandle,
    ) -> Result<(), GameError> {
        let game = self.get_game(game_id).await?;
        let Some(payload) = self.encode_state(&game).await else {
            return Ok(());
        };
        if let Err(e) = channel.send(&payload) {
            tracing::debug!(
                %game_id, conn_id = %channel.id(), error = %e,
                "state not delivered"
            );
        }
        Ok(())
    }

    /// Client view of `game`, with display names resolved.
    pub async fn state_view(&self, game: &Game) -> GameStateView {
        let solution = game.is_finished().then(|| game.solution.clone());
        GameStateView {
            id: game.id.clone(),
            created_at: game.created_at,
            updated_at: game.updated_at,
            first_player: self.summary(&game.first_player).await,
            second_player: self.summary(&game.second_player).await,
            current_player: game.current_player.clone(),
            result: game.result.to_string(),
            guesses: game.guesses.clone(),
            feedback: feedbacks(game),
            solution,
            rematch_game_id: game.rematch_game_id.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn session(&self, game_id: &GameId) -> Result<Session, GameError> {
        if let Some(session) = self.sessions.read().await.get(game_id) {
            return Ok(Arc::clone(session));
        }

        let game = self
            .repository
            .get_game(game_id)
            .await?
            .ok_or_else(|| GameError::NotFound(game_id.clone()))?;

        // Another task may have loaded it meanwhile; keep whichever won.
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(game_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(game)));
        tracing::debug!(%game_id, "game loaded from repository");
        Ok(Arc::clone(session))
    }

    async fn evict(&self, game_id: &GameId) {
        if self.sessions.write().await.remove(game_id).is_some() {
            tracing::debug!(%game_id, "session released");
        }
    }

    async fn summary(&self, player: &PlayerId) -> PlayerSummary {
        let name = self
            .directory
            .display_name(player)
            .await
            .unwrap_or_else(|| UNKNOWN_PLAYER_NAME.to_string());
        PlayerSummary {
            id: player.clone(),
            name,
        }
    }

    async fn encode_state(&self, game: &Game) -> Option<Vec<u8>> {
        let msg = ServerMessage::GameState(self.state_view(game).await);
        match self.codec.encode(&msg) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::error!(game_id = %game.id, error = %e, "failed to encode state");
                None
            }
        }
    }

    async fn broadcast_state(&self, game: &Game) {
        if let Some(payload) = self.encode_state(game).await {
            let delivered = self.hub.broadcast(&game.id, &payload).await;
            tracing::debug!(game_id = %game.id, delivered, "state broadcast");
        }
    }
}

#[async_trait]
impl GameFactory for GameService {
    async fn start_game(
        &self,
        first: &PlayerId,
        second: &PlayerId,
    ) -> Result<GameId, GameError> {
        self.create_game(first, second).await.map(|game| game.id)
    }
}
