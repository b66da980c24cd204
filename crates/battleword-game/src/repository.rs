//! Collaborator seams: game persistence and the player directory.
//!
//! The server only ever talks to these traits. [`MemoryStore`] implements
//! both and is what the binary and the tests use.

use std::collections::HashMap;

use async_trait::async_trait;
use battleword_protocol::{GameId, PlayerId};
use tokio::sync::Mutex;

use crate::{Game, RepositoryError};

/// Durable storage for [`Game`] records.
#[async_trait]
pub trait GameRepository: Send + Sync + 'static {
    /// Stores a new game. Fails if the id is already taken.
    async fn create_game(&self, game: &Game) -> Result<(), RepositoryError>;

    /// Loads one game; `Ok(None)` if it does not exist.
    async fn get_game(&self, id: &GameId) -> Result<Option<Game>, RepositoryError>;

    /// Every game `player` takes part in, newest first.
    async fn games_by_player(
        &self,
        player: &PlayerId,
    ) -> Result<Vec<Game>, RepositoryError>;

    /// Replaces the stored record with `game`.
    async fn update_game(&self, game: &Game) -> Result<(), RepositoryError>;
}

/// Read-only lookup of display names.
#[async_trait]
pub trait PlayerDirectory: Send + Sync + 'static {
    /// `None` when the player is unknown.
    async fn display_name(&self, player: &PlayerId) -> Option<String>;
}

/// In-memory [`GameRepository`] and [`PlayerDirectory`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    games: Mutex<HashMap<GameId, Game>>,
    names: Mutex<HashMap<PlayerId, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or renames) a player in the directory.
    pub async fn set_display_name(&self, player: PlayerId, name: impl Into<String>) {
        self.names.lock().await.insert(player, name.into());
    }

    /// Number of stored games.
    pub async fn game_count(&self) -> usize {
        self.games.lock().await.len()
    }
}

#[async_trait]
impl GameRepository for MemoryStore {
    async fn create_game(&self, game: &Game) -> Result<(), RepositoryError> {
        let mut games = self.games.lock().await;
        if games.contains_key(&game.id) {
            return Err(RepositoryError::Duplicate(game.id.clone()));
        }
        games.insert(game.id.clone(), game.clone());
        Ok(())
    }

    async fn get_game(&self, id: &GameId) -> Result<Option<Game>, RepositoryError> {
        Ok(self.games.lock().await.get(id).cloned())
    }

    async fn games_by_player(
        &self,
        player: &PlayerId,
    ) -> Result<Vec<Game>, RepositoryError> {
        let mut games: Vec<Game> = self
            .games
            .lock()
            .await
            .values()
            .filter(|g| g.is_participant(player))
            .cloned()
            .collect();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(games)
    }

    async fn update_game(&self, game: &Game) -> Result<(), RepositoryError> {
        let mut games = self.games.lock().await;
        match games.get_mut(&game.id) {
            Some(stored) => {
                *stored = game.clone();
                Ok(())
            }
            None => Err(RepositoryError::Missing(game.id.clone())),
        }
    }
}

#[async_trait]
impl PlayerDirectory for MemoryStore {
    async fn display_name(&self, player: &PlayerId) -> Option<String> {
        self.names.lock().await.get(player).cloned()
    }
}
