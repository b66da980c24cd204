//! Error types for the game layer.

use battleword_protocol::GameId;

/// Errors raised by a [`GameRepository`](crate::GameRepository)
/// implementation.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A game with this id is already stored.
    #[error("game {0} already exists")]
    Duplicate(GameId),

    /// An update targeted a game that was never stored.
    #[error("game {0} does not exist")]
    Missing(GameId),

    /// The backing store could not be reached or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during game operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Neither the session arena nor the repository knows this game.
    #[error("game {0} not found")]
    NotFound(GameId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
