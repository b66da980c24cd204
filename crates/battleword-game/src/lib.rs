//! Game rules and live game sessions for Battleword.
//!
//! Two players alternate guesses at one hidden five-letter word. The
//! player who guesses it loses; six guesses without a hit is a draw.
//!
//! # Key types
//!
//! - [`feedback`]: the per-letter scoring function
//! - [`Game`]: one match and its pure state transitions
//! - [`WordList`]: the solution vocabulary
//! - [`GameService`]: the in-memory session arena, backed by a
//!   [`GameRepository`] and broadcasting through a [`battleword_hub::Hub`]
//! - [`GameFactory`]: the narrow "start a game for these two" seam the
//!   lobby depends on

mod error;
mod feedback;
mod game;
mod repository;
mod service;
mod words;

pub use error::{GameError, RepositoryError};
pub use feedback::{feedback, feedbacks};
pub use game::{
    Game, GameResult, GameStatus, GuessOutcome, ParseResultError, Rejection,
    MAX_GUESSES,
};
pub use repository::{GameRepository, MemoryStore, PlayerDirectory};
pub use service::{GameFactory, GameService, UNKNOWN_PLAYER_NAME};
pub use words::{WordList, FALLBACK_WORD, SOLUTION_LENGTH};
