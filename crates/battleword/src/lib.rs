//! # Battleword
//!
//! A two-player word-guessing game server. Players either queue for an
//! anonymous opponent or challenge someone who is online; each game is a
//! shared hidden five-letter word, and whoever completes it loses.
//!
//! The crate wires the layers together:
//!
//! ```text
//! transport (WebSocket) → protocol (JSON) → lobby (queue, negotiation)
//!                                          → game (sessions, feedback)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use battleword::prelude::*;
//!
//! # async fn start() -> Result<(), BattlewordError> {
//! let server = BattlewordServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{
    BIND_VAR, ConfigError, HANDSHAKE_TIMEOUT_VAR, PORT_VAR, ServerConfig,
    WORDS_VAR,
};
pub use error::BattlewordError;
pub use handler::{GAME_PATH_PREFIX, MATCHMAKING_PATH, NOTIFICATIONS_PATH};
pub use server::{BattlewordServer, BattlewordServerBuilder};

/// Everything needed to embed and drive a server.
pub mod prelude {
    pub use crate::{
        BattlewordError, BattlewordServer, BattlewordServerBuilder,
        ServerConfig,
    };
    pub use battleword_game::{
        Game, GameRepository, GameResult, GameService, MemoryStore,
        PlayerDirectory, WordList,
    };
    pub use battleword_protocol::{
        ClientMessage, GameId, Invitation, LetterFeedback, PlayerId,
        ServerMessage,
    };
}
