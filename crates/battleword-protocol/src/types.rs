//! Core protocol types for Battleword's wire format.
//!
//! Every type here travels "on the wire": it is serialized to a JSON text
//! frame, sent over a WebSocket, and parsed on the other side. All
//! messages are flat objects tagged with a `type` field, e.g.
//!
//! ```json
//! { "type": "guess", "player_id": "p1", "guess": "CRANE" }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable, opaque player identifier issued by the account system.
///
/// Newtype over `String` so a `GameId` can never be passed where a
/// `PlayerId` is expected. `#[serde(transparent)]` keeps the JSON form a
/// plain string: `PlayerId("p1")` is just `"p1"`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the id is empty (the only validation the engine does).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A unique identifier for one game (one match between two players).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    /// Generates a fresh random (UUID v4) game id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for GameId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Game view
// ---------------------------------------------------------------------------

/// Classification of one letter of a guess against the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterFeedback {
    /// Right letter, right position.
    Correct,
    /// Letter occurs elsewhere in the solution (and is not yet claimed).
    Present,
    /// Letter does not occur in the unclaimed part of the solution.
    Absent,
}

/// A participant as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
}

/// The state of a game as pushed to its per-match channels.
///
/// `solution` is only present once the game has a result; `result` uses
/// the string form `""`, `"draw"` or `"lose:<player id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateView {
    pub id: GameId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub first_player: PlayerSummary,
    pub second_player: PlayerSummary,
    pub current_player: PlayerId,
    pub result: String,
    pub guesses: Vec<String>,
    pub feedback: Vec<Vec<LetterFeedback>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rematch_game_id: Option<GameId>,
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

/// Which negotiation an invite belongs to.
///
/// Challenges and rematches follow the same request/response protocol;
/// the kind decides which message names are used and keeps a rematch
/// answer from resolving a plain challenge (and vice versa).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invitation {
    Challenge,
    Rematch,
}

impl fmt::Display for Invitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Challenge => f.write_str("challenge"),
            Self::Rematch => f.write_str("rematch"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Messages clients send on any of the three endpoints.
///
/// Not every message makes sense on every endpoint; handlers ignore the
/// ones they don't understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on the matchmaking and notification endpoints
    /// (identifies the player), or a state request on a game endpoint.
    Join {
        #[serde(default)]
        player_id: Option<PlayerId>,
    },

    /// Submit a word in a game.
    Guess { player_id: PlayerId, guess: String },

    /// Leave the matchmaking queue.
    Leave,

    ChallengeInvite {
        from: PlayerId,
        to: PlayerId,
        #[serde(default)]
        from_name: Option<String>,
    },

    ChallengeResponse {
        from: PlayerId,
        to: PlayerId,
        accepted: bool,
    },

    ChallengeCancel { from: PlayerId, to: PlayerId },

    RematchOffer {
        from: PlayerId,
        to: PlayerId,
        #[serde(default)]
        from_name: Option<String>,
        /// The game the two players just finished.
        #[serde(default)]
        game_id: Option<GameId>,
    },

    RematchResponse {
        from: PlayerId,
        to: PlayerId,
        accepted: bool,
    },

    RematchCancel { from: PlayerId, to: PlayerId },
}

impl ClientMessage {
    /// Checks that every identifier the message carries is present.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] naming the empty field.
    pub fn check_identities(&self) -> Result<(), ProtocolError> {
        fn present(id: &PlayerId, field: &str) -> Result<(), ProtocolError> {
            if id.is_empty() {
                return Err(ProtocolError::InvalidMessage(format!(
                    "`{field}` must not be empty"
                )));
            }
            Ok(())
        }

        match self {
            Self::Join { player_id } => match player_id {
                Some(id) => present(id, "player_id"),
                None => Ok(()),
            },
            Self::Guess { player_id, .. } => present(player_id, "player_id"),
            Self::Leave => Ok(()),
            Self::ChallengeInvite { from, to, .. }
            | Self::ChallengeResponse { from, to, .. }
            | Self::ChallengeCancel { from, to }
            | Self::RematchOffer { from, to, .. }
            | Self::RematchResponse { from, to, .. }
            | Self::RematchCancel { from, to } => {
                present(from, "from")?;
                present(to, "to")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Messages the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full game snapshot, sent after every transition and on `join`.
    GameState(GameStateView),

    /// The matchmaking queue paired this player.
    MatchFound { game_id: GameId },

    /// The player is waiting in the matchmaking queue.
    Queued { waiting: usize },

    ChallengeInvite {
        from: PlayerId,
        to: PlayerId,
        from_name: String,
    },

    /// Outcome of a challenge. `from` is always the recipient's
    /// counterpart and `to` the recipient.
    ChallengeResult {
        from: PlayerId,
        to: PlayerId,
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_id: Option<GameId>,
    },

    ChallengeCancelled { from: PlayerId, to: PlayerId },

    RematchOffer {
        from: PlayerId,
        to: PlayerId,
        from_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_id: Option<GameId>,
    },

    /// Outcome of a rematch offer, labelled like [`ChallengeResult`].
    ///
    /// [`ChallengeResult`]: ServerMessage::ChallengeResult
    RematchResult {
        from: PlayerId,
        to: PlayerId,
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_id: Option<GameId>,
    },

    RematchCancelled { from: PlayerId, to: PlayerId },

    /// The invited player had no live notification channel.
    InviteUndelivered { kind: Invitation, to: PlayerId },

    /// `code` follows HTTP conventions (400 bad request, 404 not found).
    Error { code: u16, message: String },
}

impl ServerMessage {
    /// Shorthand for an [`Error`](ServerMessage::Error) message.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
