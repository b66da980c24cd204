//! The game record and its state transitions.
//!
//! Everything here is synchronous and I/O free: [`Game::apply_guess`] is
//! the whole rulebook. Persistence and broadcasting live in
//! [`GameService`](crate::GameService).

use std::fmt;
use std::str::FromStr;

use battleword_protocol::{GameId, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Total guesses (both players combined) before a game is a draw.
pub const MAX_GUESSES: usize = 6;

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// How a game ended, if it has.
///
/// Stored and sent as a string: `""` while pending, `"draw"`, or
/// `"lose:<player id>"` naming the player who completed the word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum GameResult {
    #[default]
    Pending,
    Draw,
    Lose(PlayerId),
}

impl GameResult {
    /// `true` once the game is over.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => Ok(()),
            Self::Draw => f.write_str("draw"),
            Self::Lose(player) => write!(f, "lose:{player}"),
        }
    }
}

/// The string was not `""`, `"draw"` or `"lose:<id>"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized game result {0:?}")]
pub struct ParseResultError(String);

impl FromStr for GameResult {
    type Err = ParseResultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Pending),
            "draw" => Ok(Self::Draw),
            other => match other.strip_prefix("lose:") {
                Some(id) if !id.is_empty() => Ok(Self::Lose(PlayerId::from(id))),
                _ => Err(ParseResultError(other.to_string())),
            },
        }
    }
}

impl Serialize for GameResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GameResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// Lifecycle of a game, derived from its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameStatus {
    /// One of the player slots is still empty.
    AwaitingSecondPlayer,
    InProgress,
    Finished(GameResult),
}

/// Why a guess was dropped without changing the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotYourTurn,
    GameOver,
    /// The game has no opponent yet and the opening guess was made.
    AwaitingOpponent,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotYourTurn => "not your turn",
            Self::GameOver => "game is over",
            Self::AwaitingOpponent => "waiting for an opponent",
        })
    }
}

/// What [`Game::apply_guess`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// Recorded; the turn passed to the other player.
    Continued,
    /// Recorded, and it ended the game.
    Finished(GameResult),
    /// Not recorded.
    Ignored(Rejection),
}

/// One match between two players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    /// Uppercase solution word. Never shown to clients until the game ends.
    pub solution: String,
    pub first_player: PlayerId,
    pub second_player: PlayerId,
    pub current_player: PlayerId,
    /// Guesses in submission order, stored as typed.
    pub guesses: Vec<String>,
    pub result: GameResult,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Follow-up game created when this one finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rematch_game_id: Option<GameId>,
}

impl Game {
    /// A fresh game where `first` moves first.
    pub fn new(
        id: GameId,
        solution: impl Into<String>,
        first: PlayerId,
        second: PlayerId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            solution: solution.into().to_uppercase(),
            current_player: first.clone(),
            first_player: first,
            second_player: second,
            guesses: Vec::new(),
            result: GameResult::Pending,
            created_at: now,
            updated_at: now,
            rematch_game_id: None,
        }
    }

    pub fn status(&self) -> GameStatus {
        if self.result.is_final() {
            GameStatus::Finished(self.result.clone())
        } else if self.first_player.is_empty() || self.second_player.is_empty() {
            GameStatus::AwaitingSecondPlayer
        } else {
            GameStatus::InProgress
        }
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_final()
    }

    pub fn is_participant(&self, player: &PlayerId) -> bool {
        *player == self.first_player || *player == self.second_player
    }

    /// The other participant, or `None` if `player` is not in this game.
    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        if *player == self.first_player {
            Some(&self.second_player)
        } else if *player == self.second_player {
            Some(&self.first_player)
        } else {
            None
        }
    }

    /// Applies one guess from `player`.
    ///
    /// A guess matching the solution (case-insensitively) makes the
    /// guesser lose. Otherwise the sixth guess makes the game a draw, and
    /// any earlier guess passes the turn. Out-of-turn guesses and guesses
    /// on a finished game change nothing.
    ///
    /// While a player slot is empty and the turn belongs to it, the first
    /// outsider to guess takes the slot and plays that turn.
    pub fn apply_guess(&mut self, player: &PlayerId, word: &str) -> GuessOutcome {
        match self.status() {
            GameStatus::Finished(_) => return GuessOutcome::Ignored(Rejection::GameOver),
            GameStatus::AwaitingSecondPlayer => {
                if !self.take_open_seat(player) && !self.guesses.is_empty() {
                    return GuessOutcome::Ignored(Rejection::AwaitingOpponent);
                }
            }
            GameStatus::InProgress => {}
        }
        if *player != self.current_player {
            return GuessOutcome::Ignored(Rejection::NotYourTurn);
        }

        self.guesses.push(word.to_string());
        self.updated_at = Utc::now();

        if word.to_uppercase() == self.solution.to_uppercase() {
            self.result = GameResult::Lose(player.clone());
        } else if self.guesses.len() >= MAX_GUESSES {
            self.result = GameResult::Draw;
        } else {
            let next = if *player == self.first_player {
                self.second_player.clone()
            } else {
                self.first_player.clone()
            };
            self.current_player = next;
            return GuessOutcome::Continued;
        }
        GuessOutcome::Finished(self.result.clone())
    }

    fn take_open_seat(&mut self, player: &PlayerId) -> bool {
        if !self.current_player.is_empty() || player.is_empty() || self.is_participant(player) {
            return false;
        }
        if self.first_player.is_empty() {
            self.first_player = player.clone();
        } else {
            self.second_player = player.clone();
        }
        self.current_player = player.clone();
        true
    }
}
