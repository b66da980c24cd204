//! Connection registry for Battleword.
//!
//! A [`Hub`] answers one question: "which live channels should receive a
//! message addressed to this key?" It attaches no meaning to the key.
//! The server runs two instances:
//!
//! ```text
//! Hub<GameId>  : per-match channels (both players, plus reconnects)
//! Hub<PlayerId>: per-player notification channels
//! ```
//!
//! Membership is weak: entries never own a game or a player, and a
//! channel whose send fails is dropped the next time someone broadcasts
//! to its key.

mod hub;

pub use hub::Hub;
