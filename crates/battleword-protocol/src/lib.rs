//! Wire protocol for Battleword.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Identity** ([`PlayerId`], [`GameId`]): opaque string ids.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): flat JSON
//!   objects tagged with a `type` field.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become
//!   bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong on the way.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Game / Lobby (rules)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, GameId, GameStateView, Invitation, LetterFeedback,
    PlayerId, PlayerSummary, ServerMessage,
};
