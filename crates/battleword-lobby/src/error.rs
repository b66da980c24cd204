//! Error types for the lobby layer.

use battleword_protocol::ProtocolError;

/// Errors raised while notifying players.
///
/// Negotiation outcomes (ignored responses, failed cancels, undelivered
/// invites) are values, not errors.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("failed to encode notification: {0}")]
    Encode(#[from] ProtocolError),
}
