//! Error types for the protocol layer.
//!
//! Each crate in Battleword defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning bytes into messages (or
//! back), not in networking or game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or an
    /// unknown `type` tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but breaks a protocol rule, e.g. an empty
    /// player id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
