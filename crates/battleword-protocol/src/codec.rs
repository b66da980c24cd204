//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The engine doesn't care HOW messages are serialized; it holds
//! something that implements [`Codec`] and calls it at the edges.
//!
//! Battleword clients speak JSON text frames, so [`JsonCodec`] is the
//! only implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` lets one codec value live in shared server
/// state and be used from any Tokio worker thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use battleword_protocol::{Codec, GameId, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let msg = ServerMessage::MatchFound { game_id: GameId::from("g-1") };
///
/// let bytes = codec.encode(&msg).unwrap();
/// assert_eq!(bytes, br#"{"type":"match_found","game_id":"g-1"}"#);
///
/// let decoded: ServerMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientMessage, PlayerId};

    #[test]
    fn test_decode_guess_from_client_json() {
        let codec = JsonCodec;
        let msg: ClientMessage = codec
            .decode(br#"{"type":"guess","player_id":"p1","guess":"crane"}"#)
            .expect("valid guess");
        assert_eq!(
            msg,
            ClientMessage::Guess {
                player_id: PlayerId::from("p1"),
                guess: "crane".into(),
            }
        );
    }

    #[test]
    fn test_decode_unknown_type_returns_decode_error() {
        let codec = JsonCodec;
        let err = codec
            .decode::<ClientMessage>(br#"{"type":"teleport"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let codec = JsonCodec;
        assert!(codec.decode::<ClientMessage>(b"not json").is_err());
    }
}
