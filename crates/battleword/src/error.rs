//! Unified error type for the Battleword server.

use battleword_game::GameError;
use battleword_lobby::LobbyError;
use battleword_protocol::ProtocolError;
use battleword_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BattlewordError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A game-level error (unknown game, storage failure).
    #[error(transparent)]
    Game(#[from] GameError),

    /// A lobby-level error (notification encoding).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// The environment held an unusable setting.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use battleword_protocol::GameId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let top: BattlewordError = err.into();
        assert!(matches!(top, BattlewordError::Transport(_)));
        assert!(top.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let top: BattlewordError = err.into();
        assert!(matches!(top, BattlewordError::Protocol(_)));
    }

    #[test]
    fn test_from_game_error() {
        let err = GameError::NotFound(GameId::from("g-9"));
        let top: BattlewordError = err.into();
        assert!(matches!(top, BattlewordError::Game(_)));
        assert!(top.to_string().contains("g-9"));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::InvalidValue {
            var: "PORT",
            value: "eighty".into(),
        };
        let top: BattlewordError = err.into();
        assert!(matches!(top, BattlewordError::Config(_)));
    }
}
