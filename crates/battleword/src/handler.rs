//! Per-connection handler: endpoint routing and message dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The request path picks the endpoint:
//!   - `/ws/game/{id}`: watch one game and submit guesses
//!   - `/ws/matchmaking`: wait in the queue for an anonymous opponent
//!   - `/ws/notifications`: presence plus challenge/rematch negotiation
//!
//! Registrations made on behalf of a connection are undone by drop
//! guards, so every way out of a handler cleans up.

use std::sync::Arc;

use battleword_game::{GameError, GameService};
use battleword_protocol::{
    ClientMessage, Codec, GameId, Invitation, JsonCodec, PlayerId,
    ProtocolError, ServerMessage,
};
use battleword_transport::{
    ChannelHandle, Connection, ConnectionId, WebSocketConnection,
};

use crate::server::ServerState;
use crate::BattlewordError;

pub const GAME_PATH_PREFIX: &str = "/ws/game/";
pub const MATCHMAKING_PATH: &str = "/ws/matchmaking";
pub const NOTIFICATIONS_PATH: &str = "/ws/notifications";

#[derive(Debug, PartialEq, Eq)]
enum Endpoint {
    Game(GameId),
    Matchmaking,
    Notifications,
}

impl Endpoint {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            MATCHMAKING_PATH => Some(Self::Matchmaking),
            NOTIFICATIONS_PATH => Some(Self::Notifications),
            _ => path
                .strip_prefix(GAME_PATH_PREFIX)
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Self::Game(GameId::from(id))),
        }
    }
}

// ---------------------------------------------------------------------------
// Drop guards
// ---------------------------------------------------------------------------
//
// `Drop` is synchronous, so each guard spawns a fire-and-forget task for
// the async cleanup.

/// Stops a per-match channel from watching its game.
struct WatchGuard {
    game_id: GameId,
    conn_id: ConnectionId,
    games: Arc<GameService>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let (game_id, conn_id, games) =
            (self.game_id.clone(), self.conn_id, Arc::clone(&self.games));
        tokio::spawn(async move {
            games.unwatch(&game_id, conn_id).await;
        });
    }
}

/// Takes the entry this connection made out of the matchmaking queue.
struct QueueGuard {
    player_id: PlayerId,
    conn_id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for QueueGuard {
    fn drop(&mut self) {
        let (player_id, conn_id) = (self.player_id.clone(), self.conn_id);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.queue.leave_if(&player_id, conn_id).await;
        });
    }
}

/// Drops a notification channel, purging negotiations if it was the last.
struct PresenceGuard {
    player_id: PlayerId,
    conn_id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        let (player_id, conn_id) = (self.player_id.clone(), self.conn_id);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.router.unregister(&player_id, conn_id).await;
        });
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), BattlewordError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, path = conn.path(), "handling new connection");

    let result = match Endpoint::from_path(conn.path()) {
        Some(Endpoint::Game(game_id)) => game_endpoint(&conn, &state, game_id).await,
        Some(Endpoint::Matchmaking) => matchmaking_endpoint(&conn, &state).await,
        Some(Endpoint::Notifications) => notifications_endpoint(&conn, &state).await,
        None => send_error(&conn.channel(), &state.codec, 404, "unknown endpoint"),
    };

    conn.close();
    tracing::debug!(%conn_id, "connection closed");
    result
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

async fn game_endpoint(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    game_id: GameId,
) -> Result<(), BattlewordError> {
    let channel = conn.channel();
    state.games.watch(&game_id, channel.clone()).await;
    let _guard = WatchGuard {
        game_id: game_id.clone(),
        conn_id: conn.id(),
        games: Arc::clone(&state.games),
    };

    while let Some(msg) = next_message(conn, &state.codec, &channel).await? {
        match msg {
            ClientMessage::Join { .. } => {
                if let Err(e) = state.games.send_state(&game_id, &channel).await {
                    report_game_error(&channel, &state.codec, &e)?;
                }
            }
            ClientMessage::Guess { player_id, guess } => {
                // Ignored guesses are silent; the service logs them.
                if let Err(e) =
                    state.games.submit_guess(&game_id, &player_id, &guess).await
                {
                    report_game_error(&channel, &state.codec, &e)?;
                }
            }
            other => {
                tracing::debug!(%game_id, message = ?other, "ignored on game endpoint");
            }
        }
    }
    Ok(())
}

async fn matchmaking_endpoint(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
) -> Result<(), BattlewordError> {
    let channel = conn.channel();
    let player_id = expect_join(conn, state, &channel).await?;

    if !state.queue.join(player_id.clone(), channel.clone()).await {
        return send_error(&channel, &state.codec, 409, "already waiting for a match");
    }
    let _guard = QueueGuard {
        player_id: player_id.clone(),
        conn_id: conn.id(),
        state: Arc::clone(state),
    };

    let waiting = state.queue.len().await;
    send(&channel, &state.codec, &ServerMessage::Queued { waiting })?;

    while let Some(found) = state.queue.try_match().await {
        found.announce(&state.codec)?;
    }

    // Stay until paired (the match closes this channel) or told to leave.
    while let Some(msg) = next_message(conn, &state.codec, &channel).await? {
        match msg {
            ClientMessage::Leave => {
                tracing::info!(%player_id, "player asked to leave queue");
                break;
            }
            other => {
                tracing::debug!(
                    %player_id, message = ?other,
                    "ignored on matchmaking endpoint"
                );
            }
        }
    }
    Ok(())
}

async fn notifications_endpoint(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
) -> Result<(), BattlewordError> {
    let channel = conn.channel();
    let player_id = expect_join(conn, state, &channel).await?;

    state.router.register(player_id.clone(), channel.clone()).await;
    let _guard = PresenceGuard {
        player_id: player_id.clone(),
        conn_id: conn.id(),
        state: Arc::clone(state),
    };

    while let Some(msg) = next_message(conn, &state.codec, &channel).await? {
        dispatch_negotiation(state, &player_id, msg).await?;
    }
    Ok(())
}

/// Routes one negotiation message sent by `player_id`.
///
/// Messages claiming to come from another player are dropped.
async fn dispatch_negotiation(
    state: &ServerState,
    player_id: &PlayerId,
    msg: ClientMessage,
) -> Result<(), BattlewordError> {
    let Some(sender) = negotiation_sender(&msg) else {
        tracing::debug!(%player_id, message = ?msg, "ignored on notification endpoint");
        return Ok(());
    };
    if sender != player_id {
        tracing::debug!(%player_id, claimed = %sender, "sender mismatch, message dropped");
        return Ok(());
    }

    let router = &state.router;
    match msg {
        ClientMessage::ChallengeInvite { from, to, from_name } => {
            router
                .invite(Invitation::Challenge, &from, &to, from_name, None)
                .await?;
        }
        ClientMessage::RematchOffer {
            from,
            to,
            from_name,
            game_id,
        } => {
            router
                .invite(Invitation::Rematch, &from, &to, from_name, game_id)
                .await?;
        }
        ClientMessage::ChallengeResponse { from, to, accepted } => {
            router
                .respond(Invitation::Challenge, &from, &to, accepted)
                .await?;
        }
        ClientMessage::RematchResponse { from, to, accepted } => {
            router
                .respond(Invitation::Rematch, &from, &to, accepted)
                .await?;
        }
        ClientMessage::ChallengeCancel { from, to } => {
            router.cancel(Invitation::Challenge, &from, &to).await?;
        }
        ClientMessage::RematchCancel { from, to } => {
            router.cancel(Invitation::Rematch, &from, &to).await?;
        }
        ClientMessage::Join { .. } | ClientMessage::Guess { .. } | ClientMessage::Leave => {}
    }
    Ok(())
}

/// The `from` of a negotiation message, `None` for anything else.
fn negotiation_sender(msg: &ClientMessage) -> Option<&PlayerId> {
    match msg {
        ClientMessage::ChallengeInvite { from, .. }
        | ClientMessage::ChallengeResponse { from, .. }
        | ClientMessage::ChallengeCancel { from, .. }
        | ClientMessage::RematchOffer { from, .. }
        | ClientMessage::RematchResponse { from, .. }
        | ClientMessage::RematchCancel { from, .. } => Some(from),
        ClientMessage::Join { .. } | ClientMessage::Guess { .. } | ClientMessage::Leave => None,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Waits for the identifying `join` that opens the matchmaking and
/// notification endpoints.
async fn expect_join(
    conn: &WebSocketConnection,
    state: &ServerState,
    channel: &ChannelHandle,
) -> Result<PlayerId, BattlewordError> {
    let first = match tokio::time::timeout(
        state.handshake_timeout,
        next_message(conn, &state.codec, channel),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            send_error(channel, &state.codec, 408, "timed out waiting for join")?;
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    match first {
        Some(ClientMessage::Join {
            player_id: Some(player_id),
        }) => Ok(player_id),
        Some(_) => {
            send_error(channel, &state.codec, 400, "expected join with a player_id")?;
            Err(ProtocolError::InvalidMessage("first message must be join".into()).into())
        }
        None => Err(ProtocolError::InvalidMessage(
            "connection closed before join".into(),
        )
        .into()),
    }
}

/// Reads until a well-formed message arrives; `Ok(None)` once the peer is
/// gone. Malformed frames are answered with a 400 and skipped.
async fn next_message(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    channel: &ChannelHandle,
) -> Result<Option<ClientMessage>, BattlewordError> {
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "recv error");
                return Ok(None);
            }
        };

        let msg: ClientMessage = match codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "failed to decode message");
                send_error(channel, codec, 400, &format!("invalid message: {e}"))?;
                continue;
            }
        };
        if let Err(e) = msg.check_identities() {
            send_error(channel, codec, 400, &e.to_string())?;
            continue;
        }
        return Ok(Some(msg));
    }
}

fn report_game_error(
    channel: &ChannelHandle,
    codec: &JsonCodec,
    err: &GameError,
) -> Result<(), BattlewordError> {
    let code = match err {
        GameError::NotFound(_) => 404,
        GameError::Repository(_) => 500,
    };
    send_error(channel, codec, code, &err.to_string())
}

fn send(
    channel: &ChannelHandle,
    codec: &JsonCodec,
    msg: &ServerMessage,
) -> Result<(), BattlewordError> {
    let bytes = codec.encode(msg)?;
    channel.send(&bytes)?;
    Ok(())
}

/// Sends a `ServerMessage::Error` to the client.
fn send_error(
    channel: &ChannelHandle,
    codec: &JsonCodec,
    code: u16,
    message: &str,
) -> Result<(), BattlewordError> {
    send(channel, codec, &ServerMessage::error(code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_known_endpoints() {
        assert_eq!(Endpoint::from_path("/ws/matchmaking"), Some(Endpoint::Matchmaking));
        assert_eq!(Endpoint::from_path("/ws/notifications"), Some(Endpoint::Notifications));
        assert_eq!(
            Endpoint::from_path("/ws/game/abc-123"),
            Some(Endpoint::Game(GameId::from("abc-123")))
        );
    }

    #[test]
    fn test_from_path_rejects_unknown_and_malformed() {
        for path in ["/", "/ws", "/ws/game/", "/ws/game/a/b", "/ws/matchmaking/x"] {
            assert_eq!(Endpoint::from_path(path), None, "{path}");
        }
    }

    #[test]
    fn test_negotiation_sender_only_for_negotiation_messages() {
        let invite = ClientMessage::RematchCancel {
            from: PlayerId::from("a"),
            to: PlayerId::from("b"),
        };
        assert_eq!(negotiation_sender(&invite), Some(&PlayerId::from("a")));
        assert_eq!(negotiation_sender(&ClientMessage::Leave), None);
    }
}
