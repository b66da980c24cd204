//! Online presence and the challenge/rematch negotiation.
//!
//! A negotiation is one pending entry keyed by the invited player. It is
//! created by an invite, consumed by a response or a cancel, and purged
//! when either party's last notification channel goes away. Challenges
//! and rematches share the protocol; [`Invitation`] keeps them apart.

use std::collections::HashMap;
use std::sync::Arc;

use battleword_game::{GameFactory, PlayerDirectory};
use battleword_hub::Hub;
use battleword_protocol::{Codec, GameId, Invitation, JsonCodec, PlayerId, ServerMessage};
use battleword_transport::{ChannelHandle, ConnectionId};
use tokio::sync::Mutex;

use crate::LobbyError;

/// Whether an invite reached the invited player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The player was offline; nothing was recorded.
    NotDelivered,
}

/// An open invite, stored under the invited player's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    pub challenger: PlayerId,
    pub kind: Invitation,
}

/// How a negotiation ended after a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub kind: Invitation,
    pub challenger: PlayerId,
    pub challenged: PlayerId,
    /// `false` if declined or if the game could not be created.
    pub accepted: bool,
    pub game_id: Option<GameId>,
}

/// Routes negotiation messages between online players.
pub struct NotificationRouter {
    online: Hub<PlayerId>,
    pending: Mutex<HashMap<PlayerId, PendingChallenge>>,
    games: Arc<dyn GameFactory>,
    directory: Arc<dyn PlayerDirectory>,
    codec: JsonCodec,
}

impl NotificationRouter {
    pub fn new(games: Arc<dyn GameFactory>, directory: Arc<dyn PlayerDirectory>) -> Self {
        Self {
            online: Hub::new(),
            pending: Mutex::new(HashMap::new()),
            games,
            directory,
            codec: JsonCodec,
        }
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    /// Marks `player` online through `channel`.
    pub async fn register(&self, player: PlayerId, channel: ChannelHandle) {
        let conn_id = channel.id();
        self.online.add(player.clone(), channel).await;
        tracing::info!(player_id = %player, %conn_id, "player online");
    }

    /// Drops one notification channel of `player`.
    ///
    /// When it was the last one, every negotiation the player takes part
    /// in (either side) is discarded.
    pub async fn unregister(&self, player: &PlayerId, conn_id: ConnectionId) {
        if self.online.remove(player, conn_id).await > 0 {
            return;
        }
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|invited, entry| invited != player && entry.challenger != *player);
        tracing::info!(
            player_id = %player,
            purged = before - pending.len(),
            "player offline"
        );
    }

    pub async fn is_online(&self, player: &PlayerId) -> bool {
        self.online.is_connected(player).await
    }

    /// The open invite addressed to `player`, if any.
    pub async fn pending_for(&self, player: &PlayerId) -> Option<PendingChallenge> {
        self.pending.lock().await.get(player).cloned()
    }

    // -----------------------------------------------------------------------
    // Negotiation
    // -----------------------------------------------------------------------

    /// Invites `to` on behalf of `from`, replacing any open invite to `to`.
    ///
    /// If `to` has no live channel the sender gets `invite_undelivered`
    /// and nothing is recorded. `game_id` is only forwarded for rematch
    /// offers.
    pub async fn invite(
        &self,
        kind: Invitation,
        from: &PlayerId,
        to: &PlayerId,
        from_name: Option<String>,
        game_id: Option<GameId>,
    ) -> Result<Delivery, LobbyError> {
        let from_name = self.display_name(from, from_name).await;
        let msg = match kind {
            Invitation::Challenge => ServerMessage::ChallengeInvite {
                from: from.clone(),
                to: to.clone(),
                from_name,
            },
            Invitation::Rematch => ServerMessage::RematchOffer {
                from: from.clone(),
                to: to.clone(),
                from_name,
                game_id,
            },
        };
        let payload = self.codec.encode(&msg)?;

        if self.online.is_connected(to).await {
            self.pending.lock().await.insert(
                to.clone(),
                PendingChallenge {
                    challenger: from.clone(),
                    kind,
                },
            );
            if self.online.broadcast(to, &payload).await > 0 {
                tracing::info!(%kind, %from, %to, "invite delivered");
                return Ok(Delivery::Delivered);
            }
            // Every channel turned out to be dead.
            self.withdraw(kind, from, to).await;
        }

        tracing::debug!(%kind, %from, %to, "invite not delivered");
        let undelivered = ServerMessage::InviteUndelivered { kind, to: to.clone() };
        self.notify(from, &undelivered).await?;
        Ok(Delivery::NotDelivered)
    }

    /// Answers the open invite addressed to `from`.
    ///
    /// Returns `None` when there is no open invite of this kind, for
    /// instance because it was cancelled; the responder alone then gets a
    /// declined result without a game id. Otherwise the challenger is the
    /// one recorded with the invite and `to` is only used for logging.
    ///
    /// On acceptance a game is created with the
    /// challenger moving first. The outcome goes to both players, each
    /// seeing the other as `from`.
    pub async fn respond(
        &self,
        kind: Invitation,
        from: &PlayerId,
        to: &PlayerId,
        accepted: bool,
    ) -> Result<Option<Resolution>, LobbyError> {
        let entry = {
            let mut pending = self.pending.lock().await;
            match pending.get(from) {
                Some(entry) if entry.kind == kind => pending.remove(from),
                _ => None,
            }
        };
        let Some(PendingChallenge { challenger, .. }) = entry else {
            tracing::debug!(%kind, %from, %to, "no open invite, response declined");
            let declined = Resolution {
                kind,
                challenger: to.clone(),
                challenged: from.clone(),
                accepted: false,
                game_id: None,
            };
            self.notify(from, &result_message(&declined, to, from)).await?;
            return Ok(None);
        };
        if challenger != *to {
            tracing::debug!(
                %kind, %from, %to, %challenger,
                "response addressed to stale challenger"
            );
        }

        let challenged = from.clone();
        let game_id = if accepted {
            match self.games.start_game(&challenger, &challenged).await {
                Ok(game_id) => Some(game_id),
                Err(e) => {
                    tracing::warn!(
                        %kind, %challenger, %challenged, error = %e,
                        "failed to create game"
                    );
                    None
                }
            }
        } else {
            None
        };
        let resolution = Resolution {
            kind,
            accepted: game_id.is_some(),
            game_id,
            challenger,
            challenged,
        };
        tracing::info!(
            %kind,
            challenger = %resolution.challenger,
            challenged = %resolution.challenged,
            accepted = resolution.accepted,
            "negotiation resolved"
        );

        let (challenger, challenged) = (&resolution.challenger, &resolution.challenged);
        let to_challenger = result_message(&resolution, challenged, challenger);
        let to_challenged = result_message(&resolution, challenger, challenged);
        self.notify(challenger, &to_challenger).await?;
        self.notify(challenged, &to_challenged).await?;
        Ok(Some(resolution))
    }

    /// Withdraws `from`'s open invite to `to` and tells `to` about it.
    ///
    /// Returns `false` if `to` has no open invite of this kind from `from`.
    pub async fn cancel(
        &self,
        kind: Invitation,
        from: &PlayerId,
        to: &PlayerId,
    ) -> Result<bool, LobbyError> {
        if !self.withdraw(kind, from, to).await {
            tracing::debug!(%kind, %from, %to, "nothing to cancel");
            return Ok(false);
        }
        tracing::info!(%kind, %from, %to, "invite cancelled");
        let msg = match kind {
            Invitation::Challenge => ServerMessage::ChallengeCancelled {
                from: from.clone(),
                to: to.clone(),
            },
            Invitation::Rematch => ServerMessage::RematchCancelled {
                from: from.clone(),
                to: to.clone(),
            },
        };
        self.notify(to, &msg).await?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn withdraw(&self, kind: Invitation, from: &PlayerId, to: &PlayerId) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.get(to) {
            Some(entry) if entry.kind == kind && entry.challenger == *from => {
                pending.remove(to);
                true
            }
            _ => false,
        }
    }

    async fn display_name(&self, player: &PlayerId, supplied: Option<String>) -> String {
        if let Some(name) = self.directory.display_name(player).await {
            return name;
        }
        supplied
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| player.to_string())
    }

    /// Best-effort delivery to every channel of `player`.
    async fn notify(&self, player: &PlayerId, msg: &ServerMessage) -> Result<(), LobbyError> {
        let payload = self.codec.encode(msg)?;
        if self.online.broadcast(player, &payload).await == 0 {
            tracing::debug!(player_id = %player, "notification not delivered");
        }
        Ok(())
    }
}

fn result_message(resolution: &Resolution, from: &PlayerId, to: &PlayerId) -> ServerMessage {
    let (from, to) = (from.clone(), to.clone());
    let (accepted, game_id) = (resolution.accepted, resolution.game_id.clone());
    match resolution.kind {
        Invitation::Challenge => ServerMessage::ChallengeResult { from, to, accepted, game_id },
        Invitation::Rematch => ServerMessage::RematchResult { from, to, accepted, game_id },
    }
}
