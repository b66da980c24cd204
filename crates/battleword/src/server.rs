//! `BattlewordServer` builder and server loop.
//!
//! This is the entry point for running a Battleword server. It ties
//! together all the layers: transport → protocol → game / lobby.

use std::sync::Arc;
use std::time::Duration;

use battleword_game::{
    GameRepository, GameService, MemoryStore, PlayerDirectory, WordList,
};
use battleword_hub::Hub;
use battleword_lobby::{MatchmakingQueue, NotificationRouter};
use battleword_protocol::JsonCodec;
use battleword_transport::{Handshake, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{BattlewordError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Every
/// component does its own locking.
pub(crate) struct ServerState {
    pub(crate) games: Arc<GameService>,
    pub(crate) queue: MatchmakingQueue,
    pub(crate) router: NotificationRouter,
    pub(crate) codec: JsonCodec,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a Battleword server.
///
/// # Example
///
/// ```rust,no_run
/// use battleword::prelude::*;
///
/// # async fn start() -> Result<(), BattlewordError> {
/// let server = BattlewordServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BattlewordServerBuilder {
    config: ServerConfig,
    repository: Option<Arc<dyn GameRepository>>,
    directory: Option<Arc<dyn PlayerDirectory>>,
}

impl BattlewordServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            repository: None,
            directory: None,
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// How long a client may take to send its first `join`.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets the solution vocabulary.
    pub fn words(mut self, words: WordList) -> Self {
        self.config.word_list = words;
        self
    }

    /// Where games are persisted. Defaults to an in-memory store.
    pub fn repository(mut self, repository: Arc<dyn GameRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Where display names come from. Defaults to an in-memory store.
    pub fn directory(mut self, directory: Arc<dyn PlayerDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Binds the listener and wires up the shared state.
    pub async fn build(self) -> Result<BattlewordServer, BattlewordError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let store = Arc::new(MemoryStore::new());
        let repository = self
            .repository
            .unwrap_or_else(|| store.clone() as Arc<dyn GameRepository>);
        let directory = self.directory.unwrap_or(store);

        let games = Arc::new(GameService::new(
            self.config.word_list,
            repository,
            Arc::clone(&directory),
            Hub::new(),
        ));
        let state = Arc::new(ServerState {
            queue: MatchmakingQueue::new(games.clone()),
            router: NotificationRouter::new(games.clone(), directory),
            games,
            codec: JsonCodec,
            handshake_timeout: self.config.handshake_timeout,
        });

        Ok(BattlewordServer { transport, state })
    }
}

impl Default for BattlewordServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Battleword server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BattlewordServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl BattlewordServer {
    /// Creates a new builder.
    pub fn builder() -> BattlewordServerBuilder {
        BattlewordServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The game sessions this server drives.
    pub fn games(&self) -> Arc<GameService> {
        Arc::clone(&self.state.games)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming streams and spawns a task for each. The task runs
    /// the WebSocket upgrade under the handshake timeout, then the handler.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), BattlewordError> {
        tracing::info!("Battleword server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let upgrade = tokio::time::timeout(
                            state.handshake_timeout,
                            pending.complete(),
                        );
                        let conn = match upgrade.await {
                            Ok(Ok(conn)) => conn,
                            Ok(Err(e)) => {
                                tracing::debug!(%peer, error = %e, "upgrade failed");
                                return;
                            }
                            Err(_) => {
                                tracing::debug!(%peer, "upgrade timed out");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
