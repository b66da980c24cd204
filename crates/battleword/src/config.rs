//! Server settings and their environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use battleword_game::WordList;

/// Full bind address, e.g. `0.0.0.0:9000`.
pub const BIND_VAR: &str = "BATTLEWORD_BIND";
/// Port only; binds all interfaces. Ignored when [`BIND_VAR`] is set.
pub const PORT_VAR: &str = "PORT";
/// Seconds a client has to send its first `join`.
pub const HANDSHAKE_TIMEOUT_VAR: &str = "BATTLEWORD_HANDSHAKE_TIMEOUT_SECS";
/// Path to a newline-separated word list.
pub const WORDS_VAR: &str = "BATTLEWORD_WORDS";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error("failed to read word list {path:?}: {source}")]
    WordList {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Settings for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Applies to the first message on the matchmaking and notification
    /// endpoints only. There is no turn timer.
    pub handshake_timeout: Duration,
    /// Solutions are drawn from here; empty means the fallback word.
    pub word_list: WordList,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(10),
            word_list: WordList::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(BIND_VAR) {
            config.bind_addr = addr;
        } else if let Some(port) = lookup(PORT_VAR) {
            let port: u16 = port.trim().parse().map_err(|_| {
                ConfigError::InvalidValue {
                    var: PORT_VAR,
                    value: port.clone(),
                }
            })?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(secs) = lookup(HANDSHAKE_TIMEOUT_VAR) {
            let parsed: u64 = secs.trim().parse().map_err(|_| {
                ConfigError::InvalidValue {
                    var: HANDSHAKE_TIMEOUT_VAR,
                    value: secs.clone(),
                }
            })?;
            config.handshake_timeout = Duration::from_secs(parsed);
        }

        if let Some(path) = lookup(WORDS_VAR) {
            let path = PathBuf::from(path);
            let text = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::WordList { path, source })?;
            config.word_list = WordList::parse(&text);
        }

        Ok(config)
    }
}
