//! Error types for the daemon.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the daemon.
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors (sockets, files, threads).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid startup or runtime configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A font file could not be parsed.
    #[error("Font error: {0}")]
    Font(String),

    /// The persisted token record does not exist.
    #[error("Token file not found at {0}; authenticate before starting the listener")]
    MissingToken(PathBuf),

    /// Authentication with the event provider failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The configured channel could not be resolved.
    #[error("Could not find channel: {0}")]
    ChannelNotFound(String),

    /// HTTP errors from the provider API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket errors from the event stream.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Unexpected message shape from the event provider.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The control channel received a command it could not apply.
    #[error("Command error: {0}")]
    Command(#[from] crate::actor::CommandError),
}

impl Error {
    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a font error.
    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font(msg.into())
    }

    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether the operator has to re-authenticate out-of-band.
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::MissingToken(_) | Self::Auth(_))
    }
}
