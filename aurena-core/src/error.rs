//! Error types for the controller core

use thiserror::Error;

/// Errors surfaced by the controller session and its transports
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("event streams are not supported for scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("server rejected request: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, ControlError>;
