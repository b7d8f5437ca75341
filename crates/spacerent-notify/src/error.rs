//! Notification pipeline error types.

use thiserror::Error;

/// Notification pipeline error type.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("subscription error: {0}")]
    Subscription(String),

    #[error("timeout error: {0}")]
    Timeout(String),

    #[error("not connected")]
    NotConnected,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("alert error: {0}")]
    Alert(String),
}

/// Notification pipeline result type.
pub type Result<T> = std::result::Result<T, NotifyError>;
