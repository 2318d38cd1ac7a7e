//! Stream error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    /// Inbound payload could not be parsed. The connection stays up.
    #[error("Message parse error: {0}")]
    Parse(String),

    /// Connection-level failure. Ends the current connection.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

impl WsError {
    /// Whether this error concerns a single message rather than the connection.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

pub type WsResult<T> = Result<T, WsError>;
