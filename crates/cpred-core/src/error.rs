//! Error types for cpred-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid record {symbol}: {reason}")]
    InvalidRecord { symbol: String, reason: String },

    #[error("Duplicate symbol in snapshot: {0}")]
    DuplicateSymbol(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Invalid stream URL: {0}")]
    InvalidStreamUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
