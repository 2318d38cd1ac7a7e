//! API error types.
//!
//! One enum per endpoint family so callers can tell a failed snapshot fetch
//! from a refused stream token or a blocked checkout.

use thiserror::Error;

/// Client construction errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Snapshot fetch failure. Never fatal; the session logs it and moves on.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed snapshot: {0}")]
    Malformed(String),
}

/// Stream token request failure. The streaming client must not connect.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("Token gateway unreachable: {0}")]
    Unreachable(String),

    #[error("Token request rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    Malformed(String),
}

impl TokenError {
    /// 401/403 from the gateway, typically an expired session.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status == 401 || *status == 403)
    }
}

/// Checkout initiation failure, surfaced to the caller.
#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Not signed in: no bearer credential available")]
    MissingCredential,

    #[error("Invalid subscription tier: {0:?}")]
    InvalidTier(String),

    #[error("HTTP request failed: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed checkout response: {0}")]
    Malformed(String),
}
