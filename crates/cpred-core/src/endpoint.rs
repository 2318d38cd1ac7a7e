//! Backend origin and the endpoints derived from it.

use crate::error::{CoreError, Result};
use std::fmt;
use url::Url;

pub const MARKET_DATA_PATH: &str = "/api/market-data";
pub const WS_TOKEN_PATH: &str = "/api/ws-token";
pub const CHECKOUT_SESSION_PATH: &str = "/api/create-checkout-session";
pub const STREAM_PATH: &str = "/ws";

/// Scheme + host[:port] of the backend, e.g. `https://app.example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    url: Url,
}

impl Origin {
    /// Parse `http://host[:port]` or `https://host[:port]`. A trailing slash is
    /// tolerated; paths, queries, fragments and userinfo are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|e| CoreError::InvalidOrigin(format!("{raw}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::InvalidOrigin(format!(
                "{raw}: scheme must be http or https"
            )));
        }
        if url.host_str().map_or(true, str::is_empty)
            || url.path() != "/"
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
            || url.password().is_some()
        {
            return Err(CoreError::InvalidOrigin(format!(
                "{raw}: expected scheme://host[:port]"
            )));
        }

        Ok(Self { url })
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// HTTP URL for a REST path.
    pub fn http_url(&self, path: &str) -> String {
        let mut url = self.url.clone();
        url.set_path(path);
        url.into()
    }

    /// Stream URL; the scheme mirrors the origin (`https` -> `wss`).
    pub fn stream_url(&self) -> String {
        let mut url = self.url.clone();
        let scheme = if self.is_secure() { "wss" } else { "ws" };
        // http(s) -> ws(s) stays within the special schemes, which url allows.
        let _ = url.set_scheme(scheme);
        url.set_path(STREAM_PATH);
        url.into()
    }

    pub fn market_data_url(&self) -> String {
        self.http_url(MARKET_DATA_PATH)
    }

    pub fn ws_token_url(&self) -> String {
        self.http_url(WS_TOKEN_PATH)
    }

    pub fn checkout_session_url(&self) -> String {
        self.http_url(CHECKOUT_SESSION_PATH)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url.origin().ascii_serialization())
    }
}

/// Check an explicit stream URL: `ws://` or `wss://` with a host and no fragment.
pub fn validate_stream_url(raw: &str) -> Result<Url> {
    let url =
        Url::parse(raw.trim()).map_err(|e| CoreError::InvalidStreamUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(CoreError::InvalidStreamUrl(format!(
            "{raw}: scheme must be ws or wss"
        )));
    }
    if url.host_str().map_or(true, str::is_empty) || url.fragment().is_some() {
        return Err(CoreError::InvalidStreamUrl(format!(
            "{raw}: expected ws[s]://host[:port]/path"
        )));
    }
    Ok(url)
}
