//! Credential objects passed explicitly into each collaborator.
//!
//! Nothing here reads ambient process state; the session owner builds these
//! and injects them.

use crate::error::Result;
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Cookie carrying the anti-forgery token.
pub const XSRF_COOKIE_NAME: &str = "XSRF-TOKEN";

/// Header the anti-forgery token is echoed back in.
pub const CSRF_HEADER_NAME: &str = "X-CSRF-Token";

/// Per-session anti-forgery value.
///
/// An absent cookie yields an empty token; the server decides whether that
/// is acceptable.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AntiForgeryToken(String);

impl AntiForgeryToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Extract `XSRF-TOKEN` from a `Cookie` header value (`a=1; XSRF-TOKEN=x`).
    pub fn from_cookie_header(cookie: &str) -> Self {
        cookie
            .split(';')
            .map(str::trim)
            .find_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                (name == XSRF_COOKIE_NAME).then(|| Self(value.to_string()))
            })
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AntiForgeryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AntiForgeryToken")
            .field(&if self.0.is_empty() { "<empty>" } else { "<redacted>" })
            .finish()
    }
}

/// Session credentials for the REST endpoints: cookie jar + anti-forgery token.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    /// Raw `Cookie` header value, if any.
    pub cookie: Option<String>,
    pub anti_forgery: AntiForgeryToken,
}

impl SessionCredentials {
    /// Build from a `Cookie` header value; the anti-forgery token is read from it.
    pub fn from_cookie_header(cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        let anti_forgery = AntiForgeryToken::from_cookie_header(&cookie);
        Self {
            cookie: (!cookie.trim().is_empty()).then_some(cookie),
            anti_forgery,
        }
    }
}

/// Bearer credential for the checkout endpoint.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read the token from local persistent storage.
    ///
    /// A missing or blank file means "not signed in" and yields `None`.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let mut raw = std::fs::read_to_string(path)?;
        let token = raw.trim();
        let result = (!token.is_empty()).then(|| Self(token.to_string()));
        raw.zeroize();
        Ok(result)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Short-lived stream credential.
///
/// Deliberately not `Clone`: a token is fetched for one connection attempt and
/// consumed by it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct StreamToken(String);

impl StreamToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for StreamToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamToken(<redacted>)")
    }
}
