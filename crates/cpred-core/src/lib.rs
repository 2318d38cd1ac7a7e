//! Core domain types for the crypto predictor live feed.
//!
//! This crate provides the types shared by every other crate:
//! - `MarketRecord`, `StreamPayload`: snapshot rows and the stream envelope
//! - `Price`, `Volume`: precision-safe numeric types
//! - `ViewState`, `ViewStateStore`: the dashboard's replace-only state
//! - `SessionCredentials`, `BearerToken`, `StreamToken`: explicit credentials
//! - `Origin`: backend origin and derived endpoint URLs

pub mod credentials;
pub mod decimal;
pub mod endpoint;
pub mod error;
pub mod market;
pub mod view_state;

pub use credentials::{
    AntiForgeryToken, BearerToken, SessionCredentials, StreamToken, CSRF_HEADER_NAME,
    XSRF_COOKIE_NAME,
};
pub use decimal::{Price, Volume};
pub use endpoint::{validate_stream_url, Origin};
pub use error::{CoreError, Result};
pub use market::{parse_snapshot, validate_snapshot, MarketRecord, StreamPayload};
pub use view_state::{SnapshotSource, ViewState, ViewStateStore};
