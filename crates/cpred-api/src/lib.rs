//! REST client for the crypto predictor backend.
//!
//! Covers the three request/response endpoints:
//! - `GET /api/market-data`: one-shot market snapshot
//! - `GET /api/ws-token`: short-lived stream token
//! - `POST /api/create-checkout-session`: subscription checkout
//!
//! The snapshot and token calls are also exposed through the
//! [`SnapshotFetcher`] and [`TokenGateway`] traits for injection.

pub mod checkout;
pub mod client;
pub mod error;
pub mod gateway;

pub use checkout::{
    CheckoutConfig, CheckoutInitiator, CheckoutRedirect, SubscriptionTier, DEFAULT_TIER,
};
pub use client::{ApiClient, DEFAULT_TIMEOUT};
pub use error::{ApiError, ApiResult, CheckoutError, FetchError, TokenError};
pub use gateway::{
    BoxFuture, DynSnapshotFetcher, DynTokenGateway, MockGateway, SnapshotFetcher, TokenGateway,
};
