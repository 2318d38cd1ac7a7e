//! Prometheus metrics and structured logging for the crypto predictor feed.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters for the snapshot fetch and the streaming feed
//! - A feed summary logged when a session ends

pub mod error;
pub mod logging;
pub mod metrics;
pub mod summary;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use summary::FeedSummary;
