//! Prometheus metrics for the live feed.
//!
//! Covers:
//! - Stream connection state
//! - Reconnect attempts by reason
//! - Snapshots applied by source
//! - Fetch/token/parse failures
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a programming error that should crash at
//! first use rather than silently drop metrics.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Stream connection state (1 = connected, 0 = not).
pub static STREAM_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "cpred_stream_connected",
        "Stream connection state (1=connected)"
    )
    .unwrap()
});

/// Streaming client state machine current state.
/// Labels: state (idle/negotiating/connecting/connected/disconnected/stopped)
pub static STREAM_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "cpred_stream_state",
        "Streaming client current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Reconnect cycles by the reason the previous attempt ended.
/// Labels: reason (token/connect/transport/closed)
pub static STREAM_RECONNECT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "cpred_stream_reconnect_total",
        "Total stream reconnect cycles",
        &["reason"]
    )
    .unwrap()
});

/// Snapshots written to the view state.
/// Labels: source (fetch/stream)
pub static SNAPSHOTS_APPLIED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "cpred_snapshots_applied_total",
        "Snapshots applied to the view state",
        &["source"]
    )
    .unwrap()
});

/// Stream messages discarded as unparseable.
pub static STREAM_PARSE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "cpred_stream_parse_failures_total",
        "Stream messages discarded as malformed"
    )
    .unwrap()
});

/// Snapshot fetch failures.
pub static FETCH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "cpred_fetch_failures_total",
        "Snapshot fetch failures"
    )
    .unwrap()
});

/// Stream token request failures.
pub static TOKEN_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "cpred_token_failures_total",
        "Stream token request failures"
    )
    .unwrap()
});

const STREAM_STATES: [&str; 6] = [
    "idle",
    "negotiating",
    "connecting",
    "connected",
    "disconnected",
    "stopped",
];

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Set the streaming state. Only the active state is 1.
    pub fn stream_state_set(state: &str) {
        for s in STREAM_STATES {
            STREAM_STATE.with_label_values(&[s]).set(0);
        }
        STREAM_STATE.with_label_values(&[state]).set(1);
        STREAM_CONNECTED.set(i64::from(state == "connected"));
    }

    /// Record one reconnect cycle.
    pub fn stream_reconnect(reason: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a snapshot written to the view state.
    pub fn snapshot_applied(source: &str) {
        SNAPSHOTS_APPLIED_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn stream_parse_failure() {
        STREAM_PARSE_FAILURES_TOTAL.inc();
    }

    pub fn fetch_failure() {
        FETCH_FAILURES_TOTAL.inc();
    }

    pub fn token_failure() {
        TOKEN_FAILURES_TOTAL.inc();
    }

    /// Render the default registry in Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
