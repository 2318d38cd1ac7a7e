//! Feed summary logged when a dashboard session ends.

use crate::metrics::{
    FETCH_FAILURES_TOTAL, SNAPSHOTS_APPLIED_TOTAL, STREAM_PARSE_FAILURES_TOTAL,
    STREAM_RECONNECT_TOTAL, TOKEN_FAILURES_TOTAL,
};
use tracing::info;

const RECONNECT_REASONS: [&str; 4] = ["token", "connect", "transport", "closed"];

/// Process-wide feed counters at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub fetch_snapshots: u64,
    pub stream_snapshots: u64,
    pub parse_failures: u64,
    pub fetch_failures: u64,
    pub token_failures: u64,
    pub reconnects: u64,
}

impl FeedSummary {
    /// Read the current counter values.
    pub fn collect() -> Self {
        Self {
            fetch_snapshots: SNAPSHOTS_APPLIED_TOTAL.with_label_values(&["fetch"]).get(),
            stream_snapshots: SNAPSHOTS_APPLIED_TOTAL.with_label_values(&["stream"]).get(),
            parse_failures: STREAM_PARSE_FAILURES_TOTAL.get(),
            fetch_failures: FETCH_FAILURES_TOTAL.get(),
            token_failures: TOKEN_FAILURES_TOTAL.get(),
            reconnects: RECONNECT_REASONS
                .iter()
                .map(|r| STREAM_RECONNECT_TOTAL.with_label_values(&[r]).get())
                .sum(),
        }
    }

    pub fn log(&self) {
        info!(
            fetch_snapshots = self.fetch_snapshots,
            stream_snapshots = self.stream_snapshots,
            parse_failures = self.parse_failures,
            fetch_failures = self.fetch_failures,
            token_failures = self.token_failures,
            reconnects = self.reconnects,
            "Feed summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metrics;

    #[test]
    fn test_collect_reflects_counters() {
        let before = FeedSummary::collect();
        Metrics::stream_parse_failure();
        Metrics::stream_reconnect("token");
        let after = FeedSummary::collect();

        assert!(after.parse_failures > before.parse_failures);
        assert!(after.reconnects > before.reconnects);
    }
}
