//! Dashboard configuration.

use serde::{Deserialize, Serialize};

/// Dashboard session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Number of headline cards.
    #[serde(default = "default_headline_count")]
    pub headline_count: usize,
    /// Interval for the periodic status line in milliseconds (0 = only on change).
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
}

fn default_headline_count() -> usize {
    3
}

fn default_status_interval_ms() -> u64 {
    30_000
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            headline_count: default_headline_count(),
            status_interval_ms: default_status_interval_ms(),
        }
    }
}
