//! Feed status indicator.

use cpred_core::ViewState;
use cpred_ws::StreamState;
use serde::Serialize;
use std::fmt;

/// What the dashboard tells the user about its data, separate from the
/// loading skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// Nothing has arrived from either source yet.
    Loading,
    /// Stream connected.
    Live,
    /// Showing the last snapshot while the stream reconnects.
    Reconnecting,
    /// Initial fetch failed and the stream is not connected: nothing to show.
    Unavailable,
    /// Session torn down.
    Stopped,
}

impl FeedStatus {
    pub fn derive(stream: StreamState, view: &ViewState) -> Self {
        match stream {
            StreamState::Stopped => Self::Stopped,
            StreamState::Connected => Self::Live,
            _ if view.is_loading() => Self::Loading,
            _ if view.revision() > 0 => Self::Reconnecting,
            _ => Self::Unavailable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Live => "live",
            Self::Reconnecting => "reconnecting",
            Self::Unavailable => "unavailable",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpred_core::{SnapshotSource, ViewStateStore};

    #[test]
    fn test_status_before_any_data() {
        let view = ViewState::new();
        assert_eq!(FeedStatus::derive(StreamState::Idle, &view), FeedStatus::Loading);
        assert_eq!(
            FeedStatus::derive(StreamState::Disconnected, &view),
            FeedStatus::Loading
        );
        assert_eq!(FeedStatus::derive(StreamState::Connected, &view), FeedStatus::Live);
    }

    #[test]
    fn test_status_after_fetch_failure() {
        let store = ViewStateStore::new();
        store.mark_fetch_failed();
        let view = store.current();

        assert_eq!(
            FeedStatus::derive(StreamState::Disconnected, &view),
            FeedStatus::Unavailable
        );
        assert_eq!(FeedStatus::derive(StreamState::Connected, &view), FeedStatus::Live);
    }

    #[test]
    fn test_status_with_stale_data() {
        let store = ViewStateStore::new();
        store.apply_snapshot(SnapshotSource::Fetch, Vec::new());
        let view = store.current();

        assert_eq!(
            FeedStatus::derive(StreamState::Negotiating, &view),
            FeedStatus::Reconnecting
        );
        assert_eq!(FeedStatus::derive(StreamState::Stopped, &view), FeedStatus::Stopped);
    }
}
