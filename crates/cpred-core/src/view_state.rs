//! Dashboard view state and its single-owner store.
//!
//! Every write replaces `records` wholesale; there is no merge path. Readers
//! subscribe through a `watch` channel and always observe a complete value.

use crate::MarketRecord;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotSource {
    /// One-shot REST fetch.
    Fetch,
    /// Streaming feed message.
    Stream,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Stream => "stream",
        }
    }
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current market records as the dashboard sees them.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    records: Vec<MarketRecord>,
    loading: bool,
    revision: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    /// Empty and loading.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            loading: true,
            revision: 0,
            updated_at: None,
        }
    }

    /// Records in arrival order.
    pub fn records(&self) -> &[MarketRecord] {
        &self.records
    }

    /// True until the first snapshot (or the first fetch failure) lands.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Number of snapshots applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// First `n` records, used for the headline cards.
    pub fn headline(&self, n: usize) -> &[MarketRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// `(symbol, score)` pairs in record order, used for the trend chart.
    pub fn score_series(&self) -> Vec<(&str, f64)> {
        self.records
            .iter()
            .map(|r| (r.symbol.as_str(), r.score))
            .collect()
    }
}

/// Owner of a session's `ViewState`.
///
/// After [`ViewStateStore::close`] every write is discarded, so late results
/// from in-flight work can't mutate a torn-down session.
pub struct ViewStateStore {
    tx: watch::Sender<ViewState>,
    closed: AtomicBool,
}

impl Default for ViewStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ViewState::new());
        Self {
            tx,
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the records with a full snapshot.
    ///
    /// Returns `false` if the store is closed and the write was dropped.
    pub fn apply_snapshot(&self, source: SnapshotSource, records: Vec<MarketRecord>) -> bool {
        // The closed check runs under the channel's write lock, serialised with close().
        let applied = self.tx.send_if_modified(|state| {
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            state.records = records;
            state.loading = false;
            state.revision += 1;
            state.updated_at = Some(Utc::now());
            true
        });

        if applied {
            tracing::debug!(%source, "Snapshot applied to view state");
        } else {
            tracing::debug!(%source, "View state closed, snapshot discarded");
        }
        applied
    }

    /// Record that the initial fetch failed: leave the records alone and stop
    /// showing the loading skeleton.
    pub fn mark_fetch_failed(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if self.closed.load(Ordering::Acquire) || !state.loading {
                return false;
            }
            state.loading = false;
            true
        })
    }

    /// Clone of the current value.
    pub fn current(&self) -> ViewState {
        self.tx.borrow().clone()
    }

    /// Receiver that is notified on every applied write.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.tx.subscribe()
    }

    /// Stop accepting writes. Idempotent.
    pub fn close(&self) {
        self.tx.send_if_modified(|_| {
            self.closed.store(true, Ordering::Release);
            false
        });
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
