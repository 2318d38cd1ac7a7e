//! Reconnect delay source.
//!
//! The reconnect delay goes through [`ReconnectTimer`] so tests can decide
//! exactly when a pending retry fires instead of waiting on real time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpred_api::BoxFuture;
use tokio::sync::{mpsc, oneshot, Mutex as TokioMutex};

/// Sleeps for the reconnect delay.
pub trait ReconnectTimer: Send + Sync {
    fn sleep(&self, delay: Duration) -> BoxFuture<'_, ()>;
}

/// Arc wrapper for ReconnectTimer trait objects.
pub type DynReconnectTimer = Arc<dyn ReconnectTimer>;

/// Real-time timer backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl ReconnectTimer for TokioTimer {
    fn sleep(&self, delay: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(delay))
    }
}

/// A sleep requested from a [`ManualTimer`], waiting to be fired.
#[derive(Debug)]
pub struct PendingSleep {
    delay: Duration,
    fire: oneshot::Sender<()>,
}

impl PendingSleep {
    /// Delay the client asked for.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether the sleeping side has gone away (e.g. cancelled on teardown).
    pub fn is_cancelled(&self) -> bool {
        self.fire.is_closed()
    }

    /// Let the sleep complete. Returns false if it was already cancelled.
    pub fn fire(self) -> bool {
        self.fire.send(()).is_ok()
    }
}

/// Test timer: every `sleep` call is handed out as a [`PendingSleep`] and
/// only completes when the test fires it.
#[derive(Debug)]
pub struct ManualTimer {
    requests_tx: mpsc::UnboundedSender<PendingSleep>,
    requests_rx: TokioMutex<mpsc::UnboundedReceiver<PendingSleep>>,
    requested: AtomicUsize,
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTimer {
    pub fn new() -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        Self {
            requests_tx,
            requests_rx: TokioMutex::new(requests_rx),
            requested: AtomicUsize::new(0),
        }
    }

    /// Wait for the next sleep request.
    pub async fn next_sleep(&self) -> Option<PendingSleep> {
        self.requests_rx.lock().await.recv().await
    }

    /// Take a sleep request if one is already queued.
    pub fn try_next_sleep(&self) -> Option<PendingSleep> {
        self.requests_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Total sleeps requested so far.
    pub fn requested(&self) -> usize {
        self.requested.load(Ordering::SeqCst)
    }
}

impl ReconnectTimer for ManualTimer {
    fn sleep(&self, delay: Duration) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.requested.fetch_add(1, Ordering::SeqCst);
            let (fire, fired) = oneshot::channel();
            if self.requests_tx.send(PendingSleep { delay, fire }).is_err() {
                return std::future::pending().await;
            }
            if fired.await.is_err() {
                // Dropped without firing: this sleep never completes.
                std::future::pending::<()>().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_timer_fires_on_demand() {
        let timer = Arc::new(ManualTimer::new());
        let sleeping = {
            let timer = timer.clone();
            tokio::spawn(async move { timer.sleep(Duration::from_secs(5)).await })
        };

        let pending = timer.next_sleep().await.unwrap();
        assert_eq!(pending.delay(), Duration::from_secs(5));
        assert!(!sleeping.is_finished());

        assert!(pending.fire());
        sleeping.await.unwrap();
        assert_eq!(timer.requested(), 1);
    }

    #[tokio::test]
    async fn test_manual_timer_detects_cancelled_sleep() {
        let timer = Arc::new(ManualTimer::new());
        let sleeping = {
            let timer = timer.clone();
            tokio::spawn(async move { timer.sleep(Duration::from_secs(5)).await })
        };

        let pending = timer.next_sleep().await.unwrap();
        sleeping.abort();
        let _ = sleeping.await;

        assert!(pending.is_cancelled());
        assert!(!pending.fire());
    }

    #[tokio::test]
    async fn test_tokio_timer_waits_at_least_delay() {
        let start = tokio::time::Instant::now();
        TokioTimer.sleep(Duration::from_millis(30)).await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
