//! Trait seams for the snapshot fetcher and the token gateway.
//!
//! The dashboard session and the streaming client depend on these traits
//! rather than on `ApiClient`, so both can be driven by
//! [`MockGateway`] in tests.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cpred_core::{MarketRecord, StreamToken};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::client::ApiClient;
use crate::error::{FetchError, TokenError};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One-shot snapshot source (`GET /api/market-data`).
pub trait SnapshotFetcher: Send + Sync {
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<Vec<MarketRecord>, FetchError>>;
}

/// Issues stream tokens (`GET /api/ws-token`).
pub trait TokenGateway: Send + Sync {
    fn request_stream_token(&self) -> BoxFuture<'_, Result<StreamToken, TokenError>>;
}

impl SnapshotFetcher for ApiClient {
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<Vec<MarketRecord>, FetchError>> {
        Box::pin(self.get_market_data())
    }
}

impl TokenGateway for ApiClient {
    fn request_stream_token(&self) -> BoxFuture<'_, Result<StreamToken, TokenError>> {
        Box::pin(self.get_ws_token())
    }
}

/// Arc wrappers for trait objects.
pub type DynSnapshotFetcher = Arc<dyn SnapshotFetcher>;
pub type DynTokenGateway = Arc<dyn TokenGateway>;

/// Scripted gateway for testing.
///
/// Token requests pop scripted results and fall back to issuing
/// `token-<n>`; snapshot fetches pop scripted results and fall back to an
/// empty snapshot. Fetches can be held open to simulate in-flight requests.
#[derive(Debug)]
pub struct MockGateway {
    snapshots: Mutex<VecDeque<Result<Vec<MarketRecord>, FetchError>>>,
    tokens: Mutex<VecDeque<Result<String, TokenError>>>,
    fetch_calls: AtomicUsize,
    token_calls: AtomicUsize,
    issued: Mutex<Vec<String>>,
    fetch_gate: watch::Sender<bool>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create a mock whose fetches complete immediately.
    pub fn new() -> Self {
        let (fetch_gate, _) = watch::channel(true);
        Self {
            snapshots: Mutex::new(VecDeque::new()),
            tokens: Mutex::new(VecDeque::new()),
            fetch_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
            issued: Mutex::new(Vec::new()),
            fetch_gate,
        }
    }

    /// Queue the result of the next snapshot fetch.
    pub fn push_snapshot(&self, result: Result<Vec<MarketRecord>, FetchError>) {
        self.snapshots.lock().push_back(result);
    }

    /// Queue the result of the next token request.
    pub fn push_token(&self, result: Result<String, TokenError>) {
        self.tokens.lock().push_back(result);
    }

    /// Block snapshot fetches until [`MockGateway::release_fetches`].
    pub fn hold_fetches(&self) {
        self.fetch_gate.send_replace(false);
    }

    pub fn release_fetches(&self) {
        self.fetch_gate.send_replace(true);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    /// Token values handed out so far, in order.
    pub fn issued_tokens(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

impl SnapshotFetcher for MockGateway {
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<Vec<MarketRecord>, FetchError>> {
        Box::pin(async move {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let mut gate = self.fetch_gate.subscribe();
            // Sender lives in self, so wait_for can only fail after drop.
            let _ = gate.wait_for(|open| *open).await;
            self.snapshots.lock().pop_front().unwrap_or(Ok(Vec::new()))
        })
    }
}

impl TokenGateway for MockGateway {
    fn request_stream_token(&self) -> BoxFuture<'_, Result<StreamToken, TokenError>> {
        Box::pin(async move {
            let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let next = self
                .tokens
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(format!("token-{n}")));
            next.map(|token| {
                self.issued.lock().push(token.clone());
                StreamToken::new(token)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_issues_fresh_tokens() {
        let gateway = MockGateway::new();
        let first = gateway.request_stream_token().await.unwrap();
        let second = gateway.request_stream_token().await.unwrap();
        assert_eq!(first.expose(), "token-1");
        assert_eq!(second.expose(), "token-2");
        assert_eq!(gateway.token_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_scripted_token_failure() {
        let gateway = MockGateway::new();
        gateway.push_token(Err(TokenError::Rejected {
            status: 401,
            body: "expired".to_string(),
        }));
        let err = gateway.request_stream_token().await.unwrap_err();
        assert!(err.is_auth_rejection());
        assert!(gateway.issued_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_mock_held_fetch_waits_for_release() {
        let gateway = Arc::new(MockGateway::new());
        gateway.hold_fetches();

        let fetching = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.fetch_snapshot().await })
        };
        tokio::task::yield_now().await;
        assert!(!fetching.is_finished());

        gateway.release_fetches();
        let result = fetching.await.unwrap();
        assert!(result.unwrap().is_empty());
    }
}
