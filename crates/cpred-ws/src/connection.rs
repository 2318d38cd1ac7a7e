//! Streaming client.
//!
//! Drives the negotiate → connect → receive → reconnect cycle. Every
//! disconnect, whatever its cause, leads to the same fixed-delay retry with a
//! freshly requested token. Only an explicit shutdown stops the loop.

use crate::timer::{DynReconnectTimer, TokioTimer};
use crate::transport::{DynStreamTransport, StreamConnection};
use cpred_api::DynTokenGateway;
use cpred_core::{SnapshotSource, StreamPayload, ViewStateStore};
use cpred_telemetry::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay between a disconnect and the next negotiation.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Streaming client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream URL (`ws://` or `wss://`).
    pub url: String,
    /// Fixed reconnect delay. No backoff, no jitter.
    pub reconnect_delay: Duration,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

/// Streaming client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Negotiating,
    Connecting,
    Connected,
    Disconnected,
    Stopped,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Negotiating => "negotiating",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one negotiate/connect/receive attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptEnd {
    Token,
    Connect,
    Transport,
    Closed,
    Shutdown,
}

impl AttemptEnd {
    fn reason(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Connect => "connect",
            Self::Transport => "transport",
            Self::Closed => "closed",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Keeps a [`ViewStateStore`] fed from the streaming endpoint.
pub struct StreamingClient {
    config: StreamConfig,
    gateway: DynTokenGateway,
    transport: DynStreamTransport,
    timer: DynReconnectTimer,
    store: Arc<ViewStateStore>,
    state_tx: watch::Sender<StreamState>,
    disconnects: AtomicU64,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl StreamingClient {
    /// Create a client using real-time reconnect delays.
    pub fn new(
        config: StreamConfig,
        gateway: DynTokenGateway,
        transport: DynStreamTransport,
        store: Arc<ViewStateStore>,
    ) -> Self {
        let (state_tx, _) = watch::channel(StreamState::Idle);
        Self {
            config,
            gateway,
            transport,
            timer: Arc::new(TokioTimer),
            store,
            state_tx,
            disconnects: AtomicU64::new(0),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Replace the reconnect timer.
    pub fn with_timer(mut self, timer: DynReconnectTimer) -> Self {
        self.timer = timer;
        self
    }

    /// Share a cancellation token with the owner (e.g. a session teardown).
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        *self.state_tx.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    /// Number of times a connection attempt ended and a retry was scheduled.
    pub fn disconnect_count(&self) -> u64 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Request graceful shutdown.
    ///
    /// Closes any open connection, cancels a pending retry and makes
    /// [`StreamingClient::run`] return.
    pub fn shutdown(&self) {
        info!("Streaming client shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Run until shutdown.
    pub async fn run(&self) {
        info!(
            url = %self.config.url,
            reconnect_delay = ?self.config.reconnect_delay,
            "Streaming client started"
        );

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            let end = self.attempt().await;
            if end == AttemptEnd::Shutdown {
                break;
            }

            self.set_state(StreamState::Disconnected);
            let attempt = self.disconnects.fetch_add(1, Ordering::SeqCst) + 1;
            Metrics::stream_reconnect(end.reason());
            warn!(
                reason = end.reason(),
                attempt,
                delay = ?self.config.reconnect_delay,
                "Stream disconnected, retrying after delay"
            );

            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during reconnect delay");
                    break;
                }
                () = self.timer.sleep(self.config.reconnect_delay) => {}
            }
        }

        self.set_state(StreamState::Stopped);
        info!("Streaming client stopped");
    }

    async fn attempt(&self) -> AttemptEnd {
        self.set_state(StreamState::Negotiating);
        let token = tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => return AttemptEnd::Shutdown,
            result = self.gateway.request_stream_token() => result,
        };
        let token = match token {
            Ok(token) => token,
            Err(e) => {
                Metrics::token_failure();
                warn!(error = %e, auth_rejected = e.is_auth_rejection(), "Stream token request failed");
                return AttemptEnd::Token;
            }
        };

        self.set_state(StreamState::Connecting);
        debug!(url = %self.config.url, "Opening stream connection");
        let connected = tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => return AttemptEnd::Shutdown,
            result = self.transport.connect(self.config.url.clone(), token) => result,
        };
        let conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Stream connection failed");
                return AttemptEnd::Connect;
            }
        };

        self.set_state(StreamState::Connected);
        info!(url = %self.config.url, "Stream connected");
        self.receive(conn).await
    }

    async fn receive(&self, mut conn: Box<dyn StreamConnection>) -> AttemptEnd {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => None,
                frame = conn.next_text() => Some(frame),
            };

            match frame {
                None => {
                    info!("Shutdown signal received, closing stream connection");
                    conn.close().await;
                    return AttemptEnd::Shutdown;
                }
                Some(Some(Ok(text))) => self.handle_message(&text),
                Some(Some(Err(e))) if e.is_parse() => {
                    Metrics::stream_parse_failure();
                    warn!(error = %e, "Discarding undecodable stream frame");
                }
                Some(Some(Err(e))) => {
                    warn!(error = %e, "Stream transport error");
                    return AttemptEnd::Transport;
                }
                Some(None) => {
                    info!("Stream closed by peer");
                    return AttemptEnd::Closed;
                }
            }
        }
    }

    fn handle_message(&self, text: &str) {
        match StreamPayload::parse(text) {
            Ok(payload) => {
                let records = payload.into_records();
                let count = records.len();
                if self.store.apply_snapshot(SnapshotSource::Stream, records) {
                    Metrics::snapshot_applied(SnapshotSource::Stream.as_str());
                    debug!(records = count, "Stream snapshot applied");
                }
            }
            Err(e) => {
                Metrics::stream_parse_failure();
                warn!(error = %e, len = text.len(), "Discarding malformed stream message");
            }
        }
    }

    fn set_state(&self, state: StreamState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Stream state transition");
            Metrics::stream_state_set(state.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualTimer;
    use crate::transport::{MockFrame, MockTransport};
    use cpred_api::{MockGateway, TokenError};
    use cpred_core::{MarketRecord, Price, Volume};
    use rust_decimal_macros::dec;
    use tokio::task::JoinHandle;

    const WAIT: Duration = Duration::from_secs(2);

    struct Harness {
        gateway: Arc<MockGateway>,
        transport: Arc<MockTransport>,
        timer: Arc<ManualTimer>,
        store: Arc<ViewStateStore>,
        client: Arc<StreamingClient>,
        task: JoinHandle<()>,
    }

    fn start(gateway: MockGateway, transport: MockTransport) -> Harness {
        let gateway = Arc::new(gateway);
        let transport = Arc::new(transport);
        let timer = Arc::new(ManualTimer::new());
        let store = Arc::new(ViewStateStore::new());
        let client = Arc::new(
            StreamingClient::new(
                StreamConfig::new("ws://mock/ws"),
                gateway.clone(),
                transport.clone(),
                store.clone(),
            )
            .with_timer(timer.clone()),
        );
        let task = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };
        Harness {
            gateway,
            transport,
            timer,
            store,
            client,
            task,
        }
    }

    async fn wait_state(client: &StreamingClient, state: StreamState) {
        let mut rx = client.subscribe_state();
        tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for state")
            .unwrap();
    }

    async fn wait_revision(store: &ViewStateStore, revision: u64) {
        let mut rx = store.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|v| v.revision() >= revision))
            .await
            .expect("timed out waiting for view state")
            .unwrap();
    }

    fn btc() -> MarketRecord {
        MarketRecord::new(
            "BTC",
            Price::new(dec!(50000)),
            Volume::new(dec!(1000)),
            2.5,
            0.91,
        )
    }

    #[test]
    fn test_default_config() {
        let config = StreamConfig::new("wss://example.com/ws");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_stream_message_replaces_view_state() {
        let h = start(MockGateway::new(), MockTransport::new());
        h.store.apply_snapshot(SnapshotSource::Fetch, vec![btc()]);

        let peer = h.transport.accept().await.unwrap();
        assert_eq!(peer.token(), "token-1");
        peer.send_text(r#"{"data":[]}"#);

        wait_revision(&h.store, 2).await;
        assert!(h.store.current().records().is_empty());
        assert!(!h.store.current().is_loading());

        peer.send_text(
            r#"{"data":[{"symbol":"ETH","price":3000,"volume":10,"change_24h":-1.0,"score":0.4}]}"#,
        );
        wait_revision(&h.store, 3).await;
        let state = h.store.current();
        assert_eq!(state.records().len(), 1);
        assert_eq!(state.records()[0].symbol, "ETH");

        h.client.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_message_keeps_connection() {
        let h = start(MockGateway::new(), MockTransport::new());
        let peer = h.transport.accept().await.unwrap();
        wait_state(&h.client, StreamState::Connected).await;

        peer.send_text("not json");
        peer.send_text(r#"{"data":[{"symbol":"BTC","price":-1,"volume":1,"change_24h":0,"score":0}]}"#);
        peer.send(MockFrame::Garbage);
        peer.send_text(
            r#"{"data":[{"symbol":"BTC","price":50000,"volume":1000,"change_24h":2.5,"score":0.91}]}"#,
        );

        wait_revision(&h.store, 1).await;
        assert_eq!(h.store.current().revision(), 1);
        assert_eq!(h.store.current().records(), &[btc()]);
        assert_eq!(h.client.state(), StreamState::Connected);
        assert_eq!(h.transport.connect_calls(), 1);
        assert_eq!(h.timer.requested(), 0);

        h.client.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_token_failure_never_connects() {
        let gateway = MockGateway::new();
        gateway.push_token(Err(TokenError::Unreachable("gateway down".to_string())));
        let h = start(gateway, MockTransport::new());

        let pending = tokio::time::timeout(WAIT, h.timer.next_sleep())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.delay(), DEFAULT_RECONNECT_DELAY);
        assert_eq!(h.client.state(), StreamState::Disconnected);
        assert_eq!(h.transport.connect_calls(), 0);

        assert!(pending.fire());
        let peer = h.transport.accept().await.unwrap();
        assert_eq!(peer.token(), "token-2");
        assert_eq!(h.gateway.token_calls(), 2);

        h.client.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_normal_and_abnormal_close_retry_identically() {
        let h = start(MockGateway::new(), MockTransport::new());

        // Normal close from the server.
        let peer = h.transport.accept().await.unwrap();
        peer.close();
        let first = h.timer.next_sleep().await.unwrap();
        assert_eq!(h.client.state(), StreamState::Disconnected);
        let first_delay = first.delay();

        assert!(first.fire());

        // Transport failure on the next connection.
        let peer = h.transport.accept().await.unwrap();
        peer.send(MockFrame::Error("connection reset".to_string()));
        let second = h.timer.next_sleep().await.unwrap();
        assert_eq!(h.client.state(), StreamState::Disconnected);

        assert_eq!(first_delay, second.delay());
        assert_eq!(h.client.disconnect_count(), 2);
        assert_eq!(h.gateway.token_calls(), 2);

        h.client.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_single_pending_retry() {
        let h = start(MockGateway::new(), MockTransport::new());
        let peer = h.transport.accept().await.unwrap();
        peer.close();

        let pending = h.timer.next_sleep().await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.timer.requested(), 1);
        assert!(h.timer.try_next_sleep().is_none());
        assert_eq!(h.gateway.token_calls(), 1);
        assert_eq!(h.transport.connect_calls(), 1);

        assert!(pending.fire());
        h.transport.accept().await.unwrap();
        assert_eq!(h.gateway.token_calls(), 2);

        h.client.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_full_delay_in_real_time() {
        let gateway = Arc::new(MockGateway::new());
        let transport = Arc::new(MockTransport::new());
        let client = Arc::new(StreamingClient::new(
            StreamConfig::new("ws://mock/ws"),
            gateway.clone(),
            transport.clone(),
            Arc::new(ViewStateStore::new()),
        ));
        let task = {
            let client = client.clone();
            tokio::spawn(async move { client.run().await })
        };

        transport.accept().await.unwrap().close();
        wait_state(&client, StreamState::Disconnected).await;
        let disconnected_at = tokio::time::Instant::now();

        tokio::time::sleep(Duration::from_millis(4_999)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gateway.token_calls(), 1);
        assert_eq!(transport.connect_calls(), 1);

        transport.accept().await.unwrap();
        assert!(disconnected_at.elapsed() >= DEFAULT_RECONNECT_DELAY);
        assert_eq!(gateway.token_calls(), 2);

        client.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_fresh_token_per_attempt() {
        let h = start(MockGateway::new(), MockTransport::new());

        for expected in ["token-1", "token-2", "token-3"] {
            let peer = h.transport.accept().await.unwrap();
            assert_eq!(peer.token(), expected);
            peer.close();
            h.timer.next_sleep().await.unwrap().fire();
        }
        h.transport.accept().await.unwrap();

        assert_eq!(
            h.gateway.issued_tokens(),
            vec!["token-1", "token-2", "token-3", "token-4"]
        );

        h.client.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_schedules_retry() {
        let transport = MockTransport::new();
        transport.fail_next_connect("refused");
        let h = start(MockGateway::new(), transport);

        h.timer.next_sleep().await.unwrap().fire();
        h.transport.accept().await.unwrap();

        assert_eq!(h.transport.connect_calls(), 2);
        assert_eq!(h.transport.urls(), vec!["ws://mock/ws", "ws://mock/ws"]);

        h.client.shutdown();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_retry() {
        let h = start(MockGateway::new(), MockTransport::new());
        h.transport.accept().await.unwrap().close();
        let pending = h.timer.next_sleep().await.unwrap();

        h.client.shutdown();
        h.task.await.unwrap();

        assert!(pending.is_cancelled());
        assert!(!pending.fire());
        assert_eq!(h.client.state(), StreamState::Stopped);
        assert_eq!(h.gateway.token_calls(), 1);
        assert_eq!(h.transport.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_open_connection() {
        let h = start(MockGateway::new(), MockTransport::new());
        let peer = h.transport.accept().await.unwrap();
        wait_state(&h.client, StreamState::Connected).await;

        h.client.shutdown();
        h.task.await.unwrap();

        assert!(peer.closed_by_client());
        assert!(!peer.send_text(r#"{"data":[]}"#));
        assert_eq!(h.store.current().revision(), 0);
        assert_eq!(h.client.state(), StreamState::Stopped);
        assert_eq!(h.timer.requested(), 0);
    }

    #[tokio::test]
    async fn test_closed_store_discards_stream_writes() {
        let h = start(MockGateway::new(), MockTransport::new());
        let peer = h.transport.accept().await.unwrap();
        h.store.close();

        peer.send_text(r#"{"data":[]}"#);
        peer.close();
        h.timer.next_sleep().await.unwrap();

        assert_eq!(h.store.current().revision(), 0);
        assert!(h.store.current().is_loading());

        h.client.shutdown();
        h.task.await.unwrap();
    }
}
