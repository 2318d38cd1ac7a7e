//! Stream transport abstraction.
//!
//! The streaming client only needs "open a connection with this token" and
//! "give me the next text frame". The production transport is
//! tokio-tungstenite; [`MockTransport`] lets tests play the server side.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cpred_api::BoxFuture;
use cpred_core::StreamToken;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{WsError, WsResult};

/// Opens stream connections.
pub trait StreamTransport: Send + Sync {
    /// Connect to `url`, presenting `token` as the connection credential.
    ///
    /// The token is consumed: every attempt needs a fresh one.
    fn connect(
        &self,
        url: String,
        token: StreamToken,
    ) -> BoxFuture<'_, WsResult<Box<dyn StreamConnection>>>;
}

/// An open stream connection.
pub trait StreamConnection: Send {
    /// Next text payload.
    ///
    /// `None` means the peer closed the connection (normal or not).
    /// `Some(Err(e))` with `e.is_parse()` is a bad frame on a live connection;
    /// any other error ends the connection.
    fn next_text(&mut self) -> BoxFuture<'_, Option<WsResult<String>>>;

    /// Close from the client side.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Arc wrapper for StreamTransport trait objects.
pub type DynStreamTransport = Arc<dyn StreamTransport>;

// ============================================================================
// tokio-tungstenite transport
// ============================================================================

/// WebSocket transport.
///
/// The token travels as the `Sec-WebSocket-Protocol` value, the only
/// connection-level credential a browser client could send.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

impl StreamTransport for TungsteniteTransport {
    fn connect(
        &self,
        url: String,
        token: StreamToken,
    ) -> BoxFuture<'_, WsResult<Box<dyn StreamConnection>>> {
        Box::pin(async move {
            let mut request = url.as_str().into_client_request()?;
            let protocol = HeaderValue::from_str(token.expose()).map_err(|e| {
                WsError::ConnectionFailed(format!("Token is not a valid protocol value: {e}"))
            })?;
            request
                .headers_mut()
                .insert(SEC_WEBSOCKET_PROTOCOL, protocol);
            drop(token);

            // TCP_NODELAY: snapshots are small and latency-sensitive
            let (stream, _response) =
                connect_async_tls_with_config(request, None, true, None).await?;
            debug!(url = %url, "WebSocket handshake complete");

            Ok(Box::new(TungsteniteConnection { stream }) as Box<dyn StreamConnection>)
        })
    }
}

struct TungsteniteConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl StreamConnection for TungsteniteConnection {
    fn next_text(&mut self) -> BoxFuture<'_, Option<WsResult<String>>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                    Some(Ok(Message::Binary(bytes))) => {
                        return Some(
                            String::from_utf8(bytes)
                                .map_err(|e| WsError::Parse(format!("Non-UTF-8 frame: {e}"))),
                        );
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        if let Err(e) = self.stream.send(Message::Pong(data)).await {
                            return Some(Err(e.into()));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((1005, "No close frame".to_string()));
                        warn!(code, %reason, "WebSocket closed by server");
                        return None;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => {
                        warn!("WebSocket stream ended");
                        return None;
                    }
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.stream.send(Message::Close(None)).await {
                warn!(?e, "Failed to send Close frame");
            }
        })
    }
}

// ============================================================================
// Mock transport
// ============================================================================

/// Frame a [`MockPeer`] can push to the client.
#[derive(Debug, Clone)]
pub enum MockFrame {
    Text(String),
    /// Connection-level failure.
    Error(String),
    /// Frame that fails to decode (e.g. invalid UTF-8).
    Garbage,
}

/// Server side of one mock connection. Dropping it closes the connection.
#[derive(Debug)]
pub struct MockPeer {
    tx: mpsc::UnboundedSender<MockFrame>,
    token: String,
    closed_by_client: Arc<AtomicBool>,
}

impl MockPeer {
    /// The token the client presented.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Push a text frame. Returns false if the client is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(MockFrame::Text(text.into())).is_ok()
    }

    pub fn send(&self, frame: MockFrame) -> bool {
        self.tx.send(frame).is_ok()
    }

    /// Close from the server side.
    pub fn close(self) {}

    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }
}

/// In-memory transport for tests.
///
/// Each successful `connect` hands a [`MockPeer`] to [`MockTransport::accept`].
#[derive(Debug)]
pub struct MockTransport {
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    peers_rx: TokioMutex<mpsc::UnboundedReceiver<MockPeer>>,
    failures: Mutex<VecDeque<String>>,
    connect_calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            peers_tx,
            peers_rx: TokioMutex::new(peers_rx),
            failures: Mutex::new(VecDeque::new()),
            connect_calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.failures.lock().push_back(reason.into());
    }

    /// Wait for the client's next successful connection.
    pub async fn accept(&self) -> Option<MockPeer> {
        self.peers_rx.lock().await.recv().await
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

impl StreamTransport for MockTransport {
    fn connect(
        &self,
        url: String,
        token: StreamToken,
    ) -> BoxFuture<'_, WsResult<Box<dyn StreamConnection>>> {
        Box::pin(async move {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().push(url);

            if let Some(reason) = self.failures.lock().pop_front() {
                return Err(WsError::ConnectionFailed(reason));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let closed_by_client = Arc::new(AtomicBool::new(false));
            let peer = MockPeer {
                tx,
                token: token.expose().to_string(),
                closed_by_client: closed_by_client.clone(),
            };
            // Receiver lives in self; send only fails if the transport is gone.
            let _ = self.peers_tx.send(peer);

            Ok(Box::new(MockConnection {
                rx,
                closed_by_client,
            }) as Box<dyn StreamConnection>)
        })
    }
}

struct MockConnection {
    rx: mpsc::UnboundedReceiver<MockFrame>,
    closed_by_client: Arc<AtomicBool>,
}

impl StreamConnection for MockConnection {
    fn next_text(&mut self) -> BoxFuture<'_, Option<WsResult<String>>> {
        Box::pin(async move {
            match self.rx.recv().await? {
                MockFrame::Text(text) => Some(Ok(text)),
                MockFrame::Error(reason) => Some(Err(WsError::Transport(reason))),
                MockFrame::Garbage => Some(Err(WsError::Parse("undecodable frame".to_string()))),
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closed_by_client.store(true, Ordering::SeqCst);
            self.rx.close();
        })
    }
}
