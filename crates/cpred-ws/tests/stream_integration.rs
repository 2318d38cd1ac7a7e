//! Streaming client against a real WebSocket server.
//!
//! A tokio-tungstenite server stands in for the backend `/ws` endpoint: it
//! checks the sub-protocol token, echoes it back and lets each test push
//! frames or drop the connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cpred_api::MockGateway;
use cpred_core::{MarketRecord, Price, ViewStateStore, Volume};
use cpred_ws::{StreamConfig, StreamState, StreamingClient, TungsteniteTransport};
use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

/// Server side of one accepted stream connection. Dropping it closes the
/// connection with a Close frame.
struct ServerConn {
    token: String,
    out: mpsc::UnboundedSender<Message>,
    client_closed: oneshot::Receiver<()>,
}

impl ServerConn {
    fn send_text(&self, text: &str) {
        self.out.send(Message::Text(text.to_string())).unwrap();
    }
}

struct MockStreamServer {
    addr: SocketAddr,
    conns: Mutex<mpsc::UnboundedReceiver<ServerConn>>,
}

impl MockStreamServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (conns_tx, conns_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(stream, conns_tx.clone()));
            }
        });

        Self {
            addr,
            conns: Mutex::new(conns_rx),
        }
    }

    fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    async fn accept(&self) -> ServerConn {
        tokio::time::timeout(WAIT, async { self.conns.lock().await.recv().await })
            .await
            .expect("no connection within timeout")
            .expect("server stopped")
    }
}

async fn handle_connection(stream: TcpStream, conns_tx: mpsc::UnboundedSender<ServerConn>) {
    let mut token = String::new();
    let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
        if let Some(protocol) = req.headers().get(SEC_WEBSOCKET_PROTOCOL) {
            token = protocol.to_str().unwrap_or_default().to_string();
            // The client rejects a handshake that doesn't confirm its sub-protocol.
            resp.headers_mut()
                .insert(SEC_WEBSOCKET_PROTOCOL, protocol.clone());
        }
        Ok(resp)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = oneshot::channel();
    let _ = conns_tx.send(ServerConn {
        token,
        out: out_tx,
        client_closed: closed_rx,
    });

    let (mut write, mut read) = ws_stream.split();
    let mut closed_tx = Some(closed_tx);
    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(msg) => {
                    if write.send(msg).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Close(_))) => {
                    if let Some(tx) = closed_tx.take() {
                        let _ = tx.send(());
                    }
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }
}

struct Running {
    gateway: Arc<MockGateway>,
    store: Arc<ViewStateStore>,
    client: Arc<StreamingClient>,
    task: JoinHandle<()>,
}

fn start_client(url: String, reconnect_delay: Duration) -> Running {
    let gateway = Arc::new(MockGateway::new());
    let store = Arc::new(ViewStateStore::new());
    let client = Arc::new(StreamingClient::new(
        StreamConfig::new(url).with_reconnect_delay(reconnect_delay),
        gateway.clone(),
        Arc::new(TungsteniteTransport),
        store.clone(),
    ));
    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };
    Running {
        gateway,
        store,
        client,
        task,
    }
}

async fn wait_revision(store: &ViewStateStore, revision: u64) {
    let mut rx = store.subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(|v| v.revision() >= revision))
        .await
        .expect("timed out waiting for view state")
        .unwrap();
}

#[tokio::test]
async fn test_stream_snapshots_replace_view_state() {
    let server = MockStreamServer::start().await;
    let running = start_client(server.url(), Duration::from_secs(5));

    let conn = server.accept().await;
    assert_eq!(conn.token, "token-1");

    conn.send_text(
        r#"{"data":[{"symbol":"BTC","price":50000,"volume":1000,"change_24h":2.5,"score":0.91}]}"#,
    );
    wait_revision(&running.store, 1).await;
    assert_eq!(
        running.store.current().records(),
        &[MarketRecord::new(
            "BTC",
            Price::new(dec!(50000)),
            Volume::new(dec!(1000)),
            2.5,
            0.91
        )]
    );

    conn.send_text("{ this is not json");
    conn.send_text(r#"{"data":[]}"#);
    wait_revision(&running.store, 2).await;
    assert!(running.store.current().records().is_empty());
    assert_eq!(running.client.state(), StreamState::Connected);

    running.client.shutdown();
    running.task.await.unwrap();
}

#[tokio::test]
async fn test_reconnects_with_fresh_token_after_server_close() {
    let server = MockStreamServer::start().await;
    let running = start_client(server.url(), Duration::from_millis(50));

    let first = server.accept().await;
    assert_eq!(first.token, "token-1");
    drop(first);

    let second = server.accept().await;
    assert_eq!(second.token, "token-2");
    assert_eq!(running.client.disconnect_count(), 1);
    assert_eq!(running.gateway.token_calls(), 2);

    running.client.shutdown();
    running.task.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying() {
    // Grab a free port, then close the listener so connects are refused.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let running = start_client(format!("ws://{addr}/ws"), Duration::from_millis(20));

    tokio::time::timeout(WAIT, async {
        while running.gateway.token_calls() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client stopped retrying");
    assert!(running.store.current().is_loading());

    running.client.shutdown();
    running.task.await.unwrap();
    assert_eq!(running.client.state(), StreamState::Stopped);
}

#[tokio::test]
async fn test_shutdown_sends_close_frame() {
    let server = MockStreamServer::start().await;
    let running = start_client(server.url(), Duration::from_secs(5));

    let conn = server.accept().await;
    let mut state = running.client.subscribe_state();
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == StreamState::Connected))
        .await
        .unwrap()
        .unwrap();

    running.client.shutdown();
    running.task.await.unwrap();

    tokio::time::timeout(WAIT, conn.client_closed)
        .await
        .expect("no Close frame from client")
        .unwrap();
    assert_eq!(running.client.state(), StreamState::Stopped);
}
