//! Streaming market feed client.
//!
//! - Token negotiation before every connection attempt
//! - WebSocket transport over tokio-tungstenite (token as sub-protocol)
//! - Full-snapshot replacement of the shared view state per message
//! - Fixed-delay reconnect, identical for every kind of disconnect

pub mod connection;
pub mod error;
pub mod timer;
pub mod transport;

pub use connection::{StreamConfig, StreamState, StreamingClient, DEFAULT_RECONNECT_DELAY};
pub use error::{WsError, WsResult};
pub use timer::{DynReconnectTimer, ManualTimer, PendingSleep, ReconnectTimer, TokioTimer};
pub use transport::{
    DynStreamTransport, MockFrame, MockPeer, MockTransport, StreamConnection, StreamTransport,
    TungsteniteTransport,
};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
