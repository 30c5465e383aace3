use rustls::ServerConfig as RustlsConfig;
use std::fmt;
use std::sync::Arc;

/// A stateless callback invoked synchronously from the receive path when a
/// Ping or Pong frame arrives. Receives the frame's payload. Per the
/// concurrency model, it MUST NOT block and MUST NOT re-enter this
/// connection's receive operations.
pub type ControlCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Tuning knobs shared by both client and server connections.
#[derive(Clone)]
pub struct WebSocketConfig {
    /// Outbound fragmentation threshold: `send`/`send_large_data_fragmented`
    /// never write a data frame larger than this. Also enforced as the
    /// inbound per-frame cap.
    pub max_frame_size: usize,
    /// Inbound cap on a reassembled message's total size, across all of its
    /// fragments. Exceeding it fails `recv_message` with `MaxMessageSize`.
    pub max_message_size: usize,
    /// The `Sec-WebSocket-Version` this endpoint requires from its peer.
    pub version: u8,
    /// Subprotocols this endpoint offers (client) or accepts (server), in
    /// preference order. Empty means "no subprotocol negotiation".
    pub subprotocols: Vec<String>,
    pub on_ping: Option<ControlCallback>,
    pub on_pong: Option<ControlCallback>,
}

impl fmt::Debug for WebSocketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketConfig")
            .field("max_frame_size", &self.max_frame_size)
            .field("max_message_size", &self.max_message_size)
            .field("version", &self.version)
            .field("subprotocols", &self.subprotocols)
            .field("on_ping", &self.on_ping.is_some())
            .field("on_pong", &self.on_pong.is_some())
            .finish()
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_frame_size: 256,
            max_message_size: 1 << 20,
            version: 13,
            subprotocols: Vec::new(),
            on_ping: None,
            on_pong: None,
        }
    }
}

/// Server-side configuration envelope: the websocket tuning knobs plus an
/// optional pre-built `rustls` server config. When `tls_config` is `Some`,
/// `start_server_with_config` terminates TLS on every accepted connection
/// before performing the websocket handshake.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub web_socket_config: WebSocketConfig,
    pub tls_config: Option<Arc<RustlsConfig>>,
}

/// Client-side configuration envelope. `ca_file`, when set, points at a PEM
/// file of extra trust anchors to add on top of the bundled webpki roots when
/// connecting to a `wss://` URL.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub web_socket_config: WebSocketConfig,
    pub ca_file: Option<String>,
}
