use httparse::Error as HttpParseError;
use pki_types::InvalidDnsNameError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio::time::error::Elapsed;
use url::ParseError;

/// All error kinds the connection engine, handshake and frame codec can raise.
///
/// Every variant drops the `Connection` that raised it to `Closed`, with the single
/// exception of `MaxMessageSize`, which the caller may choose to recover from by
/// draining or explicitly closing the connection (see `recv_message`).
#[derive(Error, Debug)]
pub enum Error {
    #[error("channel communication error")]
    CommunicationError,

    // General Errors
    #[error("{source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("IO Error happened: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    // Handshake Errors
    #[error("invalid HTTP handshake request line")]
    InvalidHTTPHandshake,

    #[error("Connection: Upgrade header missing in the request")]
    NoConnectionHeaderPresent,

    #[error("Upgrade: websocket header missing in the request")]
    NoUpgradeHeaderPresent,

    #[error("Host header missing in the request")]
    NoHostHeaderPresent,

    #[error("Couldn't find Sec-WebSocket-Key header in the request")]
    NoSecWebsocketKey,

    #[error("Sec-WebSocket-Version `{0}` doesn't match the version required by this endpoint")]
    VersionMismatch(String),

    #[error("client requested subprotocol(s) `{0}` but none are acceptable to this server")]
    ProtocolMismatch(String),

    #[error("handshake prerequisites missing: {0}")]
    HandshakeError(String),

    #[error("server didn't upgrade the connection (status {0})")]
    FailedUpgrade(u16),

    #[error("server's Sec-WebSocket-Accept value didn't match the nonce we sent")]
    InvalidAcceptKey,

    // Framing Errors
    #[error("RSV bit set without a negotiated extension")]
    RsvMismatch,

    #[error("mask bit didn't match the expected direction for this role")]
    MaskMismatch,

    #[error("Control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("Control frame with invalid payload size, can't be greater than 125")]
    ControlFramePayloadSize,

    #[error("fragment_size: `{0}` can't be greater than max_frame_size: `{1}`")]
    CustomFragmentSizeExceeded(usize, usize),

    #[error("Max frame size reached")]
    MaxFrameSize,

    #[error("Max message size reached")]
    MaxMessageSize,

    // Fragmentation Errors
    #[error("Invalid frame while there is a fragmented message in progress")]
    InvalidFrameFragmentation,

    #[error("Incoming fragmented message but there is one already in progress")]
    FragmentedInProgress,

    #[error("Invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    #[error("Invalid Opcode")]
    InvalidOpcode,

    #[error("header ended before all expected bytes arrived")]
    MalformedHeader,

    // HTTP Errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    #[error("Invalid scheme in WebSocket URL")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: HttpParseError,
    },

    #[error("Incomplete HTTP request")]
    IncompleteHTTPRequest,

    #[error("invalid Content-Length header")]
    InvalidContentLength,

    // Domain addr parsing error
    #[error("{source}")]
    DomainError {
        #[from]
        source: InvalidDnsNameError,
    },

    #[error("use_tls = `{0}` argument does not match the passed URL scheme: `{1}`")]
    SchemeAgainstTlsConfig(bool, String),

    #[error("{source}")]
    TlsError {
        #[from]
        source: rustls::Error,
    },

    // Lifecycle errors
    #[error("operation attempted on a connection that isn't open")]
    Closed,
}
