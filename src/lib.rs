//! RFC 6455 WebSocket framing, handshake and connection engine for both
//! client and server roles, built on top of Tokio.
//!
//! `handshake::connect_async`/`connect_async_with_config` dial a `ws://` or
//! `wss://` URL and perform the opening handshake; `server::start_server`/
//! `start_server_with_config` run an accept loop and hand back an
//! `EventStream` of new clients, messages, disconnections and errors. Either
//! way you end up with a `split::WSConnection`, which `.split()`s into a
//! `Stream<Item = Result<Message, Error>>` reader and a `WSWriter`.

pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod handshake;
mod mask;
pub mod message;
mod read;
mod request;
pub mod server;
pub mod split;
mod state;
mod stream;
mod utils;
mod write;

pub use config::{ClientConfig, ServerConfig, WebSocketConfig};
pub use error::Error;
pub use event::{Event, EventStream, ID};
pub use frame::{Frame, OpCode};
pub use message::Message;
pub use split::{WSConnection, WSReader, WSWriter};
pub use state::{ReadyState, Role};
pub use stream::SocketFlowStream;
