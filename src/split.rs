//! Splits an established connection into an independent reader (a
//! `Stream<Item = Result<Message, Error>>`) and writer, and the
//! not-yet-split `WSConnection` the handshake functions hand back.

use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::message::Message;
use crate::read::ReadStream;
use crate::state::{ReadyState, Role, SharedState};
use crate::stream::SocketFlowStream;
use crate::write::Writer;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_stream::wrappers::ReceiverStream;

const READ_CHANNEL_CAPACITY: usize = 128;
const CLOSE_LINGER: Duration = Duration::from_millis(500);

/// A freshly established connection, before its read and write halves are
/// split apart. Returned by `accept_async`/`connect_async` and friends.
pub struct WSConnection {
    stream: SocketFlowStream,
    role: Role,
    config: WebSocketConfig,
    state: SharedState,
}

impl WSConnection {
    pub(crate) fn new(stream: SocketFlowStream, role: Role, config: WebSocketConfig) -> Self {
        Self {
            stream,
            role,
            config,
            state: SharedState::new(ReadyState::Open),
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    /// Splits the connection. The reader side owns a background task that
    /// drives the socket's receive loop and forwards messages over a
    /// channel; the writer side serializes writes behind a mutex so both
    /// halves, and any clones of the writer, can be used concurrently.
    pub fn split(self) -> (WSReader, WSWriter) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        let writer = Arc::new(Mutex::new(Writer::new(write_half, self.role)));
        let (tx, rx) = mpsc::channel(READ_CHANNEL_CAPACITY);

        let read_stream = ReadStream::new(
            read_half,
            self.role,
            self.config.clone(),
            writer.clone(),
            self.state.clone(),
            tx,
        );
        tokio::spawn(read_stream.run());

        let ws_reader = WSReader::new(ReceiverStream::new(rx));
        let ws_writer = WSWriter::new(writer, self.config, self.state);
        (ws_reader, ws_writer)
    }
}

pub struct WSReader {
    read_rx: ReceiverStream<Result<Message, Error>>,
}

impl WSReader {
    fn new(read_rx: ReceiverStream<Result<Message, Error>>) -> Self {
        Self { read_rx }
    }
}

impl Stream for WSReader {
    type Item = Result<Message, Error>;
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.read_rx).poll_next(cx)
    }
}

#[derive(Clone)]
pub struct WSWriter {
    writer: Arc<Mutex<Writer>>,
    web_socket_config: WebSocketConfig,
    state: SharedState,
}

impl WSWriter {
    fn new(writer: Arc<Mutex<Writer>>, web_socket_config: WebSocketConfig, state: SharedState) -> Self {
        Self {
            writer,
            web_socket_config,
            state,
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.state.get() == ReadyState::Open {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    /// Sends a Close frame and marks the connection `Closing`, then waits
    /// briefly for the peer's acknowledgement to drain before returning.
    /// The background read task observes the peer's answering Close frame
    /// and advances the shared state the rest of the way to `Closed`.
    pub async fn close_connection(&mut self) -> Result<(), Error> {
        self.state.advance_to(ReadyState::Closing);
        self.write_frames(vec![Frame::new(true, OpCode::Close, Vec::new())])
            .await?;
        sleep(CLOSE_LINGER).await;
        Ok(())
    }

    pub async fn send_message(&mut self, message: Message) -> Result<(), Error> {
        self.write_message(message).await
    }

    /// Sends raw bytes as a Text frame. Fails if `data` isn't valid UTF-8.
    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.write_message(Message::Text(String::from_utf8(data)?))
            .await
    }

    pub async fn send_as_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.write_message(Message::Binary(data)).await
    }

    pub async fn send_as_text(&mut self, data: String) -> Result<(), Error> {
        self.write_message(Message::Text(data)).await
    }

    pub async fn send_ping(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        self.write_frames(vec![Frame::new(true, OpCode::Ping, Vec::new())])
            .await
    }

    /// Sends an unsolicited Pong frame. Pongs answering a peer's Ping are
    /// already sent automatically by the read loop; this is for the rarer
    /// case of a unidirectional keepalive per RFC 6455 §5.5.3.
    pub async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.ensure_open()?;
        self.write_frames(vec![Frame::new(true, OpCode::Pong, payload)])
            .await
    }

    /// Sends `data` as a Text message split into `fragment_size`-byte
    /// frames. Useful for streaming a payload that's assembled
    /// incrementally, without buffering all of it as one `Message` first.
    pub async fn send_large_data_fragmented(
        &mut self,
        data: Vec<u8>,
        fragment_size: usize,
    ) -> Result<(), Error> {
        self.ensure_open()?;

        if fragment_size > self.web_socket_config.max_frame_size {
            return Err(Error::CustomFragmentSizeExceeded(
                fragment_size,
                self.web_socket_config.max_frame_size,
            ));
        }
        if data.len() > self.web_socket_config.max_message_size {
            return Err(Error::MaxMessageSize);
        }

        if data.is_empty() {
            return self
                .write_frames(vec![Frame::new(true, OpCode::Text, data)])
                .await;
        }

        let chunks = data.chunks(fragment_size);
        let total_chunks = chunks.len();

        for (i, chunk) in chunks.enumerate() {
            let is_final = i == total_chunks - 1;
            let opcode = if i == 0 { OpCode::Text } else { OpCode::Continuation };
            self.write_frames(vec![Frame::new(is_final, opcode, chunk.to_vec())])
                .await?;
        }

        Ok(())
    }

    async fn write_message(&mut self, message: Message) -> Result<(), Error> {
        self.ensure_open()?;

        if message.len() > self.web_socket_config.max_message_size {
            return Err(Error::MaxMessageSize);
        }

        let frames = message.to_frames(self.web_socket_config.max_frame_size);
        self.write_frames(frames).await
    }

    async fn write_frames(&mut self, frames: Vec<Frame>) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        for frame in frames {
            writer.write_frame(frame).await?;
        }
        Ok(())
    }
}
