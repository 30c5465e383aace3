//! The inbound half of a connection: turns wire frames into application
//! messages, absorbing control frames (ping/pong/close) along the way
//! without handing them to the consumer.

use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{self, Frame, FrameHeader, OpCode};
use crate::mask;
use crate::message::Message;
use crate::state::{ReadyState, Role, SharedState};
use crate::stream::SocketFlowStream;
use crate::write::Writer;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};

const FRAME_READ_TIMEOUT: Duration = Duration::from_secs(5);
const FILL_CHUNK: usize = 8 * 1024;

/// Tracks how much of the wire frame currently being read has been consumed,
/// so a payload larger than the caller's buffer can be drained across
/// several `fill` calls.
struct FrameCursor {
    mask_key: Option<[u8; 4]>,
    remaining: u64,
    consumed: u64,
    fin: bool,
}

enum FillOutcome {
    Data(usize),
    MessageEnd(OpCode),
    ConnectionClosed,
}

pub struct ReadStream {
    read_half: ReadHalf<SocketFlowStream>,
    role: Role,
    config: WebSocketConfig,
    writer: Arc<Mutex<Writer>>,
    state: SharedState,
    message_opcode: Option<OpCode>,
    cursor: Option<FrameCursor>,
    pub read_tx: Sender<Result<Message, Error>>,
}

impl ReadStream {
    pub fn new(
        read_half: ReadHalf<SocketFlowStream>,
        role: Role,
        config: WebSocketConfig,
        writer: Arc<Mutex<Writer>>,
        state: SharedState,
        read_tx: Sender<Result<Message, Error>>,
    ) -> Self {
        Self {
            read_half,
            role,
            config,
            writer,
            state,
            message_opcode: None,
            cursor: None,
            read_tx,
        }
    }

    /// Drives this connection's receive side until it closes, forwarding
    /// every reassembled message (or fatal error) to `read_tx`. Runs as a
    /// background task spawned by `split()`.
    pub async fn run(mut self) {
        loop {
            match self.recv_message().await {
                Ok(Some(message)) => {
                    if self.read_tx.send(Ok(message)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    let _ = self.read_tx.send(Err(err)).await;
                    break;
                }
            }
        }
    }

    /// Reads one complete application message, reassembling fragments.
    /// Returns `Ok(None)` once the peer's close handshake has been observed.
    pub async fn recv_message(&mut self) -> Result<Option<Message>, Error> {
        let mut payload = Vec::new();
        let mut chunk = [0u8; FILL_CHUNK];
        loop {
            match self.fill(&mut chunk).await? {
                FillOutcome::Data(n) => {
                    payload.extend_from_slice(&chunk[..n]);
                    if payload.len() > self.config.max_message_size {
                        self.state.advance_to(ReadyState::Closed);
                        return Err(Error::MaxMessageSize);
                    }
                }
                FillOutcome::MessageEnd(opcode) => {
                    return Message::from_frame(Frame::new(true, opcode, payload)).map(Some);
                }
                FillOutcome::ConnectionClosed => return Ok(None),
            }
        }
    }

    /// Reads up to `buf.len()` raw application payload bytes, transparently
    /// spanning fragment boundaries and absorbing control frames. Returns
    /// `0` when the in-progress message (or the connection) has ended.
    pub async fn recv_into(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match self.fill(buf).await? {
            FillOutcome::Data(n) => Ok(n),
            FillOutcome::MessageEnd(_) | FillOutcome::ConnectionClosed => Ok(0),
        }
    }

    async fn fill(&mut self, buf: &mut [u8]) -> Result<FillOutcome, Error> {
        loop {
            if self.cursor.is_none() {
                let header = match self.next_data_header().await? {
                    Some(header) => header,
                    None => return Ok(FillOutcome::ConnectionClosed),
                };

                if header.payload_len > self.config.max_frame_size as u64 {
                    return Err(Error::MaxFrameSize);
                }

                match self.message_opcode {
                    None if header.opcode == OpCode::Continuation => {
                        return Err(Error::InvalidContinuationFrame)
                    }
                    None => self.message_opcode = Some(header.opcode),
                    Some(_) if header.opcode != OpCode::Continuation => {
                        return Err(Error::InvalidFrameFragmentation)
                    }
                    Some(_) => {}
                }

                self.cursor = Some(FrameCursor {
                    mask_key: header.mask_key,
                    remaining: header.payload_len,
                    consumed: 0,
                    fin: header.fin,
                });
            }

            let cursor = self.cursor.as_mut().expect("cursor set above");
            let left = cursor.remaining - cursor.consumed;

            if left == 0 {
                let fin = cursor.fin;
                self.cursor = None;
                if fin {
                    let opcode = self.message_opcode.take().expect("message in progress");
                    return Ok(FillOutcome::MessageEnd(opcode));
                }
                continue;
            }

            let to_read = left.min(buf.len() as u64) as usize;
            if to_read == 0 {
                return Ok(FillOutcome::Data(0));
            }

            timeout(FRAME_READ_TIMEOUT, self.read_half.read_exact(&mut buf[..to_read])).await??;

            if let Some(key) = cursor.mask_key {
                mask::apply_mask(&mut buf[..to_read], key, cursor.consumed);
            }
            cursor.consumed += to_read as u64;

            return Ok(FillOutcome::Data(to_read));
        }
    }

    /// Reads frame headers until a data frame (Text/Binary/Continuation)
    /// arrives, handling every control frame transparently along the way.
    /// Returns `None` once a Close frame has been observed and answered.
    async fn next_data_header(&mut self) -> Result<Option<FrameHeader>, Error> {
        loop {
            let header = frame::read_header(&mut self.read_half, self.role.expects_masked_peer()).await?;
            if header.opcode.is_control() {
                let closed = self.handle_control_frame(&header).await?;
                if closed {
                    return Ok(None);
                }
                continue;
            }
            return Ok(Some(header));
        }
    }

    /// Reads off a control frame's (small, unfragmented) payload and acts on
    /// it. Returns `true` if this was a Close frame.
    async fn handle_control_frame(&mut self, header: &FrameHeader) -> Result<bool, Error> {
        let mut payload = vec![0u8; header.payload_len as usize];
        self.read_half.read_exact(&mut payload).await?;
        if let Some(key) = header.mask_key {
            mask::apply_mask(&mut payload, key, 0);
        }

        match header.opcode {
            OpCode::Ping => {
                if let Some(callback) = &self.config.on_ping {
                    callback(&payload);
                }
                self.writer
                    .lock()
                    .await
                    .write_frame(Frame::new(true, OpCode::Pong, payload))
                    .await?;
                Ok(false)
            }
            OpCode::Pong => {
                if let Some(callback) = &self.config.on_pong {
                    callback(&payload);
                }
                Ok(false)
            }
            OpCode::Close => {
                self.state.advance_to(ReadyState::Closed);
                let _ = self
                    .writer
                    .lock()
                    .await
                    .write_frame(Frame::new(true, OpCode::Close, payload))
                    .await;
                Ok(true)
            }
            _ => unreachable!("control frame opcodes are exhaustively Ping/Pong/Close"),
        }
    }
}
