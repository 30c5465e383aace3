//! Application-level messages: the text/binary payloads a caller sends and
//! receives, one layer above the frame codec's fragmentation concerns.

use crate::error::Error;
use crate::frame::{Frame, OpCode};

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

impl Message {
    /// Builds a `Message` from a single, already-reassembled data frame.
    /// `read.rs` is responsible for having merged fragments before calling this.
    pub fn from_frame(frame: Frame) -> Result<Self, Error> {
        match frame.opcode {
            OpCode::Text => Ok(Message::Text(String::from_utf8(frame.payload)?)),
            OpCode::Binary => Ok(Message::Binary(frame.payload)),
            _ => Err(Error::InvalidOpcode),
        }
    }

    pub fn as_binary(&self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) => data.clone(),
        }
    }

    pub fn as_text(&self) -> Result<String, Error> {
        match self {
            Message::Text(text) => Ok(text.clone()),
            Message::Binary(data) => Ok(String::from_utf8(data.clone())?),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Message::Text(text) => text.len(),
            Message::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits this message into a sequence of frames, none larger than
    /// `max_frame_size` bytes of payload, with `fin` set only on the last one
    /// and every frame after the first carrying `OpCode::Continuation`.
    pub fn to_frames(self, max_frame_size: usize) -> Vec<Frame> {
        let opcode = match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        };

        let payload = match self {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) => data,
        };

        if payload.is_empty() {
            return vec![Frame::new(true, opcode, payload)];
        }

        let mut frames: Vec<Frame> = payload
            .chunks(max_frame_size.max(1))
            .enumerate()
            .map(|(i, chunk)| {
                let chunk_opcode = if i == 0 { opcode } else { OpCode::Continuation };
                Frame::new(false, chunk_opcode, chunk.to_vec())
            })
            .collect();

        if let Some(last) = frames.last_mut() {
            last.fin = true;
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_becomes_one_empty_frame() {
        let frames = Message::Text(String::new()).to_frames(16);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
        assert_eq!(frames[0].opcode, OpCode::Text);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn message_smaller_than_max_frame_size_is_one_frame() {
        let frames = Message::Binary(vec![1, 2, 3]).to_frames(16);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
        assert_eq!(frames[0].opcode, OpCode::Binary);
    }

    #[test]
    fn oversized_message_splits_with_continuation_opcodes() {
        let payload: Vec<u8> = (0u8..30).collect();
        let frames = Message::Binary(payload.clone()).to_frames(10);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].opcode, OpCode::Binary);
        assert!(!frames[0].fin);
        assert_eq!(frames[1].opcode, OpCode::Continuation);
        assert!(!frames[1].fin);
        assert_eq!(frames[2].opcode, OpCode::Continuation);
        assert!(frames[2].fin);

        let reassembled: Vec<u8> = frames.into_iter().flat_map(|f| f.payload).collect();
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn from_frame_rejects_control_opcodes() {
        let frame = Frame::new(true, OpCode::Ping, Vec::new());
        assert!(matches!(Message::from_frame(frame), Err(Error::InvalidOpcode)));
    }

    #[test]
    fn from_frame_rejects_invalid_utf8_text() {
        let frame = Frame::new(true, OpCode::Text, vec![0xFF, 0xFE]);
        assert!(Message::from_frame(frame).is_err());
    }
}
