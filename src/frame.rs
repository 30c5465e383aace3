//! RFC 6455 frame header codec.
//!
//! This module only concerns itself with the 2-to-14 byte frame header (fin, rsv,
//! opcode, mask bit, length, mask key). Payload bytes are read and written by the
//! connection engine (`read.rs`/`write.rs`) directly against the stream, so that a
//! frame with a multi-megabyte payload never needs a header-sized intermediate
//! buffer allocated up front.

use crate::error::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Control frames (Close/Ping/Pong) may never carry more than this many payload bytes.
pub const MAX_CONTROL_FRAME_PAYLOAD: u64 = 125;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            _ => Err(Error::InvalidOpcode),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// A fully reassembled application-level frame, after unmasking and header
/// validation. This is what higher layers (message reassembly, control-frame
/// handling) work with; it never carries the wire-level mask key.
#[derive(Debug, Clone)]
pub struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }
}

/// The decoded header of an incoming frame, before its payload has been read off
/// the stream. `payload_len` and `mask_key` drive the streaming payload read in
/// `read.rs`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub fin: bool,
    pub opcode: OpCode,
    pub mask_key: Option<[u8; 4]>,
    pub payload_len: u64,
}

/// Reads and validates the next frame header from `reader`.
///
/// `expect_masked` encodes the role: servers expect every client frame to be
/// masked, clients expect every server frame to be unmasked. A mismatch is a
/// fatal protocol error (`MaskMismatch`), same as a nonzero RSV bit
/// (`RsvMismatch`) or a fragmented/oversized control frame.
pub(crate) async fn read_header<R: AsyncRead + Unpin>(
    reader: &mut R,
    expect_masked: bool,
) -> Result<FrameHeader, Error> {
    let mut header = [0u8; 2];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|_| Error::MalformedHeader)?;

    let fin = (header[0] & 0b1000_0000) != 0;
    let rsv1 = (header[0] & 0b0100_0000) != 0;
    let rsv2 = (header[0] & 0b0010_0000) != 0;
    let rsv3 = (header[0] & 0b0001_0000) != 0;
    if rsv1 || rsv2 || rsv3 {
        return Err(Error::RsvMismatch);
    }

    let opcode = OpCode::from_byte(header[0] & 0b0000_1111)?;

    if !fin && opcode.is_control() {
        return Err(Error::ControlFramesFragmented);
    }

    let masked = (header[1] & 0b1000_0000) != 0;
    if masked != expect_masked {
        return Err(Error::MaskMismatch);
    }

    let mut payload_len = (header[1] & 0b0111_1111) as u64;
    if opcode.is_control() && payload_len > MAX_CONTROL_FRAME_PAYLOAD {
        return Err(Error::ControlFramePayloadSize);
    }

    if payload_len == 126 {
        let mut ext = [0u8; 2];
        reader
            .read_exact(&mut ext)
            .await
            .map_err(|_| Error::MalformedHeader)?;
        payload_len = u16::from_be_bytes(ext) as u64;
    } else if payload_len == 127 {
        let mut ext = [0u8; 8];
        reader
            .read_exact(&mut ext)
            .await
            .map_err(|_| Error::MalformedHeader)?;
        payload_len = u64::from_be_bytes(ext);
    }

    let mask_key = if masked {
        let mut key = [0u8; 4];
        reader
            .read_exact(&mut key)
            .await
            .map_err(|_| Error::MalformedHeader)?;
        Some(key)
    } else {
        None
    };

    Ok(FrameHeader {
        fin,
        opcode,
        mask_key,
        payload_len,
    })
}

/// Serializes a frame header (byte 0, length indicator, extended length and mask
/// key) into `buf`. The caller appends the (already masked, if applicable) payload
/// bytes after this.
pub(crate) fn write_header(
    buf: &mut Vec<u8>,
    fin: bool,
    opcode: OpCode,
    payload_len: usize,
    mask_key: Option<[u8; 4]>,
) {
    let first_byte = ((fin as u8) << 7) | opcode.as_u8();
    buf.push(first_byte);

    let mask_bit = if mask_key.is_some() { 0b1000_0000 } else { 0 };

    if payload_len <= 125 {
        buf.push(mask_bit | payload_len as u8);
    } else if payload_len <= 65535 {
        buf.push(mask_bit | 126);
        buf.extend_from_slice(&(payload_len as u16).to_be_bytes());
    } else {
        buf.push(mask_bit | 127);
        buf.extend_from_slice(&(payload_len as u64).to_be_bytes());
    }

    if let Some(key) = mask_key {
        buf.extend_from_slice(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn opcode_round_trips_through_its_byte() {
        for opcode in [
            OpCode::Continuation,
            OpCode::Text,
            OpCode::Binary,
            OpCode::Close,
            OpCode::Ping,
            OpCode::Pong,
        ] {
            assert_eq!(OpCode::from_byte(opcode.as_u8()).unwrap(), opcode);
        }
    }

    #[test]
    fn opcode_rejects_reserved_values() {
        assert!(matches!(OpCode::from_byte(0x3), Err(Error::InvalidOpcode)));
        assert!(matches!(OpCode::from_byte(0xB), Err(Error::InvalidOpcode)));
    }

    #[tokio::test]
    async fn header_round_trips_small_payload() {
        let mut buf = Vec::new();
        write_header(&mut buf, true, OpCode::Text, 10, None);
        let mut reader = BufReader::new(&buf[..]);
        let header = read_header(&mut reader, false).await.unwrap();
        assert!(header.fin);
        assert_eq!(header.opcode, OpCode::Text);
        assert_eq!(header.payload_len, 10);
        assert!(header.mask_key.is_none());
    }

    #[tokio::test]
    async fn header_round_trips_at_125_byte_boundary() {
        // 125 is the largest length that fits in the 7-bit indicator itself.
        let mut buf = Vec::new();
        write_header(&mut buf, true, OpCode::Binary, 125, None);
        assert_eq!(buf[1] & 0b0111_1111, 125);
        assert_eq!(buf.len(), 2);
        let mut reader = BufReader::new(&buf[..]);
        let header = read_header(&mut reader, false).await.unwrap();
        assert_eq!(header.payload_len, 125);
    }

    #[tokio::test]
    async fn header_round_trips_at_126_byte_boundary() {
        // 126 is the first length that must spill into the 16-bit extended field.
        let mut buf = Vec::new();
        write_header(&mut buf, true, OpCode::Binary, 126, None);
        assert_eq!(buf[1] & 0b0111_1111, 126);
        assert_eq!(buf.len(), 4);
        let mut reader = BufReader::new(&buf[..]);
        let header = read_header(&mut reader, false).await.unwrap();
        assert_eq!(header.payload_len, 126);
    }

    #[tokio::test]
    async fn header_round_trips_at_65535_byte_boundary() {
        // The largest length the 16-bit extended field can still represent.
        let mut buf = Vec::new();
        write_header(&mut buf, true, OpCode::Binary, 65_535, None);
        assert_eq!(buf[1] & 0b0111_1111, 126);
        assert_eq!(buf.len(), 4);
        let mut reader = BufReader::new(&buf[..]);
        let header = read_header(&mut reader, false).await.unwrap();
        assert_eq!(header.payload_len, 65_535);
    }

    #[tokio::test]
    async fn header_round_trips_at_65536_byte_boundary() {
        // 65536 is the first length that must spill into the 64-bit extended field.
        let mut buf = Vec::new();
        write_header(&mut buf, true, OpCode::Binary, 65_536, None);
        assert_eq!(buf[1] & 0b0111_1111, 127);
        assert_eq!(buf.len(), 10);
        let mut reader = BufReader::new(&buf[..]);
        let header = read_header(&mut reader, false).await.unwrap();
        assert_eq!(header.payload_len, 65_536);
    }

    #[tokio::test]
    async fn header_round_trips_16_bit_extended_length() {
        let mut buf = Vec::new();
        write_header(&mut buf, false, OpCode::Binary, 500, None);
        let mut reader = BufReader::new(&buf[..]);
        let header = read_header(&mut reader, false).await.unwrap();
        assert_eq!(header.payload_len, 500);
        assert!(!header.fin);
    }

    #[tokio::test]
    async fn header_round_trips_64_bit_extended_length() {
        let mut buf = Vec::new();
        write_header(&mut buf, true, OpCode::Binary, 70_000, None);
        let mut reader = BufReader::new(&buf[..]);
        let header = read_header(&mut reader, false).await.unwrap();
        assert_eq!(header.payload_len, 70_000);
    }

    #[tokio::test]
    async fn header_round_trips_mask_key() {
        let mut buf = Vec::new();
        write_header(&mut buf, true, OpCode::Binary, 3, Some([1, 2, 3, 4]));
        let mut reader = BufReader::new(&buf[..]);
        let header = read_header(&mut reader, true).await.unwrap();
        assert_eq!(header.mask_key, Some([1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn mask_mismatch_is_rejected() {
        let mut buf = Vec::new();
        write_header(&mut buf, true, OpCode::Text, 0, None);
        let mut reader = BufReader::new(&buf[..]);
        assert!(matches!(
            read_header(&mut reader, true).await,
            Err(Error::MaskMismatch)
        ));
    }

    #[tokio::test]
    async fn oversized_control_frame_payload_is_rejected() {
        let mut header = [0u8; 2];
        header[0] = 0b1000_1001; // fin=1, opcode=Ping
        header[1] = 126; // extended length indicator, disallowed for control frames
        let mut reader = BufReader::new(&header[..]);
        assert!(matches!(
            read_header(&mut reader, false).await,
            Err(Error::ControlFramePayloadSize)
        ));
    }

    #[tokio::test]
    async fn fragmented_control_frame_is_rejected() {
        let mut header = [0u8; 2];
        header[0] = 0b0000_1001; // fin=0, opcode=Ping
        header[1] = 0;
        let mut reader = BufReader::new(&header[..]);
        assert!(matches!(
            read_header(&mut reader, false).await,
            Err(Error::ControlFramesFragmented)
        ));
    }

    #[tokio::test]
    async fn nonzero_rsv_bits_are_rejected() {
        let mut header = [0u8; 2];
        header[0] = 0b0101_0001; // rsv1 set, opcode=Text
        header[1] = 0;
        let mut reader = BufReader::new(&header[..]);
        assert!(matches!(
            read_header(&mut reader, false).await,
            Err(Error::RsvMismatch)
        ));
    }
}
