//! Message envelope encoding and validation.
//!
//! Every message exchanged with the watch uses the same envelope:
//!
//! ```text
//! [preamble:1][command:1][kind:1][len_lo:1][len_hi:1][payload:N][sentinel:1]
//! ```
//!
//! The total length is always `N + 6`.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, FrameError, Result};
use crate::protocol::reader::ByteReader;

/// First byte of every frame.
pub const PREAMBLE: u8 = 0x6F;

/// Last byte of every frame.
pub const SENTINEL: u8 = 0x8F;

/// Preamble + command + kind + two length bytes.
pub const HEADER_LEN: usize = 5;

/// Bytes a frame adds around its payload.
pub const ENVELOPE_OVERHEAD: usize = HEADER_LEN + 1;

/// Largest payload the 16-bit length field can declare.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Direction/kind byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageKind {
    /// Host asks the watch for data (0x70).
    Request,
    /// One side pushes data or a command (0x71).
    Send,
    /// Answer to a request (0x80).
    Reply,
    /// Any other kind byte.
    Other(u8),
}

impl MessageKind {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0x70 => Self::Request,
            0x71 => Self::Send,
            0x80 => Self::Reply,
            other => Self::Other(other),
        }
    }

    /// Convert to raw byte value.
    pub fn to_raw(&self) -> u8 {
        match self {
            Self::Request => 0x70,
            Self::Send => 0x71,
            Self::Reply => 0x80,
            Self::Other(raw) => *raw,
        }
    }
}

/// A complete, envelope-valid message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    command: u8,
    kind: MessageKind,
    payload: Vec<u8>,
}

impl Message {
    /// Build a message.
    ///
    /// An empty payload is replaced by a single zero byte because the watch
    /// rejects frames that declare a zero length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the payload does not fit the
    /// 16-bit length field.
    pub fn new(command: u8, kind: MessageKind, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                length: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self::fixed(command, kind, payload))
    }

    /// Build a message whose payload is known to be small.
    pub(crate) fn fixed(command: u8, kind: MessageKind, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
        let payload = if payload.is_empty() { vec![0x00] } else { payload };
        Self {
            command,
            kind,
            payload,
        }
    }

    /// Parse and validate a complete frame.
    pub fn parse(data: &[u8]) -> std::result::Result<Self, FrameError> {
        validate(data)
    }

    /// Command identifier.
    pub fn command(&self) -> u8 {
        self.command
    }

    /// Kind byte.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length as declared in the header.
    pub fn declared_len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// Total frame length on the wire.
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + ENVELOPE_OVERHEAD
    }

    /// Serialize the message to its wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(PREAMBLE);
        buf.put_u8(self.command);
        buf.put_u8(self.kind.to_raw());
        buf.put_u16_le(self.declared_len());
        buf.put_slice(&self.payload);
        buf.put_u8(SENTINEL);
        buf.to_vec()
    }
}

/// Build a message from its parts.
///
/// Free-function form of [`Message::new`].
pub fn encode(command: u8, kind: MessageKind, payload: &[u8]) -> Result<Message> {
    Message::new(command, kind, payload.to_vec())
}

/// Read the declared payload length from a frame prefix.
///
/// Returns `None` if the prefix is too short to carry the length field.
pub fn declared_payload_len(data: &[u8]) -> Option<usize> {
    let mut reader = ByteReader::new(data);
    reader.skip(3).ok()?;
    reader.read_u16_le().ok().map(usize::from)
}

/// Check a complete frame against the envelope invariant.
///
/// Accepts iff the preamble matches, the declared length is non-zero and
/// equals the actual payload length, and the last byte is the sentinel.
pub fn validate(data: &[u8]) -> std::result::Result<Message, FrameError> {
    if data.len() < ENVELOPE_OVERHEAD + 1 {
        return Err(FrameError::malformed(format!(
            "frame too short: {} bytes",
            data.len()
        )));
    }

    if data[0] != PREAMBLE {
        return Err(FrameError::malformed(format!(
            "invalid preamble: {:#04x}",
            data[0]
        )));
    }

    let declared = declared_payload_len(data)
        .ok_or_else(|| FrameError::malformed("missing length field"))?;
    if declared == 0 {
        return Err(FrameError::malformed("zero payload length"));
    }

    let expected = declared + ENVELOPE_OVERHEAD;
    if data.len() != expected {
        return Err(FrameError::malformed(format!(
            "length mismatch: declared {} bytes, frame has {}",
            expected,
            data.len()
        )));
    }

    let last = data[data.len() - 1];
    if last != SENTINEL {
        return Err(FrameError::malformed(format!(
            "missing sentinel: found {:#04x}",
            last
        )));
    }

    Ok(Message {
        command: data[1],
        kind: MessageKind::from_raw(data[2]),
        payload: data[HEADER_LEN..data.len() - 1].to_vec(),
    })
}
