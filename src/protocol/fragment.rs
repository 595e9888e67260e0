//! Splitting frames into link-sized chunks and stitching them back together.
//!
//! Chunks carry no header of their own. The receiver relies on arrival order
//! and the payload length declared in the first chunk.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::FramingError;
use crate::protocol::frame::{
    declared_payload_len, Message, MessageKind, ENVELOPE_OVERHEAD, PREAMBLE,
};

/// Default largest write the watch accepts in one go.
pub const DEFAULT_MAX_CHUNK: usize = 20;

/// An encoded frame split into chunks of at most `max_chunk` bytes.
///
/// Iteration always starts over from the first chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragments {
    data: Bytes,
    max_chunk: usize,
}

impl Fragments {
    /// Number of chunks.
    pub fn len(&self) -> usize {
        if self.data.is_empty() {
            0
        } else {
            (self.data.len() + self.max_chunk - 1) / self.max_chunk
        }
    }

    /// Check if there are no chunks.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate the chunks in order.
    pub fn iter(&self) -> impl Iterator<Item = Bytes> + '_ {
        let max_chunk = self.max_chunk;
        (0..self.data.len())
            .step_by(max_chunk)
            .map(move |start| self.data.slice(start..(start + max_chunk).min(self.data.len())))
    }
}

impl<'a> IntoIterator for &'a Fragments {
    type Item = Bytes;
    type IntoIter = Box<dyn Iterator<Item = Bytes> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Split an encoded message into chunks of at most `max_chunk` bytes.
///
/// A `max_chunk` of zero is treated as one.
pub fn fragment(message: &Message, max_chunk: usize) -> Fragments {
    Fragments {
        data: Bytes::from(message.to_bytes()),
        max_chunk: max_chunk.max(1),
    }
}

/// Reassembly state for one notification channel.
///
/// Only one partial frame may be pending at a time.
#[derive(Debug, Clone)]
pub struct Reassembler {
    max_chunk: usize,
    pending: Option<BytesMut>,
}

impl Reassembler {
    /// Create a reassembler for chunks of at most `max_chunk` bytes.
    pub fn new(max_chunk: usize) -> Self {
        Self {
            max_chunk: max_chunk.max(ENVELOPE_OVERHEAD + 1),
            pending: None,
        }
    }

    /// Largest payload that fits one chunk.
    pub fn single_fragment_capacity(&self) -> usize {
        self.max_chunk - ENVELOPE_OVERHEAD
    }

    /// Check if a partial frame is buffered.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any buffered partial frame.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Feed one chunk.
    ///
    /// Returns the bytes of a complete frame (still to be validated), or
    /// `None` when the chunk was buffered as the first half of a longer frame.
    ///
    /// # Errors
    ///
    /// Returns a [`FramingError`] if a new frame starts while one is pending,
    /// if the chunk does not complete the pending frame, or if the declared
    /// frame cannot fit in two chunks. The pending state is discarded in
    /// every case.
    pub fn reassemble(&mut self, fragment: &[u8]) -> Result<Option<Vec<u8>>, FramingError> {
        match self.pending.take() {
            None => self.first_fragment(fragment),
            Some(mut partial) => {
                if let Some(command) = self.frame_start(fragment) {
                    return Err(FramingError::Interleaved { command });
                }

                let expected = declared_payload_len(&partial)
                    .map(|len| len + ENVELOPE_OVERHEAD)
                    .unwrap_or(0);
                partial.extend_from_slice(fragment);

                if partial.len() != expected {
                    return Err(FramingError::LengthMismatch {
                        expected,
                        actual: partial.len(),
                    });
                }

                trace!("Reassembled {} byte frame", partial.len());
                Ok(Some(partial.to_vec()))
            }
        }
    }

    /// Command byte of `fragment` if it opens a frame of its own.
    ///
    /// It must carry a preamble, a known kind and a declared length that is
    /// either complete in this chunk or continues past a full-sized chunk.
    fn frame_start(&self, fragment: &[u8]) -> Option<u8> {
        if fragment.first() != Some(&PREAMBLE) {
            return None;
        }
        if matches!(MessageKind::from_raw(*fragment.get(2)?), MessageKind::Other(_)) {
            return None;
        }

        let expected = declared_payload_len(fragment)? + ENVELOPE_OVERHEAD;
        let consistent = fragment.len() == expected
            || (fragment.len() == self.max_chunk && expected > fragment.len());
        consistent.then(|| fragment[1])
    }

    fn first_fragment(&mut self, fragment: &[u8]) -> Result<Option<Vec<u8>>, FramingError> {
        // Too short to carry a length; validation rejects it.
        let Some(declared) = declared_payload_len(fragment) else {
            return Ok(Some(fragment.to_vec()));
        };

        let expected = declared + ENVELOPE_OVERHEAD;
        if declared <= self.single_fragment_capacity() || fragment.len() >= expected {
            return Ok(Some(fragment.to_vec()));
        }

        let capacity = self.max_chunk * 2;
        if expected > capacity {
            return Err(FramingError::Oversized {
                declared: expected,
                capacity,
            });
        }

        trace!(
            "Buffering first fragment: {} of {} bytes",
            fragment.len(),
            expected
        );
        self.pending = Some(BytesMut::from(fragment));
        Ok(None)
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{encode, validate, MessageKind};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn step_record() -> Message {
        // 22-byte payload, 28 bytes on the wire.
        let payload: Vec<u8> = (0..22).collect();
        encode(0x54, MessageKind::Reply, &payload).unwrap()
    }

    #[test]
    fn test_fragment_sizes() {
        let fragments = fragment(&step_record(), 20);
        let chunks: Vec<Bytes> = fragments.iter().collect();
        assert_eq!(fragments.len(), 2);
        assert_eq!(chunks[0].len(), 20);
        assert_eq!(chunks[1].len(), 8);
    }

    #[test]
    fn test_fragment_restartable() {
        let fragments = fragment(&step_record(), 20);
        let first: Vec<Bytes> = fragments.iter().collect();
        let second: Vec<Bytes> = (&fragments).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_message_single_fragment() {
        let msg = encode(0x08, MessageKind::Request, &[]).unwrap();
        let fragments = fragment(&msg, 20);
        assert_eq!(fragments.len(), 1);

        let mut reassembler = Reassembler::default();
        let bytes = reassembler
            .reassemble(&fragments.iter().next().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(validate(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_two_fragment_reassembly() {
        let msg = step_record();
        let chunks: Vec<Bytes> = fragment(&msg, 20).iter().collect();

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.reassemble(&chunks[0]).unwrap(), None);
        assert!(reassembler.has_pending());

        let bytes = reassembler.reassemble(&chunks[1]).unwrap().unwrap();
        assert!(!reassembler.has_pending());
        assert_eq!(validate(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_interleaved_messages_rejected() {
        let first: Vec<Bytes> = fragment(&step_record(), 20).iter().collect();
        let other = encode(0x56, MessageKind::Reply, &[0x11; 18]).unwrap();
        let second: Vec<Bytes> = fragment(&other, 20).iter().collect();

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.reassemble(&first[0]).unwrap(), None);
        let err = reassembler.reassemble(&second[0]).unwrap_err();
        assert_eq!(err, FramingError::Interleaved { command: 0x56 });

        // State was discarded; the next message reassembles cleanly.
        assert!(!reassembler.has_pending());
        assert_eq!(reassembler.reassemble(&second[0]).unwrap(), None);
        let bytes = reassembler.reassemble(&second[1]).unwrap().unwrap();
        assert_eq!(validate(&bytes).unwrap(), other);
    }

    #[test]
    fn test_short_frame_cannot_complete_pending_frame() {
        // Exactly the eight bytes the pending step record is missing.
        let battery = [0x6F, 0x08, 0x80, 0x02, 0x00, 0x50, 0x01, 0x8F];
        let head = step_record().to_bytes();

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.reassemble(&head[..20]).unwrap(), None);
        assert_eq!(
            reassembler.reassemble(&battery),
            Err(FramingError::Interleaved { command: 0x08 })
        );
        assert!(!reassembler.has_pending());
    }

    #[test]
    fn test_second_long_frame_cannot_complete_pending_frame() {
        let first = encode(0x54, MessageKind::Reply, &[0x01; 34]).unwrap().to_bytes();
        let second = encode(0x55, MessageKind::Reply, &[0x02; 34]).unwrap().to_bytes();
        assert_eq!(first.len(), 40);

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.reassemble(&first[..20]).unwrap(), None);
        assert_eq!(
            reassembler.reassemble(&second[..20]),
            Err(FramingError::Interleaved { command: 0x55 })
        );
        assert!(!reassembler.has_pending());
    }

    #[test]
    fn test_continuation_starting_with_preamble_byte() {
        // Payload byte 15 opens the second chunk.
        let mut payload: Vec<u8> = vec![0x00; 22];
        payload[15] = PREAMBLE;
        let msg = encode(0x54, MessageKind::Reply, &payload).unwrap();
        let bytes = msg.to_bytes();

        let mut reassembler = Reassembler::default();
        assert_eq!(reassembler.reassemble(&bytes[..20]).unwrap(), None);
        let whole = reassembler.reassemble(&bytes[20..]).unwrap().unwrap();
        assert_eq!(validate(&whole).unwrap(), msg);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let long = encode(0x76, MessageKind::Send, &[0x20; 60]).unwrap();
        let chunks: Vec<Bytes> = fragment(&long, 20).iter().collect();
        let mut reassembler = Reassembler::default();
        assert!(matches!(
            reassembler.reassemble(&chunks[0]),
            Err(FramingError::Oversized { declared: 66, capacity: 40 })
        ));
        assert!(!reassembler.has_pending());
    }

    #[test]
    fn test_complete_frame_in_one_notification() {
        // A larger MTU delivers the whole frame at once.
        let msg = step_record();
        let mut reassembler = Reassembler::default();
        let bytes = reassembler.reassemble(&msg.to_bytes()).unwrap().unwrap();
        assert_eq!(validate(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_truncated_fragment_passed_to_validation() {
        let mut reassembler = Reassembler::default();
        let bytes = reassembler.reassemble(&[0x6F, 0x08]).unwrap().unwrap();
        assert!(validate(&bytes).is_err());
    }

    proptest! {
        #[test]
        fn prop_two_fragment_messages_survive(
            command in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 15..=34),
        ) {
            let msg = encode(command, MessageKind::Reply, &payload).unwrap();
            let mut reassembler = Reassembler::default();
            let mut complete = None;
            for chunk in fragment(&msg, 20).iter() {
                if let Some(bytes) = reassembler.reassemble(&chunk).unwrap() {
                    complete = Some(bytes);
                }
            }
            prop_assert_eq!(validate(&complete.unwrap()).unwrap(), msg);
        }
    }
}
