//! Protocol module for framing and defragmenting watch messages.
//!
//! This module contains the implementations for:
//! - Message envelope encoding and validation
//! - Fragmentation and per-channel reassembly
//! - Bounds-checked payload field extraction

pub mod fragment;
pub mod frame;
pub mod reader;

pub use fragment::{fragment, Fragments, Reassembler, DEFAULT_MAX_CHUNK};
pub use frame::{encode, validate, Message, MessageKind, ENVELOPE_OVERHEAD, PREAMBLE, SENTINEL};
pub use reader::ByteReader;
