//! Error types for the zetime-rust-ble crate.

use std::time::Duration;

use thiserror::Error;

use crate::data::BulkCategory;
use crate::engine::session::SessionState;

/// A complete frame failed the envelope check.
///
/// Malformed frames are dropped; the engine keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Bad preamble, length mismatch, zero length or missing sentinel.
    #[error("Malformed frame: {reason}")]
    Malformed {
        /// What was wrong with the frame.
        reason: String,
    },
}

impl FrameError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Fragments on one channel could not be stitched back together.
///
/// The buffered partial frame is discarded and the next fragment starts fresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// The continuation fragment did not complete the buffered frame.
    ///
    /// This is what a second message starting before the first one finished
    /// looks like on the wire.
    #[error("Fragment does not complete pending frame: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Declared total frame length of the buffered message.
        expected: usize,
        /// Length after concatenating the new fragment.
        actual: usize,
    },

    /// A new frame started while another one was still pending.
    #[error("Frame 0x{command:02X} started before the pending frame completed")]
    Interleaved {
        /// Command byte of the frame that cut in.
        command: u8,
    },

    /// The declared frame does not fit into two fragments.
    #[error("Declared frame of {declared} bytes exceeds two-fragment capacity of {capacity}")]
    Oversized {
        /// Declared total frame length.
        declared: usize,
        /// Largest frame two fragments can carry.
        capacity: usize,
    },
}

/// Transport failures reported by a [`LinkAdapter`](crate::ble::link::LinkAdapter).
#[derive(Error, Debug)]
pub enum LinkError {
    /// Error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The characteristic is not present on the connected device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// UUID of the missing characteristic.
        uuid: String,
    },

    /// A write or subscribe did not complete in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The link operation that timed out.
        operation: String,
        /// The configured step timeout.
        timeout: Duration,
    },

    /// The link has no connected peripheral.
    #[error("Link not connected")]
    NotConnected,
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// Operation requires a connection but the watch is not connected.
    #[error("Watch not connected")]
    NotConnected,

    /// Failed to establish a connection to the watch.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// Malformed frame.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Reassembly protocol violation.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// Transport failure while executing a transaction.
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// An outbound payload does not fit the 16-bit length field.
    #[error("Payload too large: {length} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload length in bytes.
        length: usize,
        /// Largest payload the envelope can declare.
        max: usize,
    },

    /// A transaction leaves data writes without an acknowledgement.
    #[error("Transaction '{transaction}' has data writes without an acknowledgement")]
    UnpairedWrite {
        /// Name of the rejected transaction.
        transaction: String,
    },

    /// The transaction queue is closed because the session is disconnected.
    #[error("Transaction queue closed")]
    QueueClosed,

    /// A bulk fetch is already running.
    #[error("Watch busy fetching {category} data")]
    SessionBusy {
        /// Category currently being fetched.
        category: BulkCategory,
    },

    /// The session state machine refused a transition.
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: SessionState,
        /// Requested target state.
        to: SessionState,
    },

    /// Invalid data was received from the watch.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error came from the transport.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Self::Link(_) | Self::Bluetooth(_))
    }

    /// Check if this error is absorbed by the engine (frame dropped, engine continues).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Frame(_) | Self::Framing(_) | Self::InvalidData { .. })
    }

    /// A short message suitable for a toast or status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Link(_) | Self::Bluetooth(_) => format!("Connection problem: {}", self),
            Self::QueueClosed | Self::NotConnected => "Watch is not connected".to_string(),
            Self::SessionBusy { category } => {
                format!("Still fetching {} data, try again later", category)
            }
            Self::PayloadTooLarge { .. } => "Message too large for the watch".to_string(),
            other => format!("Error: {}", other),
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
