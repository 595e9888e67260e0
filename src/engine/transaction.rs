//! Atomic step sequences executed against the link.

use bytes::Bytes;

use crate::ble::link::ChannelId;
use crate::engine::session::SessionState;

/// One unit of work inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Write a data chunk.
    Write {
        /// Target characteristic.
        channel: ChannelId,
        /// Bytes to write.
        data: Bytes,
    },
    /// Acknowledge the preceding data writes.
    Ack {
        /// Acknowledgement characteristic.
        channel: ChannelId,
        /// Acknowledgement bytes.
        data: Bytes,
    },
    /// Subscribe to notifications.
    EnableNotifications {
        /// Characteristic to subscribe to.
        channel: ChannelId,
    },
    /// Change the session state when this step is reached.
    SetSessionState(SessionState),
}

impl Step {
    /// Check if this step talks to the link.
    pub fn is_link_step(&self) -> bool {
        !matches!(self, Self::SetSessionState(_))
    }
}

/// A named, ordered list of steps that runs without interleaving.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    name: String,
    steps: Vec<Step>,
}

impl Transaction {
    /// Create an empty transaction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Transaction name, for logs and failure events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check that every run of data writes on `write_channel` is closed by
    /// an acknowledgement before any other step.
    pub fn check_ack_pairing(&self, write_channel: ChannelId) -> bool {
        let mut unacknowledged = false;
        for step in &self.steps {
            match step {
                Step::Write { channel, .. } if *channel == write_channel => {
                    unacknowledged = true;
                }
                Step::Ack { .. } => unacknowledged = false,
                _ if unacknowledged => return false,
                _ => {}
            }
        }
        !unacknowledged
    }
}

/// Accumulates steps for a [`Transaction`].
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    /// Start a transaction with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            transaction: Transaction::new(name),
        }
    }

    /// Append a data write.
    pub fn write(&mut self, channel: ChannelId, data: impl Into<Bytes>) -> &mut Self {
        self.transaction.steps.push(Step::Write {
            channel,
            data: data.into(),
        });
        self
    }

    /// Append an acknowledgement write.
    pub fn ack(&mut self, channel: ChannelId, data: impl Into<Bytes>) -> &mut Self {
        self.transaction.steps.push(Step::Ack {
            channel,
            data: data.into(),
        });
        self
    }

    /// Append a notification subscription.
    pub fn notify(&mut self, channel: ChannelId) -> &mut Self {
        self.transaction
            .steps
            .push(Step::EnableNotifications { channel });
        self
    }

    /// Append a session state change.
    pub fn set_state(&mut self, state: SessionState) -> &mut Self {
        self.transaction.steps.push(Step::SetSessionState(state));
        self
    }

    /// Number of steps so far.
    pub fn len(&self) -> usize {
        self.transaction.len()
    }

    /// Check if no step was added yet.
    pub fn is_empty(&self) -> bool {
        self.transaction.is_empty()
    }

    /// Finish the transaction.
    pub fn build(self) -> Transaction {
        self.transaction
    }
}
