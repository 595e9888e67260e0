//! State shared by the dispatcher and the queue executor.

use std::collections::HashMap;

use crate::ble::link::ChannelId;
use crate::device::DeviceContext;
use crate::engine::progress::ProgressTracker;
use crate::engine::session::{SessionState, SessionStateMachine};
use crate::protocol::Reassembler;

/// Everything the engine knows about the current session.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Session lifecycle.
    pub session: SessionStateMachine,
    /// Bulk fetch counters.
    pub progress: ProgressTracker,
    /// What the driver remembers about the watch.
    pub device: DeviceContext,
    reassembly: HashMap<ChannelId, Reassembler>,
    max_chunk: usize,
}

impl EngineState {
    /// Create a disconnected state.
    pub fn new(max_chunk: usize, music_volume: u8) -> Self {
        Self {
            session: SessionStateMachine::new(),
            progress: ProgressTracker::new(),
            device: DeviceContext::new(music_volume),
            reassembly: HashMap::new(),
            max_chunk,
        }
    }

    /// Reassembler for one channel, created on first use.
    pub fn reassembler(&mut self, channel: ChannelId) -> &mut Reassembler {
        let max_chunk = self.max_chunk;
        self.reassembly
            .entry(channel)
            .or_insert_with(|| Reassembler::new(max_chunk))
    }

    /// Check if any channel holds a partial frame.
    pub fn has_partial_frames(&self) -> bool {
        self.reassembly.values().any(Reassembler::has_pending)
    }

    /// Forget every partial frame.
    pub fn reset_reassembly(&mut self) {
        self.reassembly.clear();
    }

    /// Drop to `Disconnected` and forget per-connection state.
    ///
    /// Returns the previous session state, or `None` if already disconnected.
    pub fn link_lost(&mut self) -> Option<SessionState> {
        self.progress.reset();
        self.reset_reassembly();
        self.device.reset_link_state();
        self.session.force_disconnect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BulkCategory, DataSummary};
    use uuid::Uuid;

    #[test]
    fn test_link_lost_resets() {
        let channel = Uuid::from_u128(0x8002);
        let mut state = EngineState::new(20, 50);
        state.session.transition_to(SessionState::Initializing).unwrap();
        state.progress.load_summary(&DataSummary::new(2, 0, 0));
        state.progress.set_active(Some(BulkCategory::Steps));
        state.device.call_incoming = true;

        // First half of a 28-byte frame.
        let mut first = vec![0x6F, 0x54, 0x80, 0x16, 0x00];
        first.resize(20, 0);
        assert_eq!(state.reassembler(channel).reassemble(&first).unwrap(), None);
        assert!(state.has_partial_frames());

        assert_eq!(state.link_lost(), Some(SessionState::Initializing));
        assert_eq!(state.session.state(), SessionState::Disconnected);
        assert_eq!(state.progress.active(), None);
        assert_eq!(state.progress.counter(BulkCategory::Steps).available, 0);
        assert!(!state.has_partial_frames());
        assert!(!state.device.call_incoming);
        assert_eq!(state.link_lost(), None);
    }
}
