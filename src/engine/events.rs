//! Events published to the application.

use crate::data::{ActivitySample, BatteryInfo, BulkCategory, DataSummary, MusicCommand, VersionInfo};
use crate::engine::session::SessionState;

/// Something the watch reported or the engine did.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceEvent {
    /// The session moved between states.
    SessionStateChanged {
        /// Previous state.
        from: SessionState,
        /// New state.
        to: SessionState,
    },
    /// Battery report.
    Battery(BatteryInfo),
    /// Firmware or hardware version.
    Version(VersionInfo),
    /// Raw watch identity bytes.
    WatchIdentity(Vec<u8>),
    /// Records waiting on the watch.
    DataSummary(DataSummary),
    /// One history record.
    Sample(ActivitySample),
    /// A history record was counted.
    FetchProgress {
        /// Category being fetched.
        category: BulkCategory,
        /// Records processed.
        received: u16,
        /// Records announced.
        available: u16,
    },
    /// Every announced record of a category arrived.
    FetchComplete {
        /// Finished category.
        category: BulkCategory,
    },
    /// Remote control input from the watch.
    MusicControl(MusicCommand),
    /// A transaction was aborted.
    TransactionFailed {
        /// Transaction name.
        name: String,
        /// Error description.
        reason: String,
    },
}

impl DeviceEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStateChanged { .. } => "session_state_changed",
            Self::Battery(_) => "battery",
            Self::Version(_) => "version",
            Self::WatchIdentity(_) => "watch_identity",
            Self::DataSummary(_) => "data_summary",
            Self::Sample(_) => "sample",
            Self::FetchProgress { .. } => "fetch_progress",
            Self::FetchComplete { .. } => "fetch_complete",
            Self::MusicControl(_) => "music_control",
            Self::TransactionFailed { .. } => "transaction_failed",
        }
    }
}
