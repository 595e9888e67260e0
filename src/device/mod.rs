//! Per-family watch protocols.
//!
//! The engine is generic over [`DeviceProtocol`]; each watch family supplies
//! its command tables, request builders and record parsers.

pub mod zetime;

use crate::ble::link::ChannelId;
use crate::config::EngineConfig;
use crate::data::{
    ActivitySample, BatteryInfo, BulkCategory, DataSummary, MusicCommand, MusicPlayback,
    VersionInfo, VersionKind,
};
use crate::engine::operation::DeviceOperation;
use crate::engine::transaction::{Transaction, TransactionBuilder};
use crate::error::Result;
use crate::protocol::Message;

pub use zetime::ZeTimeProtocol;

/// Music volume change per remote control step.
pub const VOLUME_STEP: u8 = 10;

/// What a validated inbound message means.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Watch identity reply.
    WatchIdentity(Vec<u8>),
    /// Version reply.
    Version(VersionInfo),
    /// Battery reply.
    Battery(BatteryInfo),
    /// Availability summary.
    Summary(DataSummary),
    /// History records, all of one category.
    Records(Vec<ActivitySample>),
    /// Playback command from the watch.
    MusicControl(MusicCommand),
    /// Volume change request carrying the watch's new volume.
    MusicVolume {
        /// Volume the watch asked for.
        requested: u8,
    },
    /// The watch asks what is playing.
    MusicStateQuery,
    /// Anything the driver does not handle.
    Unhandled {
        /// Command identifier.
        command: u8,
    },
}

/// What the driver remembers about the connected watch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceContext {
    /// Last reported firmware version.
    pub firmware_version: Option<String>,
    /// Last reported hardware version.
    pub hardware_version: Option<String>,
    /// Current track title.
    pub music_track: Option<String>,
    /// Current player state.
    pub music_state: Option<MusicPlayback>,
    /// Volume the watch displays.
    pub music_volume: u8,
    /// An incoming call is being shown.
    pub call_incoming: bool,
}

impl DeviceContext {
    /// Create a context with the given starting volume.
    pub fn new(music_volume: u8) -> Self {
        Self {
            music_volume,
            ..Self::default()
        }
    }

    /// Remember a version report.
    pub fn apply_version(&mut self, info: &VersionInfo) {
        match info.kind {
            VersionKind::Firmware => self.firmware_version = Some(info.version.clone()),
            VersionKind::Hardware => self.hardware_version = Some(info.version.clone()),
        }
    }

    /// Step the volume towards a requested value.
    ///
    /// A higher request raises the volume by one step up to 90, anything else
    /// lowers it by one step down to 10.
    pub fn apply_volume_request(&mut self, requested: u8) -> MusicCommand {
        if requested > self.music_volume {
            if self.music_volume < 100 - VOLUME_STEP {
                self.music_volume += VOLUME_STEP;
            }
            MusicCommand::VolumeUp
        } else {
            if self.music_volume > VOLUME_STEP {
                self.music_volume -= VOLUME_STEP;
            }
            MusicCommand::VolumeDown
        }
    }

    /// Forget state that does not survive a reconnect.
    pub fn reset_link_state(&mut self) {
        self.call_incoming = false;
    }
}

/// Command tables and codecs for one watch family.
pub trait DeviceProtocol: Send + Sync + 'static {
    /// Family name for logs.
    fn name(&self) -> &'static str;

    /// Characteristic data writes go to.
    fn write_channel(&self) -> ChannelId;

    /// Build the transaction that runs right after connecting.
    ///
    /// It must end by moving the session to `Initialized`.
    fn initialize(&self, config: &EngineConfig, context: &DeviceContext) -> Result<Transaction>;

    /// Interpret a validated message received on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`](crate::Error::InvalidData) if the payload
    /// is shorter than its layout.
    fn classify(&self, channel: ChannelId, message: &Message, config: &EngineConfig)
        -> Result<Inbound>;

    /// Append the request that starts fetching one category.
    fn append_fetch(
        &self,
        builder: &mut TransactionBuilder,
        category: BulkCategory,
        config: &EngineConfig,
    );

    /// Append the request that deletes one category from the watch.
    fn append_delete(
        &self,
        builder: &mut TransactionBuilder,
        category: BulkCategory,
        config: &EngineConfig,
    );

    /// Transaction that tells the watch the current music volume.
    fn music_volume_reply(&self, volume: u8, config: &EngineConfig) -> Transaction;

    /// Transaction answering a music state query, if track and state are known.
    fn music_state_reply(&self, context: &DeviceContext, config: &EngineConfig)
        -> Option<Transaction>;

    /// Turn an application request into a transaction.
    ///
    /// Returns `None` when the request needs no traffic.
    fn build_operation(
        &self,
        operation: &DeviceOperation,
        config: &EngineConfig,
        context: &mut DeviceContext,
    ) -> Result<Option<Transaction>>;
}
