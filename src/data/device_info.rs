//! Watch status reports: battery, versions and music remote control.

/// Battery level at or below which the watch is reported as low.
pub const LOW_BATTERY_THRESHOLD: u8 = 25;

/// Battery state derived from the reported level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BatteryState {
    /// Level above the low threshold.
    #[default]
    Normal,
    /// Level at or below the low threshold.
    Low,
}

/// Battery report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatteryInfo {
    /// Charge level in percent.
    pub level: u8,
    /// Derived state.
    pub state: BatteryState,
}

impl BatteryInfo {
    /// Build a report from a raw level.
    pub fn from_level(level: u8) -> Self {
        let state = if level <= LOW_BATTERY_THRESHOLD {
            BatteryState::Low
        } else {
            BatteryState::Normal
        };
        Self { level, state }
    }

    /// Check if the battery is low.
    pub fn is_low(&self) -> bool {
        self.state == BatteryState::Low
    }
}

/// Which version string a report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VersionKind {
    /// Firmware version (selector 5).
    Firmware,
    /// Hardware version (any other selector).
    Hardware,
}

impl VersionKind {
    /// Selector byte the watch uses for firmware versions.
    pub const FIRMWARE_SELECTOR: u8 = 0x05;
    /// Selector byte the host sends to ask for the hardware version.
    pub const HARDWARE_SELECTOR: u8 = 0x02;

    /// Create from the selector byte of a version reply.
    pub fn from_selector(selector: u8) -> Self {
        if selector == Self::FIRMWARE_SELECTOR {
            Self::Firmware
        } else {
            Self::Hardware
        }
    }
}

/// A firmware or hardware version report.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionInfo {
    /// Which version this is.
    pub kind: VersionKind,
    /// Version string with trailing NULs removed.
    pub version: String,
}

/// Music remote control command sent by the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MusicCommand {
    /// Start playback.
    Play,
    /// Pause playback.
    Pause,
    /// Skip to previous track.
    Previous,
    /// Skip to next track.
    Next,
    /// Raise the volume.
    VolumeUp,
    /// Lower the volume.
    VolumeDown,
}

impl std::fmt::Display for MusicCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Play => "Play",
            Self::Pause => "Pause",
            Self::Previous => "Previous",
            Self::Next => "Next",
            Self::VolumeUp => "Volume Up",
            Self::VolumeDown => "Volume Down",
        };
        write!(f, "{}", name)
    }
}
