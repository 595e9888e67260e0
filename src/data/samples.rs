//! Historical activity records stored on the watch.
//!
//! The watch keeps three kinds of history (steps, sleep, heart rate) and
//! reports how many records of each are waiting in an availability summary.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// A category of history the watch can hand over in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BulkCategory {
    /// Step/calorie/distance records.
    Steps,
    /// Sleep phase records.
    Sleep,
    /// Heart rate measurements.
    HeartRate,
}

impl BulkCategory {
    /// Order in which pending categories are fetched.
    pub const FETCH_ORDER: [BulkCategory; 3] = [Self::Steps, Self::HeartRate, Self::Sleep];

    /// Get a human-readable name for this category.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::Sleep => "sleep",
            Self::HeartRate => "heart rate",
        }
    }
}

impl std::fmt::Display for BulkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Convert a raw watch timestamp to UTC.
///
/// The watch clock runs with a fixed offset from real time; `offset_secs`
/// is added before conversion.
pub fn device_timestamp(raw: u32, offset_secs: i64) -> Result<DateTime<Utc>> {
    let secs = i64::from(raw) + offset_secs;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::InvalidData {
            context: format!("timestamp out of range: {}", secs),
        })
}

/// One step record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepSample {
    /// Record index as reported by the watch (1-based).
    pub index: u16,
    /// Start of the recording interval.
    pub timestamp: DateTime<Utc>,
    /// Steps taken.
    pub steps: u32,
    /// Calories burnt.
    pub calories: u32,
    /// Distance in meters.
    pub distance_meters: u32,
    /// Active time in minutes.
    pub active_minutes: u32,
}

/// Sleep phase reported for an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SleepKind {
    /// Deep sleep.
    Deep,
    /// Light sleep.
    Light,
    /// Any other value the watch sends.
    Unknown(u8),
}

impl SleepKind {
    /// Create from raw value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Self::Deep,
            1 => Self::Light,
            other => Self::Unknown(other),
        }
    }
}

/// One sleep record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SleepSample {
    /// Record index as reported by the watch.
    pub index: u16,
    /// Start of the interval.
    pub timestamp: DateTime<Utc>,
    /// Sleep phase.
    pub kind: SleepKind,
}

/// One heart rate measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeartRateSample {
    /// Record index as reported by the watch.
    pub index: u16,
    /// Measurement time.
    pub timestamp: DateTime<Utc>,
    /// Beats per minute.
    pub bpm: u8,
}

/// A history record of any category.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivitySample {
    /// Step record.
    Steps(StepSample),
    /// Sleep record.
    Sleep(SleepSample),
    /// Heart rate record.
    HeartRate(HeartRateSample),
}

impl ActivitySample {
    /// Category this record belongs to.
    pub fn category(&self) -> BulkCategory {
        match self {
            Self::Steps(_) => BulkCategory::Steps,
            Self::Sleep(_) => BulkCategory::Sleep,
            Self::HeartRate(_) => BulkCategory::HeartRate,
        }
    }

    /// Record timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Steps(s) => s.timestamp,
            Self::Sleep(s) => s.timestamp,
            Self::HeartRate(s) => s.timestamp,
        }
    }
}

/// Number of records waiting on the watch, per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSummary {
    /// Pending step records.
    pub steps: u16,
    /// Pending sleep records.
    pub sleep: u16,
    /// Pending heart rate records.
    pub heart_rate: u16,
}

impl DataSummary {
    /// Create a new summary.
    pub fn new(steps: u16, sleep: u16, heart_rate: u16) -> Self {
        Self {
            steps,
            sleep,
            heart_rate,
        }
    }

    /// Records available for one category.
    pub fn available(&self, category: BulkCategory) -> u16 {
        match category {
            BulkCategory::Steps => self.steps,
            BulkCategory::Sleep => self.sleep,
            BulkCategory::HeartRate => self.heart_rate,
        }
    }

    /// Check if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.steps == 0 && self.sleep == 0 && self.heart_rate == 0
    }

    /// Total records across all categories.
    pub fn total(&self) -> u32 {
        u32::from(self.steps) + u32::from(self.sleep) + u32::from(self.heart_rate)
    }
}
