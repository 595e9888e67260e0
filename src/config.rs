//! Engine and user configuration.

use std::time::Duration;

use crate::protocol::DEFAULT_MAX_CHUNK;

/// Seconds added to every timestamp the watch reports.
///
/// The watch clock runs six hours behind the timestamps it stores.
pub const DEVICE_TIMESTAMP_OFFSET_SECS: i64 = 21_600;

/// User gender as sent to the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Gender {
    /// Male.
    Male = 0,
    /// Female.
    Female = 1,
    /// Other or unspecified.
    #[default]
    Other = 2,
}

impl Gender {
    /// Convert to raw value.
    pub fn to_raw(&self) -> u8 {
        *self as u8
    }
}

/// Body data used for calorie and distance estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserProfile {
    /// Gender.
    pub gender: Gender,
    /// Age in years.
    pub age: u8,
    /// Height in centimeters.
    pub height_cm: u8,
    /// Weight in kilograms.
    pub weight_kg: u16,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            gender: Gender::Other,
            age: 25,
            height_cm: 175,
            weight_kg: 70,
        }
    }
}

/// Daily goals shown on the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActivityGoals {
    /// Steps per day.
    pub steps: u32,
    /// Calories per day.
    pub calories: u16,
    /// Distance per day in kilometers.
    pub distance_km: u16,
    /// Sleep per night in hours.
    pub sleep_hours: u16,
    /// Active minutes per day.
    pub active_minutes: u16,
}

impl Default for ActivityGoals {
    fn default() -> Self {
        Self {
            steps: 8_000,
            calories: 2_000,
            distance_km: 5,
            sleep_hours: 7,
            active_minutes: 60,
        }
    }
}

/// Heart rate alarm bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeartRateLimits {
    /// Upper bound in bpm.
    pub max: u8,
    /// Lower bound in bpm.
    pub min: u8,
    /// Whether the watch alarms when a bound is crossed.
    pub alarm_enabled: bool,
}

impl Default for HeartRateLimits {
    fn default() -> Self {
        Self {
            max: 180,
            min: 60,
            alarm_enabled: true,
        }
    }
}

/// Configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Largest write the link accepts.
    pub max_chunk: usize,
    /// Time limit for each link step.
    pub step_timeout: Duration,
    /// Delete history on the watch after a category was fetched.
    pub delete_after_fetch: bool,
    /// Seconds added to watch timestamps.
    pub timestamp_offset_secs: i64,
    /// Music volume pushed during initialization.
    pub initial_music_volume: u8,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// User body data.
    pub user: UserProfile,
    /// Daily goals.
    pub goals: ActivityGoals,
    /// Heart rate alarm bounds.
    pub heart_rate_limits: HeartRateLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chunk: DEFAULT_MAX_CHUNK,
            step_timeout: Duration::from_secs(10),
            delete_after_fetch: true,
            timestamp_offset_secs: DEVICE_TIMESTAMP_OFFSET_SECS,
            initial_music_volume: 50,
            event_capacity: 256,
            user: UserProfile::default(),
            goals: ActivityGoals::default(),
            heart_rate_limits: HeartRateLimits::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest write size.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    /// Set the per-step timeout.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Keep or delete history on the watch after fetching.
    pub fn with_delete_after_fetch(mut self, delete: bool) -> Self {
        self.delete_after_fetch = delete;
        self
    }

    /// Override the watch timestamp offset.
    pub fn with_timestamp_offset_secs(mut self, offset: i64) -> Self {
        self.timestamp_offset_secs = offset;
        self
    }

    /// Set the initial music volume.
    pub fn with_initial_music_volume(mut self, volume: u8) -> Self {
        self.initial_music_volume = volume;
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the user profile.
    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = user;
        self
    }

    /// Set the daily goals.
    pub fn with_goals(mut self, goals: ActivityGoals) -> Self {
        self.goals = goals;
        self
    }

    /// Set the heart rate alarm bounds.
    pub fn with_heart_rate_limits(mut self, limits: HeartRateLimits) -> Self {
        self.heart_rate_limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_chunk, 20);
        assert_eq!(config.step_timeout, Duration::from_secs(10));
        assert!(config.delete_after_fetch);
        assert_eq!(config.timestamp_offset_secs, 21_600);
        assert_eq!(config.initial_music_volume, 50);
        assert_eq!(config.heart_rate_limits.max, 180);
        assert_eq!(config.heart_rate_limits.min, 60);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_delete_after_fetch(false)
            .with_step_timeout(Duration::from_millis(250))
            .with_timestamp_offset_secs(0);
        assert!(!config.delete_after_fetch);
        assert_eq!(config.step_timeout, Duration::from_millis(250));
        assert_eq!(config.timestamp_offset_secs, 0);
    }

    #[test]
    fn test_gender_raw() {
        assert_eq!(Gender::Male.to_raw(), 0);
        assert_eq!(Gender::Female.to_raw(), 1);
        assert_eq!(Gender::Other.to_raw(), 2);
    }
}
