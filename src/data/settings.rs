//! Watch preferences the host can push.

use chrono::NaiveTime;

/// Shortest screen-on time the watch accepts, in seconds.
pub const MIN_SCREEN_ON_SECS: u16 = 10;

/// Longest screen-on time the watch accepts (18 hours), in seconds.
pub const MAX_SCREEN_ON_SECS: u16 = 64_800;

/// Wrist the watch is worn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Wrist {
    /// Left wrist.
    #[default]
    Left,
    /// Right wrist.
    Right,
}

/// How calories are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CaloriesType {
    /// Only calories burnt through activity.
    #[default]
    Active = 0,
    /// Active plus resting calories.
    Total = 1,
}

/// Clock display format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TimeFormat {
    /// 24-hour clock.
    #[default]
    TwentyFourHour = 0,
    /// 12-hour clock.
    TwelveHour = 1,
}

/// Date display format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DateFormat {
    /// Year, month, day.
    #[default]
    YearMonthDay = 0,
    /// Day, month, year.
    DayMonthYear = 1,
    /// Month, day, year.
    MonthDayYear = 2,
}

/// Quiet hours during which the watch does not vibrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DoNotDisturb {
    /// Whether the schedule is active.
    pub scheduled: bool,
    /// Start of quiet hours.
    pub start: NaiveTime,
    /// End of quiet hours.
    pub end: NaiveTime,
}

impl Default for DoNotDisturb {
    fn default() -> Self {
        Self {
            scheduled: false,
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
        }
    }
}

/// Days of the week as a bitmask, Monday in bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Weekdays(u8);

impl Weekdays {
    /// No day selected.
    pub const NONE: Self = Self(0);
    /// Monday through Friday.
    pub const WORKDAYS: Self = Self(0b001_1111);
    /// Every day.
    pub const ALL: Self = Self(0b111_1111);

    /// Create from a raw mask; bits above Sunday are dropped.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7F)
    }

    /// Raw mask.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Add a day, `0` being Monday and `6` Sunday.
    pub fn with_day(self, day: u8) -> Self {
        if day < 7 {
            Self(self.0 | (1 << day))
        } else {
            self
        }
    }

    /// Check if a day is selected.
    pub fn contains(&self, day: u8) -> bool {
        day < 7 && self.0 & (1 << day) != 0
    }
}

/// Reminder to move after sitting still.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InactivityAlert {
    /// Whether the alert is on.
    pub enabled: bool,
    /// Minutes of inactivity before the alert fires.
    pub threshold_minutes: u8,
    /// Days the alert is active.
    pub days: Weekdays,
}

impl Default for InactivityAlert {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_minutes: 60,
            days: Weekdays::WORKDAYS,
        }
    }
}

/// A single preference change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WatchSetting {
    /// Wrist the watch is worn on.
    Wrist(Wrist),
    /// Screen-on time in seconds, clamped to the accepted range.
    ScreenOnTime(u32),
    /// Analog hand mode, passed through as the firmware's raw value.
    AnalogMode(u8),
    /// Continuous activity tracking.
    ActivityTracking(bool),
    /// Wake the display when the wrist is raised.
    DisplayOnMovement(bool),
    /// Quiet hours.
    DoNotDisturb(DoNotDisturb),
    /// Calorie counting mode.
    CaloriesType(CaloriesType),
    /// Clock format.
    TimeFormat(TimeFormat),
    /// Date format.
    DateFormat(DateFormat),
    /// Inactivity reminder.
    InactivityAlert(InactivityAlert),
}

/// Clamp a screen-on time to what the watch accepts.
pub fn clamp_screen_on_time(seconds: u32) -> u16 {
    seconds.clamp(u32::from(MIN_SCREEN_ON_SECS), u32::from(MAX_SCREEN_ON_SECS)) as u16
}
