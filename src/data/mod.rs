//! Data structures for watch data.
//!
//! This module contains the types exchanged with the application: history
//! records, status reports, pushed content and preferences.

pub mod device_info;
pub mod notifications;
pub mod samples;
pub mod settings;

pub use device_info::{BatteryInfo, BatteryState, MusicCommand, VersionInfo, VersionKind};
pub use notifications::{
    CalendarEventSpec, CallCommand, CallSpec, MusicPlayback, NotificationKind, NotificationSpec,
    WeatherCondition, WeatherForecast, WeatherSpec,
};
pub use samples::{
    device_timestamp, ActivitySample, BulkCategory, DataSummary, HeartRateSample, SleepKind,
    SleepSample, StepSample,
};
pub use settings::{
    clamp_screen_on_time, CaloriesType, DateFormat, DoNotDisturb, InactivityAlert, TimeFormat,
    WatchSetting, Weekdays, Wrist,
};
