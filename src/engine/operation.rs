//! Application requests turned into transactions by a device driver.

use crate::data::{
    CalendarEventSpec, CallSpec, MusicPlayback, NotificationSpec, WatchSetting, WeatherSpec,
};

/// A command the application wants carried out on the watch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceOperation {
    /// Mirror a phone notification.
    SendNotification(NotificationSpec),
    /// Report a phone call state change.
    SetCallState(CallSpec),
    /// Push current weather and forecast.
    SendWeather(WeatherSpec),
    /// Push a calendar entry.
    AddCalendarEvent(CalendarEventSpec),
    /// Synchronize the watch clock with the host.
    SetTime,
    /// Ask for the availability summary and fetch all pending history.
    FetchHistory,
    /// Ask for a battery report.
    RequestBattery,
    /// Update the current track title.
    SetMusicInfo {
        /// Track title.
        track: String,
    },
    /// Update the player state.
    SetMusicState(MusicPlayback),
    /// Set the automatic heart rate measurement interval.
    SetHeartRateInterval {
        /// Interval in seconds; zero turns measurement off.
        seconds: u32,
    },
    /// Change a watch preference.
    Configure(WatchSetting),
}

impl DeviceOperation {
    /// Name used for the resulting transaction.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendNotification(_) => "sendNotification",
            Self::SetCallState(_) => "setCallState",
            Self::SendWeather(_) => "sendWeather",
            Self::AddCalendarEvent(_) => "addCalendarEvent",
            Self::SetTime => "synchronizeTime",
            Self::FetchHistory => "fetchHistory",
            Self::RequestBattery => "requestBattery",
            Self::SetMusicInfo { .. } => "setMusicInfo",
            Self::SetMusicState(_) => "setMusicState",
            Self::SetHeartRateInterval { .. } => "setHeartRateInterval",
            Self::Configure(_) => "sendConfiguration",
        }
    }
}
