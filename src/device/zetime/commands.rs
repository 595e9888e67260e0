//! ZeTime command identifiers and outbound payload layouts.
//!
//! Every builder here returns only the payload; the envelope is added by
//! [`Message::new`](crate::protocol::Message::new).

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::config::{ActivityGoals, HeartRateLimits, UserProfile};
use crate::data::{
    clamp_screen_on_time, CalendarEventSpec, CallSpec, MusicPlayback, NotificationKind,
    NotificationSpec, WatchSetting, WeatherCondition, WeatherSpec, Wrist,
};
use crate::error::{Error, Result};
use crate::utils::{ascii_timestamp, celsius_to_i8, truncate_utf8};

/// Byte written to the ack characteristic after a data write.
pub const ACK_WRITE: u8 = 0x03;

/// Longest subject or body a notification carries, in bytes.
pub const MAX_TEXT_LEN: usize = 255;

/// Forecast days a weather push carries.
pub const FORECAST_DAYS: usize = 3;

/// Firmware build from which the watch uses the newer weather icons.
pub const NEW_WEATHER_ICONS_BUILD: &str = "B4.1";

/// ZeTime command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Watch identity (0x02).
    WatchId = 0x02,
    /// Firmware or hardware version (0x03).
    DeviceVersion = 0x03,
    /// Date and time (0x04).
    DateTime = 0x04,
    /// Watch face time and date format (0x05).
    TimeSurfaceSettings = 0x05,
    /// Battery level (0x08).
    BatteryPower = 0x08,
    /// Vibration strength (0x10).
    ShockStrength = 0x10,
    /// Do-not-disturb schedule (0x15).
    DoNotDisturb = 0x15,
    /// Device control, used for activity tracking (0x1A).
    ControlDevice = 0x1A,
    /// Screen-on time (0x25).
    DisplayTimeout = 0x25,
    /// Analog hand mode (0x26).
    AnalogMode = 0x26,
    /// User body data (0x30).
    UserInfo = 0x30,
    /// Usage habits, used for the wrist (0x31).
    UsageHabits = 0x31,
    /// Daily goals (0x50).
    Goals = 0x50,
    /// Availability summary (0x52).
    AvailableData = 0x52,
    /// Delete step history (0x53).
    DeleteStep = 0x53,
    /// Step records (0x54).
    GetStep = 0x54,
    /// Delete sleep history (0x55).
    DeleteSleep = 0x55,
    /// Sleep records (0x56).
    GetSleep = 0x56,
    /// Delete heart rate history (0x5A).
    DeleteHeartRate = 0x5A,
    /// Heart rate records, legacy layout (0x5B).
    GetHeartRate = 0x5B,
    /// Automatic heart rate interval (0x5C).
    AutoHeartRate = 0x5C,
    /// Heart rate alarm bounds (0x5D).
    HeartRateAlarmLimits = 0x5D,
    /// Inactivity alert (0x5E).
    InactivityAlert = 0x5E,
    /// Calorie counting mode (0x60).
    CaloriesType = 0x60,
    /// Heart rate records, extended layout (0x61).
    GetHeartRateExData = 0x61,
    /// Extended message push (0x76).
    PushExMessage = 0x76,
    /// Weather push (0x77).
    PushWeather = 0x77,
    /// Switch settings, used for display on movement (0x90).
    SwitchSettings = 0x90,
    /// Calendar entry push (0x99).
    PushCalendarDay = 0x99,
    /// Music remote control (0xD0).
    MusicControl = 0xD0,
    /// Unknown command.
    Unknown = 0xFF,
}

impl Command {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0x02 => Self::WatchId,
            0x03 => Self::DeviceVersion,
            0x04 => Self::DateTime,
            0x05 => Self::TimeSurfaceSettings,
            0x08 => Self::BatteryPower,
            0x10 => Self::ShockStrength,
            0x15 => Self::DoNotDisturb,
            0x1A => Self::ControlDevice,
            0x25 => Self::DisplayTimeout,
            0x26 => Self::AnalogMode,
            0x30 => Self::UserInfo,
            0x31 => Self::UsageHabits,
            0x50 => Self::Goals,
            0x52 => Self::AvailableData,
            0x53 => Self::DeleteStep,
            0x54 => Self::GetStep,
            0x55 => Self::DeleteSleep,
            0x56 => Self::GetSleep,
            0x5A => Self::DeleteHeartRate,
            0x5B => Self::GetHeartRate,
            0x5C => Self::AutoHeartRate,
            0x5D => Self::HeartRateAlarmLimits,
            0x5E => Self::InactivityAlert,
            0x60 => Self::CaloriesType,
            0x61 => Self::GetHeartRateExData,
            0x76 => Self::PushExMessage,
            0x77 => Self::PushWeather,
            0x90 => Self::SwitchSettings,
            0x99 => Self::PushCalendarDay,
            0xD0 => Self::MusicControl,
            _ => Self::Unknown,
        }
    }

    /// Convert to raw byte value.
    pub fn to_raw(self) -> u8 {
        self as u8
    }
}

/// Type codes of an extended message push.
pub mod notification_code {
    pub const MISSED_CALL: u8 = 0x00;
    pub const SMS: u8 = 0x01;
    pub const SOCIAL: u8 = 0x02;
    pub const EMAIL: u8 = 0x03;
    pub const CALENDAR: u8 = 0x04;
    pub const INCOMING_CALL: u8 = 0x05;
    pub const CALL_OFF: u8 = 0x06;
    pub const WECHAT: u8 = 0x07;
    pub const VIBER: u8 = 0x08;
    pub const SNAPCHAT: u8 = 0x09;
    pub const WHATSAPP: u8 = 0x0A;
    pub const FACEBOOK: u8 = 0x0C;
    pub const HANGOUTS: u8 = 0x0D;
    pub const MESSENGER: u8 = 0x0F;
    pub const INSTAGRAM: u8 = 0x10;
    pub const TWITTER: u8 = 0x11;
    pub const LINKEDIN: u8 = 0x12;
    pub const LINE: u8 = 0x14;
    pub const SKYPE: u8 = 0x15;
}

/// Map a notification source to its push type code.
pub fn notification_code(kind: NotificationKind) -> u8 {
    use notification_code::*;

    match kind {
        NotificationKind::Sms => SMS,
        NotificationKind::MissedCall => MISSED_CALL,
        NotificationKind::Email => EMAIL,
        NotificationKind::Calendar => CALENDAR,
        NotificationKind::WeChat => WECHAT,
        NotificationKind::Viber => VIBER,
        NotificationKind::WhatsApp => WHATSAPP,
        NotificationKind::Facebook => FACEBOOK,
        NotificationKind::Hangouts => HANGOUTS,
        NotificationKind::Line => LINE,
        NotificationKind::Skype => SKYPE,
        NotificationKind::Messenger => MESSENGER,
        NotificationKind::Snapchat => SNAPCHAT,
        NotificationKind::Instagram => INSTAGRAM,
        NotificationKind::Twitter => TWITTER,
        NotificationKind::LinkedIn => LINKEDIN,
        NotificationKind::Other => SOCIAL,
    }
}

/// Clock synchronization payload.
///
/// `utc_offset_secs` is the host's offset from UTC including daylight
/// saving; the watch only takes whole hours.
pub fn time_sync(now: &NaiveDateTime, utc_offset_secs: i32) -> Vec<u8> {
    let year = now.year().clamp(0, i32::from(u16::MAX)) as u16;
    let [year_lo, year_hi] = year.to_le_bytes();
    let tz_hours = (utc_offset_secs / 3600) as i8;

    vec![
        year_lo,
        year_hi,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second().min(59) as u8,
        0x00, // 24h clock
        0x00, // no calibration
        0x01, // metric units
        tz_hours as u8,
        0x00, // timezone minutes
    ]
}

/// User body data payload; weight goes out in 100 g units.
pub fn user_info(user: &UserProfile) -> Vec<u8> {
    let [weight_lo, weight_hi] = user.weight_kg.saturating_mul(10).to_le_bytes();
    vec![
        user.gender.to_raw(),
        user.age,
        user.height_cm,
        weight_lo,
        weight_hi,
    ]
}

/// One payload per goal, in the order steps, calories, distance, sleep and
/// active minutes. The step goal goes out in units of 100 steps.
pub fn goals(goals: &ActivityGoals) -> [[u8; 4]; 5] {
    let steps = u16::try_from(goals.steps / 100).unwrap_or(u16::MAX);
    let values = [
        steps,
        goals.calories,
        goals.distance_km,
        goals.sleep_hours,
        goals.active_minutes,
    ];

    let mut out = [[0u8; 4]; 5];
    for (goal_type, (slot, value)) in out.iter_mut().zip(values).enumerate() {
        let [lo, hi] = value.to_le_bytes();
        *slot = [goal_type as u8, lo, hi, 0x01];
    }
    out
}

/// Heart rate alarm bounds payload.
pub fn heart_rate_limits(limits: &HeartRateLimits) -> [u8; 3] {
    [limits.max, limits.min, u8::from(limits.alarm_enabled)]
}

/// Automatic heart rate interval payload; the watch counts whole minutes.
pub fn auto_heart_rate(seconds: u32) -> [u8; 1] {
    [u8::try_from(seconds / 60).unwrap_or(u8::MAX)]
}

/// Extended message payload for a notification.
pub fn notification(spec: &NotificationSpec) -> Vec<u8> {
    let subject = truncate_utf8(spec.heading().unwrap_or_default(), MAX_TEXT_LEN);
    let body = truncate_utf8(&spec.body, MAX_TEXT_LEN);
    ex_message(
        notification_code(spec.kind),
        subject.as_bytes(),
        body.as_bytes(),
        &spec.timestamp,
    )
}

/// Extended message payload announcing an incoming call.
pub fn incoming_call(spec: &CallSpec) -> Vec<u8> {
    let caller = truncate_utf8(spec.caller().unwrap_or_default(), MAX_TEXT_LEN);
    ex_message(
        notification_code::INCOMING_CALL,
        caller.as_bytes(),
        &[],
        &spec.timestamp,
    )
}

/// Extended message payload dismissing the call screen.
pub fn call_off(time: &NaiveDateTime) -> Vec<u8> {
    ex_message(notification_code::CALL_OFF, &[], &[], time)
}

fn ex_message(code: u8, subject: &[u8], body: &[u8], time: &NaiveDateTime) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + subject.len() + body.len() + 15);
    payload.extend_from_slice(&[code, 0x01, subject.len() as u8, body.len() as u8]);
    payload.extend_from_slice(subject);
    payload.extend_from_slice(body);
    payload.extend_from_slice(&ascii_timestamp(time));
    payload
}

/// Check if a firmware version string is new enough for the newer icons.
///
/// The build is the last four characters, compared as text.
pub fn uses_new_weather_icons(firmware: Option<&str>) -> bool {
    let Some(firmware) = firmware else {
        return false;
    };
    let build = match firmware.char_indices().rev().nth(3) {
        Some((start, _)) => &firmware[start..],
        None => firmware,
    };
    build >= NEW_WEATHER_ICONS_BUILD
}

/// Icon index for a weather condition.
///
/// Both tables are approximations of the vendor icon sets; newer firmware
/// adds dedicated icons for light rain, fog, sleet and overcast skies.
pub fn weather_icon(condition: WeatherCondition, new_icons: bool) -> u8 {
    match (condition, new_icons) {
        (WeatherCondition::PartlyCloudy, _) => 0,
        (WeatherCondition::Cloudy, _) => 1,
        (WeatherCondition::Clear, _) => 2,
        (WeatherCondition::Windy, _) => 3,
        (WeatherCondition::HeavyRain, _) => 4,
        (WeatherCondition::Snow, _) => 5,
        (WeatherCondition::Thunderstorm, _) => 6,
        (WeatherCondition::Drizzle, true) => 7,
        (WeatherCondition::Rain, true) => 8,
        (WeatherCondition::Sleet, true) => 9,
        (WeatherCondition::Fog, true) => 10,
        (WeatherCondition::Overcast, true) => 11,
        (WeatherCondition::Drizzle | WeatherCondition::Rain, false) => 4,
        (WeatherCondition::Sleet, false) => 5,
        (WeatherCondition::Fog | WeatherCondition::Overcast, false) => 1,
        (WeatherCondition::Unknown, _) => 1,
    }
}

/// Weather payload with today's values and a three day forecast.
///
/// The icon for the current condition follows `new_icons`; forecast days
/// always use the newer table.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if fewer than three forecast days
/// are given.
pub fn weather(spec: &WeatherSpec, new_icons: bool) -> Result<Vec<u8>> {
    if spec.forecasts.len() < FORECAST_DAYS {
        return Err(Error::InvalidParameter {
            name: "forecasts".to_string(),
            value: format!("{} days, need {}", spec.forecasts.len(), FORECAST_DAYS),
        });
    }

    let mut payload = Vec::with_capacity(20 + spec.location.len());
    payload.extend_from_slice(&[
        0x00, // Celsius
        celsius_to_i8(spec.current_celsius) as u8,
        celsius_to_i8(spec.today_min_celsius) as u8,
        celsius_to_i8(spec.today_max_celsius) as u8,
        weather_icon(spec.condition, new_icons),
    ]);
    for day in spec.forecasts.iter().take(FORECAST_DAYS) {
        payload.extend_from_slice(&[
            0x00,
            0xFF,
            celsius_to_i8(day.min_celsius) as u8,
            celsius_to_i8(day.max_celsius) as u8,
            weather_icon(day.condition, true),
        ]);
    }
    payload.extend_from_slice(spec.location.as_bytes());
    Ok(payload)
}

/// Calendar entry payload.
pub fn calendar_event(spec: &CalendarEventSpec) -> Vec<u8> {
    let title = truncate_utf8(&spec.title, MAX_TEXT_LEN);
    let [year_lo, year_hi] = (spec.start.year().clamp(0, i32::from(u16::MAX)) as u16).to_le_bytes();

    let mut payload = Vec::with_capacity(10 + title.len());
    payload.extend_from_slice(&[
        spec.event_type.wrapping_add(1),
        year_lo,
        year_hi,
        spec.start.month() as u8,
        spec.start.day() as u8,
        spec.start.hour() as u8,
        0x00,
        spec.start.minute() as u8,
        0x00,
        title.len() as u8,
    ]);
    payload.extend_from_slice(title.as_bytes());
    payload
}

/// Music state payload: play flag followed by the track title.
pub fn music_state(state: MusicPlayback, track: &str) -> Vec<u8> {
    let flag = if state.is_playing() { 0x00 } else { 0x01 };
    let mut payload = Vec::with_capacity(1 + track.len());
    payload.push(flag);
    payload.extend_from_slice(track.as_bytes());
    payload
}

/// Music volume payload.
pub fn music_volume(volume: u8) -> [u8; 2] {
    [0x02, volume]
}

/// Command and payload for a preference change.
pub fn setting(setting: &WatchSetting) -> (Command, Vec<u8>) {
    match setting {
        WatchSetting::Wrist(wrist) => {
            let value = match wrist {
                Wrist::Left => 0x00,
                Wrist::Right => 0x01,
            };
            (Command::UsageHabits, vec![value])
        }
        WatchSetting::ScreenOnTime(seconds) => (
            Command::DisplayTimeout,
            clamp_screen_on_time(*seconds).to_le_bytes().to_vec(),
        ),
        WatchSetting::AnalogMode(mode) => (Command::AnalogMode, vec![*mode]),
        WatchSetting::ActivityTracking(on) => {
            (Command::ControlDevice, vec![if *on { 0x0A } else { 0x09 }])
        }
        WatchSetting::DisplayOnMovement(on) => {
            (Command::SwitchSettings, vec![0x01, 0x0E, u8::from(*on)])
        }
        WatchSetting::DoNotDisturb(dnd) => (
            Command::DoNotDisturb,
            vec![
                u8::from(dnd.scheduled),
                dnd.start.hour() as u8,
                dnd.start.minute() as u8,
                dnd.end.hour() as u8,
                dnd.end.minute() as u8,
            ],
        ),
        WatchSetting::CaloriesType(kind) => (Command::CaloriesType, vec![*kind as u8]),
        // 0xFF leaves a field unchanged.
        WatchSetting::TimeFormat(format) => (
            Command::TimeSurfaceSettings,
            vec![0xFF, *format as u8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        ),
        WatchSetting::DateFormat(format) => (
            Command::TimeSurfaceSettings,
            vec![*format as u8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        ),
        WatchSetting::InactivityAlert(alert) => {
            let repeat = if alert.enabled {
                0x80 | alert.days.bits()
            } else {
                0x00
            };
            (
                Command::InactivityAlert,
                vec![repeat, alert.threshold_minutes, 0, 0, 0, 0, 0x64, 0],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Gender;
    use crate::data::{
        CaloriesType, DoNotDisturb, InactivityAlert, TimeFormat, WeatherForecast, Weekdays,
    };
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 6, 8)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap()
    }

    #[test]
    fn test_command_round_trip() {
        for raw in [0x02, 0x52, 0x61, 0xD0] {
            assert_eq!(Command::from_raw(raw).to_raw(), raw);
        }
        assert_eq!(Command::from_raw(0x42), Command::Unknown);
    }

    #[test]
    fn test_time_sync_layout() {
        assert_eq!(
            time_sync(&noon(), 7200),
            vec![0xE2, 0x07, 6, 8, 12, 30, 5, 0, 0, 1, 2, 0]
        );
        assert_eq!(time_sync(&noon(), -5 * 3600)[10], 0xFB);
    }

    #[test]
    fn test_user_info_weight_units() {
        let user = UserProfile {
            gender: Gender::Female,
            age: 30,
            height_cm: 168,
            weight_kg: 62,
        };
        assert_eq!(user_info(&user), vec![1, 30, 168, 0x6C, 0x02]);
    }

    #[test]
    fn test_goals_layout() {
        let payloads = goals(&ActivityGoals::default());
        assert_eq!(payloads[0], [0, 80, 0, 1]);
        assert_eq!(payloads[1], [1, 0xD0, 0x07, 1]);
        assert_eq!(payloads[4], [4, 60, 0, 1]);
    }

    #[test]
    fn test_notification_layout() {
        let spec = NotificationSpec::new(NotificationKind::WhatsApp, "hello")
            .with_sender("Bob")
            .with_title("ignored")
            .with_timestamp(noon());
        let payload = notification(&spec);

        assert_eq!(&payload[..4], &[0x0A, 0x01, 3, 5]);
        assert_eq!(&payload[4..12], b"Bobhello");
        assert_eq!(&payload[12..], b"20180608T123005");
    }

    #[test]
    fn test_notification_truncates_body() {
        let body = "ü".repeat(200);
        let spec = NotificationSpec::new(NotificationKind::Other, body).with_timestamp(noon());
        let payload = notification(&spec);

        assert_eq!(payload[0], notification_code::SOCIAL);
        assert_eq!(payload[2], 0);
        assert_eq!(payload[3], 254);
        assert_eq!(payload.len(), 4 + 254 + 15);
    }

    #[test]
    fn test_call_payloads() {
        let ring = CallSpec::incoming(None, Some("+491234".to_string())).with_timestamp(noon());
        let payload = incoming_call(&ring);
        assert_eq!(&payload[..4], &[0x05, 0x01, 7, 0]);
        assert_eq!(&payload[4..11], b"+491234");

        assert_eq!(&call_off(&noon())[..4], &[0x06, 0x01, 0, 0]);
    }

    #[test]
    fn test_new_icon_threshold() {
        assert!(uses_new_weather_icons(Some("V1.7B4.1")));
        assert!(uses_new_weather_icons(Some("B5.0")));
        assert!(!uses_new_weather_icons(Some("V1.7B3.9")));
        assert!(!uses_new_weather_icons(Some("B4")));
        assert!(!uses_new_weather_icons(None));
    }

    #[test]
    fn test_weather_layout() {
        let spec = WeatherSpec {
            location: "Berlin".to_string(),
            current_celsius: 21.4,
            today_min_celsius: -2.0,
            today_max_celsius: 25.0,
            condition: WeatherCondition::Fog,
            forecasts: vec![
                WeatherForecast {
                    min_celsius: 10.0,
                    max_celsius: 20.0,
                    condition: WeatherCondition::Fog,
                };
                4
            ],
        };

        let old = weather(&spec, false).unwrap();
        assert_eq!(&old[..5], &[0, 21, 0xFE, 25, 1]);
        assert_eq!(&old[5..10], &[0, 0xFF, 10, 20, 10]);
        assert_eq!(old.len(), 20 + 6);
        assert_eq!(&old[20..], b"Berlin");

        assert_eq!(weather(&spec, true).unwrap()[4], 10);
    }

    #[test]
    fn test_weather_needs_three_days() {
        let spec = WeatherSpec {
            forecasts: vec![WeatherForecast::default(); 2],
            ..WeatherSpec::default()
        };
        assert!(matches!(
            weather(&spec, true),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_calendar_layout() {
        let spec = CalendarEventSpec {
            event_type: 0,
            title: "Dentist".to_string(),
            start: noon(),
        };
        let payload = calendar_event(&spec);
        assert_eq!(&payload[..10], &[1, 0xE2, 0x07, 6, 8, 12, 0, 30, 0, 7]);
        assert_eq!(&payload[10..], b"Dentist");
    }

    #[test]
    fn test_music_state_flag() {
        assert_eq!(music_state(MusicPlayback::Playing, "A"), vec![0, b'A']);
        assert_eq!(music_state(MusicPlayback::Stopped, "A"), vec![1, b'A']);
    }

    #[test]
    fn test_settings() {
        assert_eq!(
            setting(&WatchSetting::ScreenOnTime(5)),
            (Command::DisplayTimeout, vec![10, 0])
        );
        assert_eq!(
            setting(&WatchSetting::ActivityTracking(true)),
            (Command::ControlDevice, vec![0x0A])
        );
        assert_eq!(
            setting(&WatchSetting::CaloriesType(CaloriesType::Total)),
            (Command::CaloriesType, vec![1])
        );
        assert_eq!(
            setting(&WatchSetting::TimeFormat(TimeFormat::TwelveHour)).1,
            vec![0xFF, 1, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );

        let dnd = DoNotDisturb {
            scheduled: true,
            start: NaiveTime::from_hms_opt(23, 15, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 45, 0).unwrap(),
        };
        assert_eq!(
            setting(&WatchSetting::DoNotDisturb(dnd)).1,
            vec![1, 23, 15, 6, 45]
        );

        let alert = InactivityAlert {
            enabled: true,
            threshold_minutes: 45,
            days: Weekdays::WORKDAYS,
        };
        assert_eq!(
            setting(&WatchSetting::InactivityAlert(alert)).1,
            vec![0x9F, 45, 0, 0, 0, 0, 0x64, 0]
        );
    }
}
