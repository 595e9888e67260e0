//! Content pushed from the host to the watch.
//!
//! These types describe what to show; how each watch family encodes them is
//! up to its driver.

use chrono::{Local, NaiveDateTime};

/// Source application of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NotificationKind {
    /// Text message.
    Sms,
    /// Missed phone call.
    MissedCall,
    /// Any mail client.
    Email,
    /// Calendar reminder.
    Calendar,
    /// WeChat.
    WeChat,
    /// Viber.
    Viber,
    /// WhatsApp.
    WhatsApp,
    /// Facebook or Facebook Messenger.
    Facebook,
    /// Google Hangouts.
    Hangouts,
    /// LINE.
    Line,
    /// Skype.
    Skype,
    /// Any other chat application.
    Messenger,
    /// Snapchat.
    Snapchat,
    /// Instagram.
    Instagram,
    /// Twitter.
    Twitter,
    /// LinkedIn.
    LinkedIn,
    /// Everything else.
    #[default]
    Other,
}

/// A notification to mirror on the watch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationSpec {
    /// Source application.
    pub kind: NotificationKind,
    /// Sender display name.
    pub sender: Option<String>,
    /// Sender phone number.
    pub phone_number: Option<String>,
    /// Message subject.
    pub subject: Option<String>,
    /// Notification title.
    pub title: Option<String>,
    /// Message body.
    pub body: String,
    /// Time shown on the watch.
    pub timestamp: NaiveDateTime,
}

impl NotificationSpec {
    /// Create a notification stamped with the current local time.
    pub fn new(kind: NotificationKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            sender: None,
            phone_number: None,
            subject: None,
            title: None,
            body: body.into(),
            timestamp: Local::now().naive_local(),
        }
    }

    /// Set the sender.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Set the phone number.
    pub fn with_phone_number(mut self, number: impl Into<String>) -> Self {
        self.phone_number = Some(number.into());
        self
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Heading shown above the body.
    ///
    /// Picks the first present of sender, phone number, subject and title.
    pub fn heading(&self) -> Option<&str> {
        self.sender
            .as_deref()
            .or(self.phone_number.as_deref())
            .or(self.subject.as_deref())
            .or(self.title.as_deref())
    }
}

/// Phone call state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallCommand {
    /// The phone is ringing.
    Incoming,
    /// An outgoing call started.
    Outgoing,
    /// The call was picked up.
    Accepted,
    /// The call was rejected.
    Rejected,
    /// The call ended.
    Ended,
}

/// A phone call event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallSpec {
    /// What happened.
    pub command: CallCommand,
    /// Caller name.
    pub name: Option<String>,
    /// Caller number.
    pub number: Option<String>,
    /// Time shown on the watch.
    pub timestamp: NaiveDateTime,
}

impl CallSpec {
    /// Create a call event stamped with the current local time.
    pub fn new(command: CallCommand) -> Self {
        Self {
            command,
            name: None,
            number: None,
            timestamp: Local::now().naive_local(),
        }
    }

    /// Create an incoming call event.
    pub fn incoming(name: Option<String>, number: Option<String>) -> Self {
        Self {
            name,
            number,
            ..Self::new(CallCommand::Incoming)
        }
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Caller shown on the watch: name, else number.
    pub fn caller(&self) -> Option<&str> {
        self.name.as_deref().or(self.number.as_deref())
    }
}

/// Weather condition, independent of any icon set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeatherCondition {
    /// Clear sky.
    Clear,
    /// Some clouds.
    PartlyCloudy,
    /// Mostly cloudy.
    Cloudy,
    /// Fully overcast.
    Overcast,
    /// Light rain or drizzle.
    Drizzle,
    /// Rain.
    Rain,
    /// Heavy rain or showers.
    HeavyRain,
    /// Thunderstorm.
    Thunderstorm,
    /// Snow.
    Snow,
    /// Sleet or freezing rain.
    Sleet,
    /// Fog, mist or haze.
    Fog,
    /// Strong wind.
    Windy,
    /// Unknown condition.
    #[default]
    Unknown,
}

/// One forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeatherForecast {
    /// Minimum temperature in Celsius.
    pub min_celsius: f32,
    /// Maximum temperature in Celsius.
    pub max_celsius: f32,
    /// Expected condition.
    pub condition: WeatherCondition,
}

/// Current weather with a short forecast.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeatherSpec {
    /// Location name.
    pub location: String,
    /// Current temperature in Celsius.
    pub current_celsius: f32,
    /// Today's minimum in Celsius.
    pub today_min_celsius: f32,
    /// Today's maximum in Celsius.
    pub today_max_celsius: f32,
    /// Current condition.
    pub condition: WeatherCondition,
    /// Upcoming days, nearest first.
    pub forecasts: Vec<WeatherForecast>,
}

/// A calendar entry to push to the watch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalendarEventSpec {
    /// Vendor event type.
    pub event_type: u8,
    /// Event title.
    pub title: String,
    /// Local start time.
    pub start: NaiveDateTime,
}

/// Host media player state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MusicPlayback {
    /// Playing.
    Playing,
    /// Paused.
    Paused,
    /// Stopped.
    Stopped,
}

impl MusicPlayback {
    /// Check if music is playing.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}
