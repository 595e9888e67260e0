//! MyKronoz ZeTime driver.
//!
//! Every data write goes to the write characteristic in chunks and is
//! followed by a single `0x03` on the ack characteristic. Answers to
//! watch-initiated requests go to the reply characteristic without an ack.
//! Replies from the watch arrive on the ack characteristic; the notify
//! characteristic only carries music control.

pub mod commands;
pub mod records;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, trace};

use crate::ble::link::ChannelId;
use crate::ble::uuids::{
    ACK_CHARACTERISTIC_UUID, NOTIFY_CHARACTERISTIC_UUID, REPLY_CHARACTERISTIC_UUID,
    WRITE_CHARACTERISTIC_UUID,
};
use crate::config::EngineConfig;
use crate::data::{ActivitySample, BulkCategory, CallCommand, MusicCommand, VersionKind};
use crate::device::{DeviceContext, DeviceProtocol, Inbound};
use crate::engine::operation::DeviceOperation;
use crate::engine::session::SessionState;
use crate::engine::transaction::{Transaction, TransactionBuilder};
use crate::error::Result;
use crate::protocol::{fragment, ByteReader, Message, MessageKind};

pub use commands::Command;

/// Music control action selecting a volume change.
const MUSIC_ACTION_VOLUME: u8 = 4;

/// Protocol driver for ZeTime watches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeTimeProtocol;

impl ZeTimeProtocol {
    /// Create the driver.
    pub fn new() -> Self {
        Self
    }

    /// Append a message as data writes followed by an ack.
    fn send(&self, builder: &mut TransactionBuilder, message: &Message, config: &EngineConfig) {
        trace!("Sending {:02X?}", message.to_bytes());
        for chunk in fragment(message, config.max_chunk).iter() {
            builder.write(WRITE_CHARACTERISTIC_UUID, chunk);
        }
        builder.ack(ACK_CHARACTERISTIC_UUID, vec![commands::ACK_WRITE]);
    }

    /// Append a message as unacknowledged writes to the reply characteristic.
    fn reply(&self, builder: &mut TransactionBuilder, message: &Message, config: &EngineConfig) {
        for chunk in fragment(message, config.max_chunk).iter() {
            builder.write(REPLY_CHARACTERISTIC_UUID, chunk);
        }
    }

    fn request(command: Command, payload: Vec<u8>) -> Message {
        Message::fixed(command.to_raw(), MessageKind::Request, payload)
    }

    fn command(command: Command, payload: Vec<u8>) -> Message {
        Message::fixed(command.to_raw(), MessageKind::Send, payload)
    }

    fn music_state_message(context: &DeviceContext) -> Option<Result<Message>> {
        let track = context.music_track.as_deref()?;
        let state = context.music_state?;
        Some(Message::new(
            Command::MusicControl.to_raw(),
            MessageKind::Reply,
            commands::music_state(state, track),
        ))
    }

    fn classify_music(&self, message: &Message) -> Result<Inbound> {
        if message.kind() != MessageKind::Send {
            return Ok(Inbound::MusicStateQuery);
        }

        let mut reader = ByteReader::new(message.payload());
        let inbound = match reader.read_u8()? {
            0 => Inbound::MusicControl(MusicCommand::Play),
            1 => Inbound::MusicControl(MusicCommand::Pause),
            2 => Inbound::MusicControl(MusicCommand::Previous),
            3 => Inbound::MusicControl(MusicCommand::Next),
            MUSIC_ACTION_VOLUME => Inbound::MusicVolume {
                requested: reader.read_u8()?,
            },
            other => {
                debug!("Unknown music action {}", other);
                Inbound::Unhandled {
                    command: message.command(),
                }
            }
        };
        Ok(inbound)
    }
}

fn local_now() -> (NaiveDateTime, i32) {
    let now = Local::now();
    (now.naive_local(), now.offset().local_minus_utc())
}

impl DeviceProtocol for ZeTimeProtocol {
    fn name(&self) -> &'static str {
        "ZeTime"
    }

    fn write_channel(&self) -> ChannelId {
        WRITE_CHARACTERISTIC_UUID
    }

    fn initialize(&self, config: &EngineConfig, context: &DeviceContext) -> Result<Transaction> {
        let mut builder = TransactionBuilder::new("initialize");
        builder
            .notify(ACK_CHARACTERISTIC_UUID)
            .notify(NOTIFY_CHARACTERISTIC_UUID);

        self.send(&mut builder, &Self::request(Command::WatchId, vec![0]), config);
        for selector in [VersionKind::FIRMWARE_SELECTOR, VersionKind::HARDWARE_SELECTOR] {
            let message = Self::request(Command::DeviceVersion, vec![selector]);
            self.send(&mut builder, &message, config);
        }
        self.send(&mut builder, &Self::request(Command::BatteryPower, vec![0]), config);

        let user = Self::command(Command::UserInfo, commands::user_info(&config.user));
        self.send(&mut builder, &user, config);
        for goal in commands::goals(&config.goals) {
            self.send(&mut builder, &Self::command(Command::Goals, goal.to_vec()), config);
        }
        let limits = commands::heart_rate_limits(&config.heart_rate_limits);
        let limits = Self::command(Command::HeartRateAlarmLimits, limits.to_vec());
        self.send(&mut builder, &limits, config);

        self.send(&mut builder, &Self::request(Command::AvailableData, vec![0]), config);

        let (now, offset) = local_now();
        let time = Self::command(Command::DateTime, commands::time_sync(&now, offset));
        self.send(&mut builder, &time, config);

        let volume = Message::fixed(
            Command::MusicControl.to_raw(),
            MessageKind::Reply,
            commands::music_volume(context.music_volume).to_vec(),
        );
        self.reply(&mut builder, &volume, config);

        builder.set_state(SessionState::Initialized);
        Ok(builder.build())
    }

    fn classify(
        &self,
        channel: ChannelId,
        message: &Message,
        config: &EngineConfig,
    ) -> Result<Inbound> {
        let command = Command::from_raw(message.command());
        let payload = message.payload();
        let offset = config.timestamp_offset_secs;

        if channel == NOTIFY_CHARACTERISTIC_UUID {
            return match command {
                Command::MusicControl => self.classify_music(message),
                _ => Ok(Inbound::Unhandled {
                    command: message.command(),
                }),
            };
        }
        if channel != ACK_CHARACTERISTIC_UUID {
            debug!("Message on unexpected characteristic {}", channel);
            return Ok(Inbound::Unhandled {
                command: message.command(),
            });
        }

        let inbound = match command {
            Command::WatchId => Inbound::WatchIdentity(payload.to_vec()),
            Command::DeviceVersion => Inbound::Version(records::parse_version(payload)?),
            Command::BatteryPower => Inbound::Battery(records::parse_battery(payload)?),
            Command::AvailableData => Inbound::Summary(records::parse_summary(payload)?),
            Command::GetStep => Inbound::Records(vec![ActivitySample::Steps(
                records::parse_steps(payload, offset)?,
            )]),
            Command::GetSleep => Inbound::Records(vec![ActivitySample::Sleep(
                records::parse_sleep(payload, offset)?,
            )]),
            Command::GetHeartRateExData => Inbound::Records(
                records::parse_heart_rate(payload, offset)?
                    .into_iter()
                    .map(ActivitySample::HeartRate)
                    .collect(),
            ),
            Command::MusicControl => self.classify_music(message)?,
            _ => Inbound::Unhandled {
                command: message.command(),
            },
        };
        Ok(inbound)
    }

    fn append_fetch(
        &self,
        builder: &mut TransactionBuilder,
        category: BulkCategory,
        config: &EngineConfig,
    ) {
        let message = match category {
            BulkCategory::Steps => Self::request(Command::GetStep, vec![0, 0]),
            BulkCategory::Sleep => Self::request(Command::GetSleep, vec![0, 0]),
            BulkCategory::HeartRate => Self::request(Command::GetHeartRateExData, vec![0]),
        };
        self.send(builder, &message, config);
    }

    fn append_delete(
        &self,
        builder: &mut TransactionBuilder,
        category: BulkCategory,
        config: &EngineConfig,
    ) {
        let command = match category {
            BulkCategory::Steps => Command::DeleteStep,
            BulkCategory::Sleep => Command::DeleteSleep,
            BulkCategory::HeartRate => Command::DeleteHeartRate,
        };
        self.send(builder, &Self::command(command, vec![0]), config);
    }

    fn music_volume_reply(&self, volume: u8, config: &EngineConfig) -> Transaction {
        let mut builder = TransactionBuilder::new("replyMusicVolume");
        let message = Message::fixed(
            Command::MusicControl.to_raw(),
            MessageKind::Reply,
            commands::music_volume(volume).to_vec(),
        );
        self.reply(&mut builder, &message, config);
        builder.build()
    }

    fn music_state_reply(
        &self,
        context: &DeviceContext,
        config: &EngineConfig,
    ) -> Option<Transaction> {
        let message = match Self::music_state_message(context)? {
            Ok(message) => message,
            Err(e) => {
                debug!("Music state not sent: {}", e);
                return None;
            }
        };
        let mut builder = TransactionBuilder::new("replyMusicState");
        self.reply(&mut builder, &message, config);
        Some(builder.build())
    }

    fn build_operation(
        &self,
        operation: &DeviceOperation,
        config: &EngineConfig,
        context: &mut DeviceContext,
    ) -> Result<Option<Transaction>> {
        let mut builder = TransactionBuilder::new(operation.name());

        match operation {
            DeviceOperation::SendNotification(spec) => {
                let message = Message::new(
                    Command::PushExMessage.to_raw(),
                    MessageKind::Send,
                    commands::notification(spec),
                )?;
                self.send(&mut builder, &message, config);
            }
            DeviceOperation::SetCallState(spec) => {
                let payload = if spec.command == CallCommand::Incoming {
                    context.call_incoming = true;
                    commands::incoming_call(spec)
                } else if context.call_incoming {
                    context.call_incoming = false;
                    commands::call_off(&spec.timestamp)
                } else {
                    debug!("No incoming call shown, ignoring {:?}", spec.command);
                    return Ok(None);
                };
                let message = Message::new(Command::PushExMessage.to_raw(), MessageKind::Send, payload)?;
                self.send(&mut builder, &message, config);
            }
            DeviceOperation::SendWeather(spec) => {
                let new_icons =
                    commands::uses_new_weather_icons(context.firmware_version.as_deref());
                let message = Message::new(
                    Command::PushWeather.to_raw(),
                    MessageKind::Send,
                    commands::weather(spec, new_icons)?,
                )?;
                self.send(&mut builder, &message, config);
            }
            DeviceOperation::AddCalendarEvent(spec) => {
                let message = Self::command(Command::PushCalendarDay, commands::calendar_event(spec));
                self.send(&mut builder, &message, config);
            }
            DeviceOperation::SetTime => {
                let (now, offset) = local_now();
                let message = Self::command(Command::DateTime, commands::time_sync(&now, offset));
                self.send(&mut builder, &message, config);
            }
            DeviceOperation::FetchHistory => {
                self.send(&mut builder, &Self::request(Command::AvailableData, vec![0]), config);
            }
            DeviceOperation::RequestBattery => {
                self.send(&mut builder, &Self::request(Command::BatteryPower, vec![0]), config);
            }
            DeviceOperation::SetMusicInfo { track } => {
                context.music_track = Some(track.clone());
                return self.music_update(builder, context, config);
            }
            DeviceOperation::SetMusicState(state) => {
                context.music_state = Some(*state);
                return self.music_update(builder, context, config);
            }
            DeviceOperation::SetHeartRateInterval { seconds } => {
                let payload = commands::auto_heart_rate(*seconds).to_vec();
                self.send(&mut builder, &Self::command(Command::AutoHeartRate, payload), config);
            }
            DeviceOperation::Configure(setting) => {
                let (command, payload) = commands::setting(setting);
                self.send(&mut builder, &Self::command(command, payload), config);
            }
        }

        Ok(Some(builder.build()))
    }
}

impl ZeTimeProtocol {
    fn music_update(
        &self,
        mut builder: TransactionBuilder,
        context: &DeviceContext,
        config: &EngineConfig,
    ) -> Result<Option<Transaction>> {
        match Self::music_state_message(context) {
            Some(message) => {
                self.reply(&mut builder, &message?, config);
                Ok(Some(builder.build()))
            }
            None => Ok(None),
        }
    }
}
