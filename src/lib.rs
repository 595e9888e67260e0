// Allow holding locks across await points - we use parking_lot which is designed for this
#![allow(clippy::await_holding_lock)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # zetime-rust-ble
//!
//! A cross-platform Rust library for talking to MyKronoz ZeTime smartwatches
//! over Bluetooth Low Energy.
//!
//! ## Features
//!
//! - **Watch Discovery**: Find nearby ZeTime watches by name or service
//! - **History Download**: Steps, sleep and heart rate records, fetched one
//!   category at a time and optionally deleted from the watch afterwards
//! - **Push Content**: Notifications, calls, weather and calendar entries
//! - **Music Remote**: Play, pause, skip and volume control from the watch
//! - **Preferences**: Wrist, screen timeout, do-not-disturb and more
//!
//! The protocol engine ([`Engine`]) is transport agnostic: anything that
//! implements [`LinkAdapter`] can carry its writes, and notifications are fed
//! back through [`Engine::on_characteristic_changed`]. [`Watch`] wires the
//! engine to a btleplug peripheral.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use zetime_rust_ble::{DeviceEvent, EngineConfig, Result, Watch, WatchScanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let scanner = WatchScanner::new().await?;
//!     let found = scanner.find_first(Duration::from_secs(10)).await?;
//!
//!     let watch = Watch::from_discovery(&found, EngineConfig::default());
//!     let mut events = watch.subscribe();
//!     watch.connect(true).await?.wait().await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let DeviceEvent::Sample(sample) = event {
//!             println!("{:?}", sample);
//!         }
//!     }
//!
//!     watch.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod device;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod utils;
pub mod watch;

// Re-exports for convenience
pub use ble::connection::ConnectionState;
pub use ble::link::{ChannelId, LinkAdapter};
pub use ble::scanner::{WatchDiscoveryEvent, WatchScanner};
pub use config::{ActivityGoals, EngineConfig, Gender, HeartRateLimits, UserProfile};
pub use device::{DeviceContext, DeviceProtocol, ZeTimeProtocol};
pub use engine::{
    DeviceEvent, DeviceOperation, Engine, ProgressCounter, SessionState, TransactionHandle,
};
pub use error::{Error, FrameError, FramingError, LinkError, Result};
pub use utils::{celsius_to_i8, truncate_utf8};
pub use watch::Watch;

// Re-export commonly used types from submodules
pub use data::{
    ActivitySample, BatteryInfo, BulkCategory, CalendarEventSpec, CallCommand, CallSpec,
    DataSummary, HeartRateSample, MusicCommand, MusicPlayback, NotificationKind,
    NotificationSpec, SleepKind, SleepSample, StepSample, VersionInfo, WatchSetting,
    WeatherCondition, WeatherForecast, WeatherSpec,
};
