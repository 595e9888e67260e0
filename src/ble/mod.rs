//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy side of a watch session:
//! discovery, connection management and the GATT link the engine writes to.

pub mod characteristics;
pub mod connection;
pub mod link;
pub mod scanner;
pub mod uuids;

pub use characteristics::{GattLink, NotificationEvent};
pub use connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use link::{ChannelId, LinkAdapter};
pub use scanner::{WatchDiscoveryEvent, WatchScanner};
pub use uuids::*;
