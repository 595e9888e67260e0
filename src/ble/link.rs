//! The transport seam between the engine and a BLE stack.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LinkError;

/// Identifies a GATT characteristic.
pub type ChannelId = Uuid;

/// Writes and subscriptions on a connected peripheral.
///
/// Inbound data travels the other way, through
/// [`Engine::on_characteristic_changed`](crate::engine::Engine::on_characteristic_changed).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkAdapter: Send + Sync {
    /// Write bytes to a characteristic.
    async fn write_characteristic(&self, channel: ChannelId, data: &[u8]) -> Result<(), LinkError>;

    /// Enable notifications on a characteristic.
    async fn subscribe_notifications(&self, channel: ChannelId) -> Result<(), LinkError>;
}
