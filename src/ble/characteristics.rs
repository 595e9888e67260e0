//! GATT characteristic handling.
//!
//! [`GattLink`] caches the characteristics of a connected watch, carries the
//! engine's writes and subscriptions, and republishes notifications on a
//! broadcast channel.

use async_trait::async_trait;
use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::ble::link::{ChannelId, LinkAdapter};
use crate::error::LinkError;

/// Notification event from a characteristic.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// UUID of the characteristic that sent the notification.
    pub characteristic_uuid: Uuid,
    /// The notification data.
    pub data: Vec<u8>,
}

/// Pick the write type a characteristic supports, preferring no response.
pub fn write_type_for(properties: CharPropFlags) -> WriteType {
    if properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        WriteType::WithoutResponse
    } else {
        WriteType::WithResponse
    }
}

/// btleplug-backed [`LinkAdapter`] for one watch.
pub struct GattLink {
    /// The peripheral to communicate with.
    peripheral: Peripheral,
    /// Cached characteristics by UUID.
    characteristics: Arc<RwLock<HashMap<Uuid, Characteristic>>>,
    /// Channel for notification events.
    notification_tx: broadcast::Sender<NotificationEvent>,
    /// Handle to the notification listener task.
    listener_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl GattLink {
    /// Create a link for a connected peripheral.
    ///
    /// Services must be discovered before calling
    /// [`discover_characteristics`](Self::discover_characteristics).
    pub fn new(peripheral: Peripheral) -> Self {
        let (notification_tx, _) = broadcast::channel(256);

        Self {
            peripheral,
            characteristics: Arc::new(RwLock::new(HashMap::new())),
            notification_tx,
            listener_handle: RwLock::new(None),
        }
    }

    /// Discover and cache all characteristics.
    pub fn discover_characteristics(&self) -> usize {
        let services = self.peripheral.services();

        let mut chars = self.characteristics.write();
        chars.clear();

        for service in services {
            for characteristic in service.characteristics {
                debug!(
                    "Found characteristic: {} in service {}",
                    characteristic.uuid, service.uuid
                );
                chars.insert(characteristic.uuid, characteristic);
            }
        }

        debug!("Discovered {} characteristics", chars.len());
        chars.len()
    }

    /// Check if a characteristic exists.
    pub fn has_characteristic(&self, uuid: &Uuid) -> bool {
        self.characteristics.read().contains_key(uuid)
    }

    fn characteristic(&self, uuid: &Uuid) -> Result<Characteristic, LinkError> {
        self.characteristics
            .read()
            .get(uuid)
            .cloned()
            .ok_or_else(|| LinkError::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    /// Start republishing notifications.
    ///
    /// Notifications will be sent through the channel returned by
    /// [`notifications`](Self::notifications).
    pub async fn start_notifications(&self) -> Result<(), LinkError> {
        if self.listener_handle.read().is_some() {
            return Ok(());
        }

        let mut stream = self.peripheral.notifications().await?;
        let notification_tx = self.notification_tx.clone();

        let handle = tokio::spawn(async move {
            debug!("Notification listener started");

            while let Some(notification) = stream.next().await {
                trace!(
                    "Notification from {}: {:02X?}",
                    notification.uuid,
                    notification.value
                );

                let event = NotificationEvent {
                    characteristic_uuid: notification.uuid,
                    data: notification.value,
                };
                if notification_tx.send(event).is_err() {
                    trace!("No notification receivers");
                }
            }

            debug!("Notification stream ended");
        });

        *self.listener_handle.write() = Some(handle);
        Ok(())
    }

    /// Stop republishing notifications.
    pub fn stop_notifications(&self) {
        if let Some(handle) = self.listener_handle.write().take() {
            handle.abort();
        }
    }

    /// Get a receiver for notification events.
    pub fn notifications(&self) -> broadcast::Receiver<NotificationEvent> {
        self.notification_tx.subscribe()
    }

    /// Unsubscribe from notifications from a characteristic.
    pub async fn unsubscribe(&self, uuid: &Uuid) -> Result<(), LinkError> {
        let characteristic = self.characteristic(uuid)?;
        self.peripheral.unsubscribe(&characteristic).await?;
        debug!("Unsubscribed from notifications from {}", uuid);
        Ok(())
    }
}

#[async_trait]
impl LinkAdapter for GattLink {
    async fn write_characteristic(&self, channel: ChannelId, data: &[u8]) -> Result<(), LinkError> {
        let characteristic = self.characteristic(&channel)?;
        let write_type = write_type_for(characteristic.properties);

        self.peripheral
            .write(&characteristic, data, write_type)
            .await?;

        trace!("Wrote {} bytes to characteristic {}", data.len(), channel);
        Ok(())
    }

    async fn subscribe_notifications(&self, channel: ChannelId) -> Result<(), LinkError> {
        let characteristic = self.characteristic(&channel).map_err(|e| {
            let chars = self.characteristics.read();
            for uuid in chars.keys() {
                debug!("  Available characteristic: {}", uuid);
            }
            e
        })?;

        self.peripheral.subscribe(&characteristic).await.map_err(|e| {
            error!("Failed to subscribe to {}: {}", channel, e);
            LinkError::from(e)
        })?;

        debug!("Subscribed to notifications from {}", channel);
        Ok(())
    }
}

impl Drop for GattLink {
    fn drop(&mut self) {
        self.stop_notifications();
    }
}
