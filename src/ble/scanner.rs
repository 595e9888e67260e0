//! BLE scanning functionality.
//!
//! Finds ZeTime watches by advertised name or service.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::ble::uuids::{is_zetime_name, is_zetime_service};
use crate::error::{Error, Result};

/// Event emitted when a watch is discovered or updated.
#[derive(Debug, Clone)]
pub struct WatchDiscoveryEvent {
    /// The BLE peripheral identifier.
    pub identifier: String,
    /// The peripheral handle.
    pub peripheral: Peripheral,
    /// Advertised local name.
    pub local_name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

/// Check advertisement data for a ZeTime.
pub fn is_zetime_advertisement(local_name: Option<&str>, services: &[Uuid]) -> bool {
    local_name.map(is_zetime_name).unwrap_or(false) || services.iter().any(is_zetime_service)
}

/// BLE scanner for discovering ZeTime watches.
pub struct WatchScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Discovered watches.
    discovered: Arc<RwLock<HashMap<String, WatchDiscoveryEvent>>>,
    /// Channel for discovery events.
    event_tx: broadcast::Sender<WatchDiscoveryEvent>,
    /// Handle to the scanning task.
    scan_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl WatchScanner {
    /// Create a scanner on the first Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            adapter,
            discovered: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            scan_handle: RwLock::new(None),
        }
    }

    /// Start scanning for watches.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning cannot be started.
    pub async fn start_scanning(&self) -> Result<()> {
        if self.is_scanning() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!("Starting BLE scan for ZeTime watches");

        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let discovered = self.discovered.clone();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    CentralEvent::DeviceDiscovered(id)
                    | CentralEvent::DeviceUpdated(id)
                    | CentralEvent::ServicesAdvertisement { id, .. } => {
                        Self::process_peripheral(&adapter, id, &discovered, &event_tx).await;
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        debug!("Device disconnected: {:?}", id);
                    }
                    _ => {}
                }
            }
            error!("Adapter event stream ended");
        });

        *self.scan_handle.write() = Some(handle);
        Ok(())
    }

    /// Stop scanning.
    pub async fn stop_scanning(&self) -> Result<()> {
        let Some(handle) = self.scan_handle.write().take() else {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        };

        info!("Stopping BLE scan");
        handle.abort();
        self.adapter.stop_scan().await?;
        Ok(())
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        self.scan_handle.read().is_some()
    }

    /// Get all discovered watches.
    pub fn discovered_watches(&self) -> HashMap<String, WatchDiscoveryEvent> {
        self.discovered.read().clone()
    }

    /// Subscribe to discovery events.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchDiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Scan until the first watch shows up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] if nothing is found within `timeout`.
    pub async fn find_first(&self, timeout: Duration) -> Result<WatchDiscoveryEvent> {
        let mut rx = self.subscribe();
        self.start_scanning().await?;

        if let Some(event) = self.discovered.read().values().next().cloned() {
            return Ok(event);
        }

        let found = tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .await;

        match found {
            Ok(Some(event)) => Ok(event),
            _ => Err(Error::ConnectionFailed {
                reason: format!("No ZeTime watch found within {:?}", timeout),
            }),
        }
    }

    async fn process_peripheral(
        adapter: &Adapter,
        id: PeripheralId,
        discovered: &RwLock<HashMap<String, WatchDiscoveryEvent>>,
        event_tx: &broadcast::Sender<WatchDiscoveryEvent>,
    ) {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        if !is_zetime_advertisement(properties.local_name.as_deref(), &properties.services) {
            return;
        }

        let identifier = id.to_string();
        let first_seen = !discovered.read().contains_key(&identifier);
        if first_seen {
            info!(
                "Found watch {} ({})",
                properties.local_name.as_deref().unwrap_or("unnamed"),
                identifier
            );
        }

        let event = WatchDiscoveryEvent {
            identifier: identifier.clone(),
            peripheral,
            local_name: properties.local_name,
            rssi: properties.rssi,
        };

        discovered.write().insert(identifier, event.clone());
        let _ = event_tx.send(event);
    }
}

impl Drop for WatchScanner {
    fn drop(&mut self) {
        if let Some(handle) = self.scan_handle.get_mut().take() {
            handle.abort();
        }
    }
}
