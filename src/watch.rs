//! Watch handle.
//!
//! Ties a btleplug peripheral, its connection, its GATT link and a protocol
//! engine together.

use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ble::characteristics::{GattLink, NotificationEvent};
use crate::ble::connection::{ConnectionManager, ConnectionState};
use crate::ble::scanner::WatchDiscoveryEvent;
use crate::ble::uuids::{ACK_CHARACTERISTIC_UUID, WRITE_CHARACTERISTIC_UUID};
use crate::config::EngineConfig;
use crate::data::{
    BulkCategory, CalendarEventSpec, CallSpec, MusicPlayback, NotificationSpec, WatchSetting,
    WeatherSpec,
};
use crate::device::{DeviceContext, ZeTimeProtocol};
use crate::engine::{
    DeviceEvent, DeviceOperation, Engine, ProgressCounter, SessionState, TransactionHandle,
};
use crate::error::{Error, Result};

/// How often the link is polled for a silent disconnect.
const LINK_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// A ZeTime watch.
pub struct Watch {
    identifier: String,
    name: Option<String>,
    connection: ConnectionManager,
    engine: Arc<Engine<ZeTimeProtocol>>,
    link: RwLock<Option<Arc<GattLink>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Watch {
    /// Create a handle for a peripheral.
    pub fn new(peripheral: Peripheral, config: EngineConfig) -> Self {
        Self {
            identifier: peripheral.id().to_string(),
            name: None,
            connection: ConnectionManager::new(peripheral),
            engine: Arc::new(Engine::new(ZeTimeProtocol::new(), config)),
            link: RwLock::new(None),
            pump: Mutex::new(None),
        }
    }

    /// Create a handle for a scan result.
    pub fn from_discovery(event: &WatchDiscoveryEvent, config: EngineConfig) -> Self {
        let mut watch = Self::new(event.peripheral.clone(), config);
        watch.name = event.local_name.clone();
        watch
    }

    /// Peripheral identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Advertised name, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The protocol engine.
    pub fn engine(&self) -> &Arc<Engine<ZeTimeProtocol>> {
        &self.engine
    }

    /// Transport connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Session state.
    pub fn session_state(&self) -> SessionState {
        self.engine.session_state()
    }

    /// Subscribe to watch events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.engine.subscribe()
    }

    /// Progress of one history category.
    pub fn progress(&self, category: BulkCategory) -> ProgressCounter {
        self.engine.progress(category)
    }

    /// What is known about the watch.
    pub fn device_context(&self) -> DeviceContext {
        self.engine.device_context()
    }

    /// Connect and start the session.
    ///
    /// Returns the handle of the initialization transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the watch lacks the
    /// ZeTime characteristics.
    pub async fn connect(&self, maintain: bool) -> Result<TransactionHandle> {
        self.connection.connect(maintain).await?;
        self.start_session().await
    }

    async fn start_session(&self) -> Result<TransactionHandle> {
        let peripheral = self.connection.peripheral().clone();
        let link = Arc::new(GattLink::new(peripheral.clone()));
        link.discover_characteristics();

        for uuid in [WRITE_CHARACTERISTIC_UUID, ACK_CHARACTERISTIC_UUID] {
            if !link.has_characteristic(&uuid) {
                return Err(Error::ConnectionFailed {
                    reason: format!("Characteristic {} missing, not a ZeTime?", uuid),
                });
            }
        }

        let notifications = link.notifications();
        link.start_notifications().await?;

        let pump = tokio::spawn(Self::pump(self.engine.clone(), notifications, peripheral));
        if let Some(old) = self.pump.lock().replace(pump) {
            old.abort();
        }
        if let Some(old) = self.link.write().replace(link.clone()) {
            old.stop_notifications();
        }

        info!("Starting session with {}", self.identifier);
        self.engine.on_connected(link)
    }

    /// Forward notifications into the engine until the link goes away.
    async fn pump(
        engine: Arc<Engine<ZeTimeProtocol>>,
        mut notifications: broadcast::Receiver<NotificationEvent>,
        peripheral: Peripheral,
    ) {
        let mut check = tokio::time::interval(LINK_CHECK_INTERVAL);

        loop {
            tokio::select! {
                received = notifications.recv() => match received {
                    Ok(event) => {
                        if let Err(e) = engine.on_characteristic_changed(event.characteristic_uuid, &event.data) {
                            warn!("Dropped notification from {}: {}", event.characteristic_uuid, e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Missed {} notifications, resynchronizing", missed);
                        engine.reset_reassembly();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = check.tick() => {
                    if !peripheral.is_connected().await.unwrap_or(false) {
                        info!("Watch link lost");
                        break;
                    }
                }
            }
        }

        engine.on_disconnected();
        debug!("Notification pump stopped");
    }

    /// Handle a link loss, reconnecting if the connection is maintained.
    ///
    /// Returns the new initialization handle when reconnected.
    pub async fn handle_link_lost(&self) -> Option<TransactionHandle> {
        self.engine.on_disconnected();
        if !self.connection.handle_disconnection().await {
            return None;
        }
        match self.start_session().await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Session restart failed: {}", e);
                None
            }
        }
    }

    /// End the session and disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        if let Some(link) = self.link.write().take() {
            link.stop_notifications();
        }
        self.engine.on_disconnected();
        self.connection.disconnect().await
    }

    /// Submit a request to the watch.
    pub fn submit(&self, operation: DeviceOperation) -> Result<Option<TransactionHandle>> {
        self.engine.submit_command(operation)
    }

    /// Submit a request and wait until it was written.
    pub async fn submit_and_wait(&self, operation: DeviceOperation) -> Result<()> {
        self.engine.submit_command_and_wait(operation).await
    }

    /// Fetch all pending history.
    pub async fn fetch_history(&self) -> Result<()> {
        self.submit_and_wait(DeviceOperation::FetchHistory).await
    }

    /// Ask for a battery report.
    pub async fn request_battery(&self) -> Result<()> {
        self.submit_and_wait(DeviceOperation::RequestBattery).await
    }

    /// Synchronize the watch clock.
    pub async fn set_time(&self) -> Result<()> {
        self.submit_and_wait(DeviceOperation::SetTime).await
    }

    /// Mirror a notification.
    pub async fn send_notification(&self, spec: NotificationSpec) -> Result<()> {
        self.submit_and_wait(DeviceOperation::SendNotification(spec))
            .await
    }

    /// Report a call state change.
    pub async fn set_call_state(&self, spec: CallSpec) -> Result<()> {
        self.submit_and_wait(DeviceOperation::SetCallState(spec)).await
    }

    /// Push weather.
    pub async fn send_weather(&self, spec: WeatherSpec) -> Result<()> {
        self.submit_and_wait(DeviceOperation::SendWeather(spec)).await
    }

    /// Push a calendar entry.
    pub async fn add_calendar_event(&self, spec: CalendarEventSpec) -> Result<()> {
        self.submit_and_wait(DeviceOperation::AddCalendarEvent(spec))
            .await
    }

    /// Update the track title.
    pub async fn set_music_info(&self, track: impl Into<String>) -> Result<()> {
        self.submit_and_wait(DeviceOperation::SetMusicInfo {
            track: track.into(),
        })
        .await
    }

    /// Update the player state.
    pub async fn set_music_state(&self, state: MusicPlayback) -> Result<()> {
        self.submit_and_wait(DeviceOperation::SetMusicState(state))
            .await
    }

    /// Set the heart rate measurement interval.
    pub async fn set_heart_rate_interval(&self, seconds: u32) -> Result<()> {
        self.submit_and_wait(DeviceOperation::SetHeartRateInterval { seconds })
            .await
    }

    /// Change a preference.
    pub async fn configure(&self, setting: WatchSetting) -> Result<()> {
        self.submit_and_wait(DeviceOperation::Configure(setting))
            .await
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("identifier", &self.identifier)
            .field("name", &self.name)
            .field("connection", &self.connection_state())
            .field("session", &self.session_state())
            .finish()
    }
}
