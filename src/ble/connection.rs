//! BLE connection management.
//!
//! Connects to a watch with bounded retries, discovers its services and
//! reports connection state changes.

use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Default number of connection attempts when the connection is maintained.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;

/// Default pause between connection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Transport-level connection state of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected with services discovered.
    Connected,
    /// Currently disconnecting.
    Disconnecting,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Event for connection state changes.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    /// The identifier of the peripheral.
    pub identifier: String,
    /// The new connection state.
    pub state: ConnectionState,
}

/// Retry policy for connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts when the connection is maintained.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl ReconnectPolicy {
    /// Number of attempts for one connect call.
    pub fn attempts(&self, maintain: bool) -> u32 {
        if maintain {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Manages the connection to one watch.
pub struct ConnectionManager {
    /// The peripheral to manage.
    peripheral: Peripheral,
    /// Current connection state.
    state: Arc<RwLock<ConnectionState>>,
    /// Whether to maintain the connection (auto-reconnect).
    maintain_connection: Arc<RwLock<bool>>,
    /// Channel for connection events.
    event_tx: broadcast::Sender<ConnectionEvent>,
    /// Retry policy.
    policy: ReconnectPolicy,
}

impl ConnectionManager {
    /// Create a new connection manager for a peripheral.
    pub fn new(peripheral: Peripheral) -> Self {
        let (event_tx, _) = broadcast::channel(16);

        Self {
            peripheral,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            maintain_connection: Arc::new(RwLock::new(false)),
            event_tx,
            policy: ReconnectPolicy::default(),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribe to connection events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_tx.subscribe()
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Connect and discover services.
    ///
    /// With `maintain` set, up to [`ReconnectPolicy::max_attempts`] attempts
    /// are made and [`handle_disconnection`](Self::handle_disconnection)
    /// reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] when every attempt failed or
    /// another connect is in progress.
    pub async fn connect(&self, maintain: bool) -> Result<()> {
        let current_state = self.state();

        if current_state.is_connected() {
            debug!("Already connected");
            return Ok(());
        }

        if current_state.is_transitioning() {
            return Err(Error::ConnectionFailed {
                reason: "Connection already in progress".to_string(),
            });
        }

        *self.maintain_connection.write() = maintain;
        self.set_state(ConnectionState::Connecting);

        let max_attempts = self.policy.attempts(maintain);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!("Connection attempt {} of {}", attempt, max_attempts);

            match self.try_connect().await {
                Ok(()) => {
                    info!("Connected to watch");
                    self.set_state(ConnectionState::Connected);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Err(Error::ConnectionFailed {
            reason: match last_error {
                Some(e) => format!("Failed after {} attempts: {}", max_attempts, e),
                None => format!("Failed after {} attempts", max_attempts),
            },
        })
    }

    async fn try_connect(&self) -> std::result::Result<(), btleplug::Error> {
        if !self.peripheral.is_connected().await.unwrap_or(false) {
            self.peripheral.connect().await?;
        } else {
            debug!("Peripheral already connected at BLE level");
        }
        self.peripheral.discover_services().await
    }

    /// Disconnect from the watch.
    pub async fn disconnect(&self) -> Result<()> {
        *self.maintain_connection.write() = false;

        if matches!(
            self.state(),
            ConnectionState::Disconnected | ConnectionState::Disconnecting
        ) {
            return Ok(());
        }

        self.set_state(ConnectionState::Disconnecting);

        let result = self.peripheral.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
        match result {
            Ok(()) => {
                info!("Disconnected from watch");
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect: {}", e);
                Err(Error::Bluetooth(e))
            }
        }
    }

    /// Check if we're maintaining the connection.
    pub fn is_maintaining_connection(&self) -> bool {
        *self.maintain_connection.read()
    }

    /// Set the reconnection parameters.
    pub fn set_reconnect_params(&mut self, max_attempts: u32, delay: Duration) {
        self.policy = ReconnectPolicy {
            max_attempts,
            delay,
        };
    }

    /// Current retry policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Handle a link loss detected elsewhere.
    ///
    /// Returns `true` if the connection was re-established.
    pub async fn handle_disconnection(&self) -> bool {
        self.set_state(ConnectionState::Disconnected);
        if !self.is_maintaining_connection() {
            return false;
        }

        info!("Connection lost, attempting to reconnect...");
        match self.connect(true).await {
            Ok(()) => true,
            Err(e) => {
                error!("Reconnection failed: {}", e);
                false
            }
        }
    }

    /// Update the connection state and emit an event.
    fn set_state(&self, new_state: ConnectionState) {
        let old_state = std::mem::replace(&mut *self.state.write(), new_state);

        if old_state != new_state {
            debug!("Connection state changed: {} -> {}", old_state, new_state);

            let _ = self.event_tx.send(ConnectionEvent {
                identifier: self.peripheral.id().to_string(),
                state: new_state,
            });
        }
    }
}
