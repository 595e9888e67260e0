//! Device session engine.
//!
//! The [`Engine`] owns the session state, the transaction queue and its
//! executor. A link layer feeds it connection changes and characteristic
//! notifications; the application submits [`DeviceOperation`]s and listens
//! for [`DeviceEvent`]s.

pub mod dispatcher;
pub mod events;
pub mod operation;
pub mod progress;
pub mod queue;
pub mod session;
pub mod state;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::ble::link::{ChannelId, LinkAdapter};
use crate::config::EngineConfig;
use crate::data::BulkCategory;
use crate::device::{DeviceContext, DeviceProtocol};
use crate::error::{Error, Result};
use crate::protocol::validate;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use events::DeviceEvent;
pub use operation::DeviceOperation;
pub use progress::{ProgressCounter, ProgressTracker};
pub use queue::{Executor, TransactionHandle, TransactionQueue};
pub use session::{SessionState, SessionStateMachine};
pub use state::EngineState;
pub use transaction::{Step, Transaction, TransactionBuilder};

/// Protocol engine for one watch.
pub struct Engine<P: DeviceProtocol> {
    protocol: P,
    config: EngineConfig,
    state: Arc<RwLock<EngineState>>,
    queue: TransactionQueue,
    events: broadcast::Sender<DeviceEvent>,
    executor: Mutex<Option<JoinHandle<()>>>,
}

impl<P: DeviceProtocol> Engine<P> {
    /// Create a disconnected engine.
    pub fn new(protocol: P, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let state = EngineState::new(config.max_chunk, config.initial_music_volume);

        Self {
            protocol,
            config,
            state: Arc::new(RwLock::new(state)),
            queue: TransactionQueue::new(),
            events,
            executor: Mutex::new(None),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Device protocol driver.
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.state.read().session.state()
    }

    /// Progress counter of one category.
    pub fn progress(&self, category: BulkCategory) -> ProgressCounter {
        self.state.read().progress.counter(category)
    }

    /// Category being fetched, if any.
    pub fn active_fetch(&self) -> Option<BulkCategory> {
        self.state.read().progress.active()
    }

    /// Snapshot of what the driver knows about the watch.
    pub fn device_context(&self) -> DeviceContext {
        self.state.read().device.clone()
    }

    /// Start a session on a freshly connected link.
    ///
    /// Spawns the executor for this connection and enqueues the
    /// initialization transaction. Must be called from within a tokio runtime.
    pub fn on_connected(&self, link: Arc<dyn LinkAdapter>) -> Result<TransactionHandle> {
        if self.session_state().is_connected() {
            warn!("Connected while a session is active, restarting it");
            self.on_disconnected();
        }

        let init = {
            let state = self.state.read();
            self.protocol.initialize(&self.config, &state.device)?
        };
        self.check_pairing(&init)?;
        let from = self
            .state
            .write()
            .session
            .transition_to(SessionState::Initializing)?;
        info!("{} watch connected, initializing", self.protocol.name());

        let executor = Executor::new(
            self.queue.clone(),
            link,
            self.state.clone(),
            self.events.clone(),
            self.config.step_timeout,
        );
        {
            let mut slot = self.executor.lock();
            if let Some(old) = slot.take() {
                old.abort();
            }
            self.queue.open();
            *slot = Some(tokio::spawn(executor.run()));
        }

        let _ = self.events.send(DeviceEvent::SessionStateChanged {
            from,
            to: SessionState::Initializing,
        });
        self.queue.enqueue(init)
    }

    /// Tear the session down after the transport went away.
    pub fn on_disconnected(&self) {
        queue::drop_session(&self.queue, &self.state, &self.events);
        if let Some(executor) = self.executor.lock().take() {
            executor.abort();
        }
    }

    /// Feed one characteristic notification into the engine.
    ///
    /// # Errors
    ///
    /// Returns framing, frame and payload errors; the offending data is
    /// dropped and the engine keeps running.
    pub fn on_characteristic_changed(&self, channel: ChannelId, data: &[u8]) -> Result<()> {
        trace!("Notification on {}: {:02X?}", channel, data);

        let outcome = {
            let mut state = self.state.write();
            if !state.session.state().is_connected() {
                debug!("Ignoring notification while disconnected");
                return Ok(());
            }

            let frame = match state.reassembler(channel).reassemble(data) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(e) => {
                    warn!("Framing error on {}: {}", channel, e);
                    return Err(e.into());
                }
            };
            let message = validate(&frame).map_err(|e| {
                warn!("Dropping frame on {}: {}", channel, e);
                Error::from(e)
            })?;
            let inbound = self.protocol.classify(channel, &message, &self.config)?;

            let outcome = Dispatcher::new(&self.protocol, &self.config).dispatch(&mut state, inbound);
            for transaction in &outcome.transactions {
                if let Err(e) = self.enqueue(transaction.clone()) {
                    warn!("Follow-up '{}' not queued: {}", transaction.name(), e);
                }
            }
            outcome
        };

        for event in outcome.events {
            let _ = self.events.send(event);
        }
        Ok(())
    }

    /// Discard partial frames on every channel.
    ///
    /// Used when notifications were lost and the next fragment cannot be
    /// trusted to continue what is buffered.
    pub fn reset_reassembly(&self) {
        let mut state = self.state.write();
        if state.has_partial_frames() {
            debug!("Discarding partial frames");
        }
        state.reset_reassembly();
    }

    /// Turn an application request into a queued transaction.
    ///
    /// Returns `None` when the request needed no traffic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] when disconnected and
    /// [`Error::SessionBusy`] for a history fetch while one is running.
    pub fn submit_command(&self, operation: DeviceOperation) -> Result<Option<TransactionHandle>> {
        let mut state = self.state.write();
        if !state.session.state().is_connected() {
            return Err(Error::QueueClosed);
        }
        if operation == DeviceOperation::FetchHistory {
            if let Some(category) = state.progress.active() {
                return Err(Error::SessionBusy { category });
            }
        }

        debug!("Submitting {}", operation.name());
        match self
            .protocol
            .build_operation(&operation, &self.config, &mut state.device)?
        {
            Some(transaction) => self.enqueue(transaction).map(Some),
            None => Ok(None),
        }
    }

    /// Submit a request and wait until its transaction ran.
    pub async fn submit_command_and_wait(&self, operation: DeviceOperation) -> Result<()> {
        match self.submit_command(operation)? {
            Some(handle) => handle.wait().await,
            None => Ok(()),
        }
    }

    /// Wait until everything queued so far has run.
    pub async fn flush(&self) -> Result<()> {
        self.enqueue(Transaction::new("flush"))?.wait().await
    }

    fn check_pairing(&self, transaction: &Transaction) -> Result<()> {
        if transaction.check_ack_pairing(self.protocol.write_channel()) {
            Ok(())
        } else {
            warn!("Rejecting '{}': data writes not acknowledged", transaction.name());
            Err(Error::UnpairedWrite {
                transaction: transaction.name().to_string(),
            })
        }
    }

    fn enqueue(&self, transaction: Transaction) -> Result<TransactionHandle> {
        self.check_pairing(&transaction)?;
        self.queue.enqueue(transaction)
    }
}

impl<P: DeviceProtocol> Drop for Engine<P> {
    fn drop(&mut self) {
        if let Some(executor) = self.executor.get_mut().take() {
            executor.abort();
        }
    }
}

impl<P: DeviceProtocol + std::fmt::Debug> std::fmt::Debug for Engine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("protocol", &self.protocol)
            .field("session", &self.session_state())
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::link::MockLinkAdapter;
    use crate::ble::uuids::{ACK_CHARACTERISTIC_UUID, WRITE_CHARACTERISTIC_UUID};
    use crate::data::{ActivitySample, MusicPlayback};
    use crate::device::ZeTimeProtocol;
    use crate::error::{FramingError, LinkError};
    use crate::protocol::{Message, MessageKind};
    use crate::engine::testing::{LinkCall, RecordingLink};
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    const DELETE_STEPS: [u8; 7] = [0x6F, 0x53, 0x71, 0x01, 0x00, 0x00, 0x8F];

    fn frame(command: u8, payload: &[u8]) -> Vec<u8> {
        Message::new(command, MessageKind::Reply, payload.to_vec())
            .unwrap()
            .to_bytes()
    }

    fn step_record(index: u16) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&index.to_le_bytes());
        payload.extend_from_slice(&(1_000 * u32::from(index + 1)).to_le_bytes());
        for value in [500u32, 20, 350, 5] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        frame(0x54, &payload)
    }

    fn drain(rx: &mut broadcast::Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn engine() -> Engine<ZeTimeProtocol> {
        Engine::new(ZeTimeProtocol::new(), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_fetch_scenario() {
        let engine = engine();
        let mut rx = engine.subscribe();
        let link = Arc::new(RecordingLink::default());

        let init = engine.on_connected(link.clone()).unwrap();
        assert_eq!(engine.session_state(), SessionState::Initializing);

        let mut version = vec![0x05];
        version.extend_from_slice(b"V1.7B4.1");
        assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &frame(0x03, &version)));
        assert_ok!(engine.on_characteristic_changed(
            ACK_CHARACTERISTIC_UUID,
            &frame(0x52, &[3, 0, 0, 0, 0, 0])
        ));

        for index in 0..3 {
            let record = step_record(index);
            assert_eq!(record.len(), 28);
            let (head, tail) = record.split_at(20);
            assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, head));
            assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, tail));
        }

        engine.flush().await.unwrap();
        init.wait().await.unwrap();

        let events = drain(&mut rx);
        let samples = events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::Sample(ActivitySample::Steps(_))))
            .count();
        assert_eq!(samples, 3);

        let initialized = events
            .iter()
            .filter(|e| {
                **e == DeviceEvent::SessionStateChanged {
                    from: SessionState::Initializing,
                    to: SessionState::Initialized,
                }
            })
            .count();
        assert_eq!(initialized, 1);
        assert!(events.contains(&DeviceEvent::FetchComplete {
            category: BulkCategory::Steps
        }));

        let deletes = link
            .writes_to(WRITE_CHARACTERISTIC_UUID)
            .into_iter()
            .filter(|w| w[..] == DELETE_STEPS[..])
            .count();
        assert_eq!(deletes, 1);

        assert_eq!(engine.session_state(), SessionState::Initialized);
        assert_eq!(engine.active_fetch(), None);
        assert_eq!(
            engine.device_context().firmware_version.as_deref(),
            Some("V1.7B4.1")
        );
    }

    #[tokio::test]
    async fn test_commands_need_connection() {
        let engine = engine();
        assert!(matches!(
            engine.submit_command(DeviceOperation::RequestBattery),
            Err(Error::QueueClosed)
        ));
        assert_err!(engine.flush().await);
    }

    #[tokio::test]
    async fn test_fetch_refused_while_busy() {
        let engine = engine();
        let link = Arc::new(RecordingLink::default());
        engine.on_connected(link).unwrap();
        assert_ok!(engine.on_characteristic_changed(
            ACK_CHARACTERISTIC_UUID,
            &frame(0x52, &[0, 0, 2, 0, 0, 0])
        ));

        assert!(matches!(
            engine.submit_command(DeviceOperation::FetchHistory),
            Err(Error::SessionBusy {
                category: BulkCategory::Sleep
            })
        ));
        engine.flush().await.unwrap();
        assert_eq!(engine.session_state(), SessionState::Busy(BulkCategory::Sleep));
        assert_eq!(engine.progress(BulkCategory::Sleep).available, 2);
    }

    #[tokio::test]
    async fn test_music_info_without_state_sends_nothing() {
        let engine = engine();
        engine.on_connected(Arc::new(RecordingLink::default())).unwrap();

        let handle = engine
            .submit_command(DeviceOperation::SetMusicInfo {
                track: "Song".to_string(),
            })
            .unwrap();
        assert!(handle.is_none());

        let handle = engine
            .submit_command(DeviceOperation::SetMusicState(MusicPlayback::Paused))
            .unwrap();
        assert!(handle.is_some());
        engine.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_framing_error_is_absorbed() {
        let engine = engine();
        engine.on_connected(Arc::new(RecordingLink::default())).unwrap();

        let first = step_record(0);
        let second = step_record(1);
        assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &first[..20]));
        assert!(matches!(
            engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &second[..20]),
            Err(Error::Framing(_))
        ));

        // The channel starts fresh afterwards.
        assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &frame(0x08, &[64])));
        assert!(engine.session_state().is_connected());
    }

    #[tokio::test]
    async fn test_frame_cutting_in_does_not_count_as_record() {
        let engine = engine();
        let mut rx = engine.subscribe();
        engine.on_connected(Arc::new(RecordingLink::default())).unwrap();
        assert_ok!(engine.on_characteristic_changed(
            ACK_CHARACTERISTIC_UUID,
            &frame(0x52, &[2, 0, 0, 0, 0, 0])
        ));

        // The battery reply is exactly as long as the missing tail.
        let record = step_record(0);
        let battery = frame(0x08, &[80, 1]);
        assert_eq!(battery.len(), record.len() - 20);
        assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &record[..20]));
        assert!(matches!(
            engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &battery),
            Err(Error::Framing(FramingError::Interleaved { command: 0x08 }))
        ));

        assert_eq!(engine.progress(BulkCategory::Steps).received, 0);
        assert!(!drain(&mut rx)
            .iter()
            .any(|e| matches!(e, DeviceEvent::Sample(_))));
        engine.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_reassembly_drops_partial_frames() {
        let engine = engine();
        let mut rx = engine.subscribe();
        engine.on_connected(Arc::new(RecordingLink::default())).unwrap();

        let record = step_record(0);
        assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &record[..20]));
        assert!(engine.state.read().has_partial_frames());

        engine.reset_reassembly();
        assert!(!engine.state.read().has_partial_frames());
        assert!(engine.session_state().is_connected());

        // A fresh frame is taken on its own instead of as a continuation.
        assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &frame(0x08, &[64])));
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, DeviceEvent::Battery(info) if info.level == 64)));
    }

    #[tokio::test]
    async fn test_unacknowledged_writes_rejected() {
        let engine = engine();
        let link = Arc::new(RecordingLink::default());
        engine.on_connected(link.clone()).unwrap().wait().await.unwrap();
        link.clear();

        let mut builder = TransactionBuilder::new("no ack");
        builder.write(WRITE_CHARACTERISTIC_UUID, vec![0x6F, 0x08, 0x70, 0x01, 0x00, 0x00, 0x8F]);
        let err = engine.enqueue(builder.build()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnpairedWrite { ref transaction } if transaction == "no ack"
        ));

        let mut builder = TransactionBuilder::new("acked");
        builder
            .write(WRITE_CHARACTERISTIC_UUID, vec![0x6F, 0x08, 0x70, 0x01, 0x00, 0x00, 0x8F])
            .ack(ACK_CHARACTERISTIC_UUID, vec![0x03]);
        engine.enqueue(builder.build()).unwrap().wait().await.unwrap();

        assert_eq!(link.calls().len(), 2);
        assert!(engine.session_state().is_connected());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let engine = engine();
        engine.on_connected(Arc::new(RecordingLink::default())).unwrap();

        let mut bad = frame(0x08, &[64]);
        let last = bad.len() - 1;
        bad[last] = 0x00;
        assert!(matches!(
            engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &bad),
            Err(Error::Frame(_))
        ));
        assert!(engine.session_state().is_connected());
    }

    #[tokio::test]
    async fn test_link_failure_disconnects() {
        let engine = engine();
        let mut rx = engine.subscribe();
        let mut link = MockLinkAdapter::new();
        link.expect_subscribe_notifications()
            .returning(|_| Err(LinkError::NotConnected));
        link.expect_write_characteristic().never();

        let init = engine.on_connected(Arc::new(link)).unwrap();
        assert!(matches!(init.wait().await, Err(Error::Link(_))));

        assert_eq!(engine.session_state(), SessionState::Disconnected);
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, DeviceEvent::TransactionFailed { name, .. } if name == "initialize")));
        assert_eq!(
            events.last(),
            Some(&DeviceEvent::SessionStateChanged {
                from: SessionState::Initializing,
                to: SessionState::Disconnected,
            })
        );
        assert!(matches!(
            engine.submit_command(DeviceOperation::SetTime),
            Err(Error::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_resets_and_reconnect_restarts() {
        let engine = engine();
        let link = Arc::new(RecordingLink::default());
        engine.on_connected(link.clone()).unwrap();
        assert_ok!(engine.on_characteristic_changed(
            ACK_CHARACTERISTIC_UUID,
            &frame(0x52, &[4, 0, 0, 0, 0, 0])
        ));

        engine.on_disconnected();
        assert_eq!(engine.session_state(), SessionState::Disconnected);
        assert_eq!(engine.progress(BulkCategory::Steps), ProgressCounter::default());
        assert_ok!(engine.on_characteristic_changed(ACK_CHARACTERISTIC_UUID, &frame(0x08, &[64])));

        link.clear();
        let init = engine.on_connected(link.clone()).unwrap();
        init.wait().await.unwrap();
        assert_eq!(engine.session_state(), SessionState::Initialized);
        assert_eq!(
            link.calls().first(),
            Some(&LinkCall::Subscribe {
                channel: ACK_CHARACTERISTIC_UUID
            })
        );
    }
}
