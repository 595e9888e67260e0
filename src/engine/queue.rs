//! Ordered transaction queue and its single executor.
//!
//! Any task may enqueue; one executor per connection drains the queue and
//! runs each transaction's steps to completion before starting the next.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, oneshot, Notify};
use tracing::{debug, error, info, trace, warn};

use crate::ble::link::{ChannelId, LinkAdapter};
use crate::engine::events::DeviceEvent;
use crate::engine::session::SessionState;
use crate::engine::state::EngineState;
use crate::engine::transaction::{Step, Transaction};
use crate::error::{Error, LinkError, Result};

/// Awaitable outcome of an enqueued transaction.
#[derive(Debug)]
pub struct TransactionHandle {
    name: String,
    outcome: oneshot::Receiver<Result<()>>,
}

impl TransactionHandle {
    /// Name of the transaction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until the transaction ran or was discarded.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the transaction, or
    /// [`Error::QueueClosed`] if it was discarded before running.
    pub async fn wait(self) -> Result<()> {
        self.outcome.await.unwrap_or(Err(Error::QueueClosed))
    }
}

pub(crate) struct QueuedTransaction {
    transaction: Transaction,
    done: oneshot::Sender<Result<()>>,
    epoch: u64,
}

struct QueueInner {
    pending: Mutex<VecDeque<QueuedTransaction>>,
    open: AtomicBool,
    epoch: AtomicU64,
    notify: Notify,
}

/// FIFO of transactions waiting for the link.
///
/// The queue starts closed; it is opened when a session connects and closed
/// again when the link is lost.
#[derive(Clone)]
pub struct TransactionQueue {
    inner: Arc<QueueInner>,
}

impl TransactionQueue {
    /// Create a closed, empty queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(VecDeque::new()),
                open: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Accept transactions again.
    pub fn open(&self) {
        let _pending = self.inner.pending.lock();
        self.inner.open.store(true, Ordering::SeqCst);
    }

    /// Check if transactions are accepted.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Generation counter, bumped on every close.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Number of transactions waiting.
    pub fn len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Check if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the session is disconnected.
    pub fn enqueue(&self, transaction: Transaction) -> Result<TransactionHandle> {
        let (done, outcome) = oneshot::channel();
        let name = transaction.name().to_string();

        {
            let mut pending = self.inner.pending.lock();
            if !self.is_open() {
                return Err(Error::QueueClosed);
            }
            debug!(
                "Enqueued transaction '{}' ({} steps, {} ahead)",
                name,
                transaction.len(),
                pending.len()
            );
            pending.push_back(QueuedTransaction {
                transaction,
                done,
                epoch: self.epoch(),
            });
        }

        self.inner.notify.notify_one();
        Ok(TransactionHandle { name, outcome })
    }

    /// Stop accepting work and discard everything pending.
    ///
    /// A transaction that is already running stops before its next step.
    /// Returns the number of discarded transactions.
    pub fn close(&self) -> usize {
        let discarded: Vec<QueuedTransaction> = {
            let mut pending = self.inner.pending.lock();
            self.inner.open.store(false, Ordering::SeqCst);
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            pending.drain(..).collect()
        };

        let count = discarded.len();
        for item in discarded {
            let _ = item.done.send(Err(Error::QueueClosed));
        }
        if count > 0 {
            debug!("Discarded {} pending transactions", count);
        }
        count
    }

    pub(crate) async fn next(&self) -> QueuedTransaction {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(item) = self.inner.pending.lock().pop_front() {
                return item;
            }
            notified.await;
        }
    }
}

impl Default for TransactionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionQueue")
            .field("open", &self.is_open())
            .field("pending", &self.len())
            .field("epoch", &self.epoch())
            .finish()
    }
}

/// Close the queue, reset session state and announce the disconnect.
pub(crate) fn drop_session(
    queue: &TransactionQueue,
    state: &RwLock<EngineState>,
    events: &broadcast::Sender<DeviceEvent>,
) {
    queue.close();
    let previous = state.write().link_lost();
    if let Some(from) = previous {
        info!("Session dropped from {}", from);
        let _ = events.send(DeviceEvent::SessionStateChanged {
            from,
            to: SessionState::Disconnected,
        });
    }
}

/// Drains a [`TransactionQueue`] through a link.
pub struct Executor {
    queue: TransactionQueue,
    link: Arc<dyn LinkAdapter>,
    state: Arc<RwLock<EngineState>>,
    events: broadcast::Sender<DeviceEvent>,
    step_timeout: Duration,
}

impl Executor {
    /// Create an executor.
    pub fn new(
        queue: TransactionQueue,
        link: Arc<dyn LinkAdapter>,
        state: Arc<RwLock<EngineState>>,
        events: broadcast::Sender<DeviceEvent>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            link,
            state,
            events,
            step_timeout,
        }
    }

    /// Run transactions until the task is aborted.
    pub async fn run(self) {
        debug!("Transaction executor started");
        loop {
            let item = self.queue.next().await;
            self.execute(item).await;
        }
    }

    async fn execute(&self, item: QueuedTransaction) {
        let QueuedTransaction {
            transaction,
            done,
            epoch,
        } = item;

        debug!(
            "Running transaction '{}' ({} steps)",
            transaction.name(),
            transaction.len()
        );

        let result = self.run_steps(&transaction, epoch).await;
        match &result {
            Ok(()) => debug!("Transaction '{}' done", transaction.name()),
            Err(Error::QueueClosed) => {
                debug!("Transaction '{}' dropped by disconnect", transaction.name());
            }
            Err(e) => {
                warn!("Transaction '{}' failed: {}", transaction.name(), e);
                let _ = self.events.send(DeviceEvent::TransactionFailed {
                    name: transaction.name().to_string(),
                    reason: e.to_string(),
                });
                if e.is_link_failure() {
                    error!("Link failure, dropping session: {}", e);
                    drop_session(&self.queue, &self.state, &self.events);
                }
            }
        }

        let _ = done.send(result);
    }

    async fn run_steps(&self, transaction: &Transaction, epoch: u64) -> Result<()> {
        for step in transaction.steps() {
            if self.queue.epoch() != epoch {
                return Err(Error::QueueClosed);
            }

            match step {
                Step::Write { channel, data } | Step::Ack { channel, data } => {
                    trace!("Write to {}: {:02X?}", channel, data.as_ref());
                    self.timed(
                        "write",
                        *channel,
                        self.link.write_characteristic(*channel, data),
                    )
                    .await?;
                }
                Step::EnableNotifications { channel } => {
                    debug!("Enabling notifications on {}", channel);
                    self.timed(
                        "subscribe",
                        *channel,
                        self.link.subscribe_notifications(*channel),
                    )
                    .await?;
                }
                Step::SetSessionState(to) => self.apply_state(*to)?,
            }
        }
        Ok(())
    }

    async fn timed<F>(&self, operation: &str, channel: ChannelId, step: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), LinkError>>,
    {
        match tokio::time::timeout(self.step_timeout, step).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(LinkError::Timeout {
                operation: format!("{} on {}", operation, channel),
                timeout: self.step_timeout,
            }
            .into()),
        }
    }

    fn apply_state(&self, to: SessionState) -> Result<()> {
        let from = self.state.write().session.transition_to(to)?;
        if from == SessionState::Initializing && to == SessionState::Initialized {
            info!("Watch initialized");
        }
        let _ = self
            .events
            .send(DeviceEvent::SessionStateChanged { from, to });
        Ok(())
    }
}
