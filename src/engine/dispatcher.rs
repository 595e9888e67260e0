//! Turns classified inbound messages into events and follow-up transactions.

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::data::{ActivitySample, BulkCategory, DataSummary};
use crate::device::{DeviceProtocol, Inbound};
use crate::engine::events::DeviceEvent;
use crate::engine::session::SessionState;
use crate::engine::state::EngineState;
use crate::engine::transaction::{Transaction, TransactionBuilder};

/// Result of dispatching one inbound message.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Events to publish, in order.
    pub events: Vec<DeviceEvent>,
    /// Transactions to enqueue, in order.
    pub transactions: Vec<Transaction>,
}

/// Routes inbound messages for one watch family.
pub struct Dispatcher<'a, P: DeviceProtocol> {
    protocol: &'a P,
    config: &'a EngineConfig,
}

impl<'a, P: DeviceProtocol> Dispatcher<'a, P> {
    /// Create a dispatcher.
    pub fn new(protocol: &'a P, config: &'a EngineConfig) -> Self {
        Self { protocol, config }
    }

    /// Apply one inbound message to the engine state.
    pub fn dispatch(&self, state: &mut EngineState, inbound: Inbound) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        match inbound {
            Inbound::WatchIdentity(id) => {
                debug!("Watch identity: {:02X?}", id);
                outcome.events.push(DeviceEvent::WatchIdentity(id));
            }
            Inbound::Version(info) => {
                info!("Watch {:?} version {}", info.kind, info.version);
                state.device.apply_version(&info);
                outcome.events.push(DeviceEvent::Version(info));
            }
            Inbound::Battery(info) => {
                debug!("Battery at {}%", info.level);
                outcome.events.push(DeviceEvent::Battery(info));
            }
            Inbound::Summary(summary) => self.on_summary(state, summary, &mut outcome),
            Inbound::Records(samples) => self.on_records(state, samples, &mut outcome),
            Inbound::MusicControl(command) => {
                outcome.events.push(DeviceEvent::MusicControl(command));
            }
            Inbound::MusicVolume { requested } => {
                let command = state.device.apply_volume_request(requested);
                debug!(
                    "Volume request {} -> {}",
                    requested, state.device.music_volume
                );
                outcome.events.push(DeviceEvent::MusicControl(command));
                outcome.transactions.push(
                    self.protocol
                        .music_volume_reply(state.device.music_volume, self.config),
                );
            }
            Inbound::MusicStateQuery => {
                match self.protocol.music_state_reply(&state.device, self.config) {
                    Some(reply) => outcome.transactions.push(reply),
                    None => debug!("Music state requested before track and state are known"),
                }
            }
            Inbound::Unhandled { command } => {
                debug!("Unhandled command 0x{:02X}", command);
            }
        }

        outcome
    }

    fn on_summary(&self, state: &mut EngineState, summary: DataSummary, outcome: &mut DispatchOutcome) {
        if let Some(active) = state.progress.active() {
            debug!("Ignoring summary while fetching {}", active);
            return;
        }

        info!(
            "Watch holds {} step, {} sleep and {} heart rate records",
            summary.steps, summary.sleep, summary.heart_rate
        );
        state.progress.load_summary(&summary);
        outcome.events.push(DeviceEvent::DataSummary(summary));

        if let Some(next) = state.progress.next_pending() {
            state.progress.set_active(Some(next));
            let mut builder = TransactionBuilder::new(format!("fetch {}", next));
            builder.set_state(SessionState::Busy(next));
            self.protocol.append_fetch(&mut builder, next, self.config);
            outcome.transactions.push(builder.build());
        }
    }

    fn on_records(
        &self,
        state: &mut EngineState,
        samples: Vec<ActivitySample>,
        outcome: &mut DispatchOutcome,
    ) {
        let mut finished = None;

        for sample in samples {
            let category = sample.category();
            if state.progress.active() != Some(category) {
                debug!("Ignoring {} record outside its fetch", category);
                continue;
            }
            outcome.events.push(DeviceEvent::Sample(sample));

            let record = state.progress.record(category);
            if record.counter.available > 0 {
                outcome.events.push(DeviceEvent::FetchProgress {
                    category,
                    received: record.counter.received,
                    available: record.counter.available,
                });
            }
            if record.completed {
                info!("Fetched all {} {} records", record.counter.available, category);
                state.progress.finish(category);
                outcome.events.push(DeviceEvent::FetchComplete { category });
                finished = Some(category);
            }
        }

        if let Some(category) = finished {
            outcome
                .transactions
                .push(self.completion(state, category));
        }
    }

    fn completion(&self, state: &mut EngineState, finished: BulkCategory) -> Transaction {
        let next = state.progress.next_pending();
        state.progress.set_active(next);

        let mut builder = TransactionBuilder::new(format!("finish {} fetch", finished));
        if self.config.delete_after_fetch {
            self.protocol.append_delete(&mut builder, finished, self.config);
        }
        match next {
            Some(next) => {
                builder.set_state(SessionState::Busy(next));
                self.protocol.append_fetch(&mut builder, next, self.config);
            }
            None => {
                builder.set_state(SessionState::Initialized);
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{device_timestamp, HeartRateSample, MusicCommand, MusicPlayback, StepSample};
    use crate::device::ZeTimeProtocol;
    use crate::engine::transaction::Step;
    use pretty_assertions::assert_eq;

    fn steps(index: u16) -> ActivitySample {
        ActivitySample::Steps(StepSample {
            index,
            timestamp: device_timestamp(1_000 + u32::from(index), 0).unwrap(),
            steps: 100,
            calories: 5,
            distance_meters: 70,
            active_minutes: 1,
        })
    }

    fn heart_rate(index: u16) -> ActivitySample {
        ActivitySample::HeartRate(HeartRateSample {
            index,
            timestamp: device_timestamp(2_000 + u32::from(index), 0).unwrap(),
            bpm: 70,
        })
    }

    fn state_steps(transaction: &Transaction) -> Vec<SessionState> {
        transaction
            .steps()
            .iter()
            .filter_map(|step| match step {
                Step::SetSessionState(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    fn connected_state() -> EngineState {
        let mut state = EngineState::new(20, 50);
        state.session.transition_to(SessionState::Initializing).unwrap();
        state.session.transition_to(SessionState::Initialized).unwrap();
        state
    }

    #[test]
    fn test_summary_starts_first_category() {
        let protocol = ZeTimeProtocol::new();
        let config = EngineConfig::default();
        let dispatcher = Dispatcher::new(&protocol, &config);
        let mut state = connected_state();

        let outcome = dispatcher.dispatch(&mut state, Inbound::Summary(DataSummary::new(0, 4, 2)));

        assert_eq!(
            outcome.events,
            vec![DeviceEvent::DataSummary(DataSummary::new(0, 4, 2))]
        );
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(
            state_steps(&outcome.transactions[0]),
            vec![SessionState::Busy(BulkCategory::HeartRate)]
        );
        assert_eq!(state.progress.active(), Some(BulkCategory::HeartRate));
    }

    #[test]
    fn test_summary_ignored_while_fetching() {
        let protocol = ZeTimeProtocol::new();
        let config = EngineConfig::default();
        let dispatcher = Dispatcher::new(&protocol, &config);
        let mut state = connected_state();
        dispatcher.dispatch(&mut state, Inbound::Summary(DataSummary::new(2, 0, 0)));

        let outcome = dispatcher.dispatch(&mut state, Inbound::Summary(DataSummary::new(9, 9, 9)));
        assert_eq!(outcome, DispatchOutcome::default());
        assert_eq!(state.progress.counter(BulkCategory::Steps).available, 2);
    }

    #[test]
    fn test_empty_summary_starts_nothing() {
        let protocol = ZeTimeProtocol::new();
        let config = EngineConfig::default();
        let dispatcher = Dispatcher::new(&protocol, &config);
        let mut state = connected_state();

        let outcome = dispatcher.dispatch(&mut state, Inbound::Summary(DataSummary::default()));
        assert_eq!(outcome.events.len(), 1);
        assert!(outcome.transactions.is_empty());
        assert_eq!(state.progress.active(), None);
    }

    #[test]
    fn test_k_records_one_completion() {
        let protocol = ZeTimeProtocol::new();
        let config = EngineConfig::default();
        let dispatcher = Dispatcher::new(&protocol, &config);
        let mut state = connected_state();
        dispatcher.dispatch(&mut state, Inbound::Summary(DataSummary::new(3, 1, 0)));

        let mut transactions = Vec::new();
        let mut completions = 0;
        for index in 0..3 {
            let outcome = dispatcher.dispatch(&mut state, Inbound::Records(vec![steps(index)]));
            completions += outcome
                .events
                .iter()
                .filter(|e| matches!(e, DeviceEvent::FetchComplete { .. }))
                .count();
            transactions.extend(outcome.transactions);
        }

        assert_eq!(completions, 1);
        assert_eq!(transactions.len(), 1);
        assert_eq!(
            state_steps(&transactions[0]),
            vec![SessionState::Busy(BulkCategory::Sleep)]
        );
        assert_eq!(state.progress.active(), Some(BulkCategory::Sleep));
    }

    #[test]
    fn test_records_outside_active_fetch_ignored() {
        let protocol = ZeTimeProtocol::new();
        let config = EngineConfig::default();
        let dispatcher = Dispatcher::new(&protocol, &config);
        let mut state = connected_state();
        dispatcher.dispatch(&mut state, Inbound::Summary(DataSummary::new(2, 0, 1)));
        assert_eq!(state.progress.active(), Some(BulkCategory::Steps));

        let outcome = dispatcher.dispatch(&mut state, Inbound::Records(vec![heart_rate(0)]));
        assert_eq!(outcome, DispatchOutcome::default());
        assert_eq!(state.progress.counter(BulkCategory::HeartRate).received, 0);
        assert_eq!(state.progress.active(), Some(BulkCategory::Steps));

        // Nothing is being fetched at all.
        let mut idle = connected_state();
        let outcome = dispatcher.dispatch(&mut idle, Inbound::Records(vec![steps(0)]));
        assert_eq!(outcome, DispatchOutcome::default());
    }

    #[test]
    fn test_dual_heart_rate_records() {
        let protocol = ZeTimeProtocol::new();
        let config = EngineConfig::default().with_delete_after_fetch(false);
        let dispatcher = Dispatcher::new(&protocol, &config);
        let mut state = connected_state();
        dispatcher.dispatch(&mut state, Inbound::Summary(DataSummary::new(0, 0, 2)));

        let outcome = dispatcher.dispatch(
            &mut state,
            Inbound::Records(vec![heart_rate(0), heart_rate(1)]),
        );

        let samples = outcome
            .events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::Sample(_)))
            .count();
        assert_eq!(samples, 2);
        assert_eq!(
            outcome.events.last(),
            Some(&DeviceEvent::FetchComplete {
                category: BulkCategory::HeartRate
            })
        );

        // No delete, straight back to idle.
        let completion = &outcome.transactions[0];
        assert_eq!(completion.len(), 1);
        assert_eq!(state_steps(completion), vec![SessionState::Initialized]);
        assert_eq!(state.progress.active(), None);
    }

    #[test]
    fn test_music_volume_request() {
        let protocol = ZeTimeProtocol::new();
        let config = EngineConfig::default();
        let dispatcher = Dispatcher::new(&protocol, &config);
        let mut state = connected_state();

        let outcome = dispatcher.dispatch(&mut state, Inbound::MusicVolume { requested: 70 });
        assert_eq!(
            outcome.events,
            vec![DeviceEvent::MusicControl(MusicCommand::VolumeUp)]
        );
        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(state.device.music_volume, 60);
    }

    #[test]
    fn test_music_state_query_needs_track() {
        let protocol = ZeTimeProtocol::new();
        let config = EngineConfig::default();
        let dispatcher = Dispatcher::new(&protocol, &config);
        let mut state = connected_state();

        let outcome = dispatcher.dispatch(&mut state, Inbound::MusicStateQuery);
        assert!(outcome.transactions.is_empty());

        state.device.music_track = Some("Song".to_string());
        state.device.music_state = Some(MusicPlayback::Playing);
        let outcome = dispatcher.dispatch(&mut state, Inbound::MusicStateQuery);
        assert_eq!(outcome.transactions.len(), 1);
    }
}
