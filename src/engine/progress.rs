//! Bulk fetch progress.

use crate::data::{BulkCategory, DataSummary};

/// Records announced and received for one category.
///
/// `received` never exceeds `available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressCounter {
    /// Records the watch announced.
    pub available: u16,
    /// Records processed so far.
    pub received: u16,
}

impl ProgressCounter {
    /// Check if records are still outstanding.
    pub fn is_pending(&self) -> bool {
        self.received < self.available
    }

    /// Check if every announced record arrived.
    pub fn is_complete(&self) -> bool {
        self.available > 0 && self.received == self.available
    }

    /// Progress as a fraction from 0.0 to 1.0.
    pub fn fraction(&self) -> f64 {
        if self.available == 0 {
            0.0
        } else {
            f64::from(self.received) / f64::from(self.available)
        }
    }
}

/// Result of recording one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Counter after the update.
    pub counter: ProgressCounter,
    /// This record completed the category.
    pub completed: bool,
}

/// Progress counters for all categories plus the one being fetched.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    steps: ProgressCounter,
    sleep: ProgressCounter,
    heart_rate: ProgressCounter,
    active: Option<BulkCategory>,
}

impl ProgressTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for one category.
    pub fn counter(&self, category: BulkCategory) -> ProgressCounter {
        match category {
            BulkCategory::Steps => self.steps,
            BulkCategory::Sleep => self.sleep,
            BulkCategory::HeartRate => self.heart_rate,
        }
    }

    fn counter_mut(&mut self, category: BulkCategory) -> &mut ProgressCounter {
        match category {
            BulkCategory::Steps => &mut self.steps,
            BulkCategory::Sleep => &mut self.sleep,
            BulkCategory::HeartRate => &mut self.heart_rate,
        }
    }

    /// Category currently being fetched.
    pub fn active(&self) -> Option<BulkCategory> {
        self.active
    }

    /// Mark a category as being fetched, or `None` when idle.
    pub fn set_active(&mut self, category: Option<BulkCategory>) {
        self.active = category;
    }

    /// Load counts from an availability summary, clearing received counts.
    pub fn load_summary(&mut self, summary: &DataSummary) {
        for category in BulkCategory::FETCH_ORDER {
            *self.counter_mut(category) = ProgressCounter {
                available: summary.available(category),
                received: 0,
            };
        }
    }

    /// Count one processed record.
    ///
    /// Records beyond the announced count are ignored.
    pub fn record(&mut self, category: BulkCategory) -> RecordOutcome {
        let counter = self.counter_mut(category);
        let was_pending = counter.is_pending();
        if was_pending {
            counter.received += 1;
        }
        RecordOutcome {
            counter: *counter,
            completed: was_pending && counter.is_complete(),
        }
    }

    /// Clear a finished category.
    pub fn finish(&mut self, category: BulkCategory) {
        *self.counter_mut(category) = ProgressCounter::default();
        if self.active == Some(category) {
            self.active = None;
        }
    }

    /// First category in fetch order with outstanding records.
    pub fn next_pending(&self) -> Option<BulkCategory> {
        BulkCategory::FETCH_ORDER
            .into_iter()
            .find(|category| self.counter(*category).is_pending())
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_records_complete_once() {
        let mut tracker = ProgressTracker::new();
        tracker.load_summary(&DataSummary::new(3, 0, 0));

        let outcomes: Vec<_> = (0..3).map(|_| tracker.record(BulkCategory::Steps)).collect();
        assert!(!outcomes[0].completed);
        assert!(!outcomes[1].completed);
        assert!(outcomes[2].completed);

        let counter = tracker.counter(BulkCategory::Steps);
        assert_eq!(counter.received, counter.available);

        // A surplus record does not complete again or overflow.
        let extra = tracker.record(BulkCategory::Steps);
        assert!(!extra.completed);
        assert_eq!(extra.counter.received, 3);
    }

    #[test]
    fn test_next_pending_order() {
        let mut tracker = ProgressTracker::new();
        tracker.load_summary(&DataSummary::new(1, 2, 3));
        assert_eq!(tracker.next_pending(), Some(BulkCategory::Steps));

        tracker.record(BulkCategory::Steps);
        tracker.finish(BulkCategory::Steps);
        assert_eq!(tracker.next_pending(), Some(BulkCategory::HeartRate));

        tracker.finish(BulkCategory::HeartRate);
        assert_eq!(tracker.next_pending(), Some(BulkCategory::Sleep));

        tracker.finish(BulkCategory::Sleep);
        assert_eq!(tracker.next_pending(), None);
    }

    #[test]
    fn test_unannounced_records_ignored() {
        let mut tracker = ProgressTracker::new();
        let outcome = tracker.record(BulkCategory::Sleep);
        assert!(!outcome.completed);
        assert_eq!(outcome.counter, ProgressCounter::default());
    }

    #[test]
    fn test_finish_clears_active() {
        let mut tracker = ProgressTracker::new();
        tracker.set_active(Some(BulkCategory::Sleep));
        tracker.finish(BulkCategory::Steps);
        assert_eq!(tracker.active(), Some(BulkCategory::Sleep));
        tracker.finish(BulkCategory::Sleep);
        assert_eq!(tracker.active(), None);
    }

    #[test]
    fn test_fraction() {
        let counter = ProgressCounter {
            available: 4,
            received: 1,
        };
        assert!((counter.fraction() - 0.25).abs() < f64::EPSILON);
        assert_eq!(ProgressCounter::default().fraction(), 0.0);
    }
}
