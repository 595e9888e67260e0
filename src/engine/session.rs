//! Device session lifecycle.
//!
//! ```text
//! Disconnected -> Initializing -> Initialized <-> Busy(category)
//!       ^                                            |
//!       +---------------- any state -----------------+
//! ```

use tracing::debug;

use crate::data::BulkCategory;
use crate::error::{Error, Result};

/// Lifecycle state of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    /// No link to the watch.
    #[default]
    Disconnected,
    /// Connected, initialization transaction running.
    Initializing,
    /// Ready for commands.
    Initialized,
    /// Fetching history of one category.
    Busy(BulkCategory),
}

impl SessionState {
    /// Check if the session has a link.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Check if a bulk fetch is running.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// Category being fetched, if any.
    pub fn busy_category(&self) -> Option<BulkCategory> {
        match self {
            Self::Busy(category) => Some(*category),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Initializing => write!(f, "Initializing"),
            Self::Initialized => write!(f, "Initialized"),
            Self::Busy(category) => write!(f, "Busy({})", category),
        }
    }
}

/// Guards the allowed session transitions.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    /// Create a machine in the `Disconnected` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if moving to `to` is allowed from the current state.
    pub fn can_transition(&self, to: SessionState) -> bool {
        use SessionState::*;

        match (self.state, to) {
            (Disconnected, Disconnected) => false,
            (_, Disconnected) => true,
            (Disconnected, Initializing) => true,
            (Initializing, Initialized) => true,
            (Initialized, Busy(_)) => true,
            (Busy(from), Busy(next)) => from != next,
            (Busy(_), Initialized) => true,
            _ => false,
        }
    }

    /// Move to a new state.
    ///
    /// Returns the previous state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the edge is not allowed.
    pub fn transition_to(&mut self, to: SessionState) -> Result<SessionState> {
        if !self.can_transition(to) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to,
            });
        }

        let from = self.state;
        self.state = to;
        debug!("Session state changed: {} -> {}", from, to);
        Ok(from)
    }

    /// Drop to `Disconnected` from whatever state the session is in.
    ///
    /// Returns the previous state, or `None` if already disconnected.
    pub fn force_disconnect(&mut self) -> Option<SessionState> {
        if self.state == SessionState::Disconnected {
            return None;
        }
        let from = self.state;
        self.state = SessionState::Disconnected;
        debug!("Session state forced: {} -> Disconnected", from);
        Some(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_happy_path() {
        let mut machine = SessionStateMachine::new();
        assert_eq!(machine.transition_to(Initializing).unwrap(), Disconnected);
        assert_eq!(machine.transition_to(Initialized).unwrap(), Initializing);
        machine.transition_to(Busy(BulkCategory::Steps)).unwrap();
        machine.transition_to(Busy(BulkCategory::HeartRate)).unwrap();
        machine.transition_to(Initialized).unwrap();
        assert_eq!(machine.state(), Initialized);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut machine = SessionStateMachine::new();
        assert!(matches!(
            machine.transition_to(Initialized),
            Err(Error::InvalidTransition {
                from: Disconnected,
                to: Initialized
            })
        ));

        machine.transition_to(Initializing).unwrap();
        assert!(machine.transition_to(Busy(BulkCategory::Sleep)).is_err());
        assert!(machine.transition_to(Initializing).is_err());

        machine.transition_to(Initialized).unwrap();
        machine.transition_to(Busy(BulkCategory::Sleep)).unwrap();
        assert!(machine.transition_to(Busy(BulkCategory::Sleep)).is_err());
        assert_eq!(machine.state(), Busy(BulkCategory::Sleep));
    }

    #[test]
    fn test_disconnect_from_anywhere() {
        for state in [Initializing, Initialized, Busy(BulkCategory::Steps)] {
            let mut machine = SessionStateMachine { state };
            assert!(machine.can_transition(Disconnected));
            assert_eq!(machine.force_disconnect(), Some(state));
            assert_eq!(machine.state(), Disconnected);
        }

        let mut machine = SessionStateMachine::new();
        assert_eq!(machine.force_disconnect(), None);
        assert!(machine.transition_to(Disconnected).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Busy(BulkCategory::HeartRate).to_string(), "Busy(heart rate)");
        assert_eq!(Initialized.to_string(), "Initialized");
    }
}
