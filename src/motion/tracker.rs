//! Edge detection over successive poll results.

use super::{MotionState, TransitionEvent};

/// Holds the last confirmed motion state.
///
/// Only the poll loop owns a tracker, so no locking is involved. Failed
/// queries never reach [`StateTracker::observe`], which keeps a fetch error
/// from looking like a transition to some default value.
#[derive(Debug, Default)]
pub struct StateTracker {
    current: MotionState,
}

impl StateTracker {
    /// Start in the quiet state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> MotionState {
        self.current
    }

    /// Record a successful poll result. Returns an event only on change.
    pub fn observe(&mut self, next: MotionState) -> Option<TransitionEvent> {
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(TransitionEvent { to: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_quiet() {
        let mut tracker = StateTracker::new();
        assert_eq!(tracker.current(), MotionState::Quiet);
        assert_eq!(tracker.observe(MotionState::Quiet), None);
    }

    #[test]
    fn test_edge_triggered() {
        let mut tracker = StateTracker::new();
        let events: Vec<_> = [
            MotionState::Quiet,
            MotionState::Motion,
            MotionState::Motion,
            MotionState::Quiet,
        ]
        .into_iter()
        .filter_map(|state| tracker.observe(state))
        .collect();

        assert_eq!(
            events,
            vec![
                TransitionEvent {
                    to: MotionState::Motion
                },
                TransitionEvent {
                    to: MotionState::Quiet
                },
            ]
        );
        assert_eq!(tracker.current(), MotionState::Quiet);
    }

    #[test]
    fn test_repeated_state_is_quiescent() {
        let mut tracker = StateTracker::new();
        assert!(tracker.observe(MotionState::Motion).is_some());
        for _ in 0..10 {
            assert!(tracker.observe(MotionState::Motion).is_none());
        }
        assert_eq!(tracker.current(), MotionState::Motion);
    }
}
