//! Motion state tracking and the poll/compare/publish loop.

pub mod dispatcher;
pub mod poller;
pub mod tracker;

pub use dispatcher::TransitionDispatcher;
pub use poller::MotionPoller;
pub use tracker::StateTracker;

/// Broker payload for motion present.
pub const PAYLOAD_ON: &str = "ON";

/// Broker payload for no motion.
pub const PAYLOAD_OFF: &str = "OFF";

/// Last known motion state of the camera channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MotionState {
    #[default]
    Quiet,
    Motion,
}

impl MotionState {
    pub fn from_detected(detected: bool) -> Self {
        if detected {
            MotionState::Motion
        } else {
            MotionState::Quiet
        }
    }

    pub fn is_motion(self) -> bool {
        self == MotionState::Motion
    }

    /// Payload published to the broker for this state.
    pub fn payload(self) -> &'static str {
        match self {
            MotionState::Motion => PAYLOAD_ON,
            MotionState::Quiet => PAYLOAD_OFF,
        }
    }
}

impl From<bool> for MotionState {
    fn from(detected: bool) -> Self {
        Self::from_detected(detected)
    }
}

impl From<MotionState> for bool {
    fn from(state: MotionState) -> Self {
        state.is_motion()
    }
}

/// A confirmed change between two consecutive successful polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    pub to: MotionState,
}
