//! MQTT output for motion state.
//!
//! The publisher owns one long-lived broker session and delivers retained
//! state messages on demand. Callers only see a fire-and-forget
//! [`StatePublisher`]; connection handling and reconnects stay inside.

pub mod options;
pub mod publisher;
pub mod queue;

pub use publisher::{ConnectionState, MqttPublisher};
pub use queue::{OutboundMessage, OutboundQueue};

use crate::error::Result;

/// Fire-and-forget publishing of state messages.
///
/// An `Ok` return means the message was accepted for delivery, not that the
/// broker has received it.
pub trait StatePublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()>;
}
