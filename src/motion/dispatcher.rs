//! Fan-out of confirmed transitions to the sensor and the broker.

use super::TransitionEvent;
use crate::mqtt::StatePublisher;
use crate::sensors::SensorSink;
use log::{info, warn};
use std::sync::Arc;

/// Delivers each transition to both sinks.
///
/// The sinks are independent: a failure in one is logged and never skips,
/// delays or reverts the other.
pub struct TransitionDispatcher {
    sensor: Arc<dyn SensorSink>,
    publisher: Arc<dyn StatePublisher>,
    topic: String,
}

impl TransitionDispatcher {
    pub fn new(
        sensor: Arc<dyn SensorSink>,
        publisher: Arc<dyn StatePublisher>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            sensor,
            publisher,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn on_transition(&self, event: TransitionEvent) {
        let payload = event.to.payload();
        info!("[Poll] Motion {} - publishing to {}", payload, self.topic);

        if let Err(e) = self.sensor.update_motion(event.to.is_motion()) {
            warn!("[Sensor] Failed to update motion characteristic: {}", e);
        }

        if let Err(e) = self.publisher.publish(&self.topic, payload, true) {
            warn!("[MQTT] Failed to publish {} to {}: {}", payload, self.topic, e);
        }
    }
}
