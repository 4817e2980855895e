//! Motion sensor state for the home-automation host.
//!
//! Provides thread-safe shared state that the poll loop writes and the host
//! reads. Every change is also pushed to subscribers over a watch channel,
//! so the host never has to poll the sensor itself.

use super::{AccessoryInformation, Sensor, SensorSink};
use crate::error::Result;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::watch;

/// Thread-safe motion sensor state.
///
/// Implements the [`Sensor`] trait for change detection - the version
/// is incremented each time the value changes via `set()`.
///
/// # Example
/// ```ignore
/// let sensor = Arc::new(MotionSensor::new(AccessoryInformation::new("Garden")));
/// let mut changes = sensor.subscribe();
///
/// // From the poll loop
/// sensor.set(true);
///
/// // From the host
/// changes.changed().await?;
/// assert!(*changes.borrow());
/// ```
pub struct MotionSensor {
    info: AccessoryInformation,
    state: AtomicBool,
    version: AtomicU32,
    notifier: watch::Sender<bool>,
}

impl MotionSensor {
    /// Create a sensor that starts with no motion detected.
    pub fn new(info: AccessoryInformation) -> Self {
        let (notifier, _) = watch::channel(false);
        Self {
            info,
            state: AtomicBool::new(false),
            version: AtomicU32::new(0),
            notifier,
        }
    }

    /// Static identity metadata.
    pub fn info(&self) -> &AccessoryInformation {
        &self.info
    }

    /// Get the current motion state.
    pub fn get(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    /// Set the motion state. Returns true if the value changed.
    ///
    /// Subscribers are only notified on change.
    pub fn set(&self, value: bool) -> bool {
        let old = self.state.swap(value, Ordering::SeqCst);
        if old == value {
            return false;
        }
        self.version.fetch_add(1, Ordering::SeqCst);
        self.notifier.send_replace(value);
        true
    }

    /// Subscribe to pushed changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.notifier.subscribe()
    }
}

impl Sensor for MotionSensor {
    fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }
}

impl SensorSink for MotionSensor {
    fn update_motion(&self, detected: bool) -> Result<()> {
        if self.set(detected) {
            log::debug!(
                "[Sensor] {} motion detected: {}",
                self.info.name,
                detected
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor() -> MotionSensor {
        MotionSensor::new(AccessoryInformation::new("Garden"))
    }

    #[test]
    fn test_initial_state() {
        let sensor = sensor();
        assert!(!sensor.get());
        assert_eq!(sensor.version(), 0);
        assert_eq!(sensor.info().manufacturer, "Reolink");
        assert_eq!(sensor.info().model, "Duo 2 WiFi");
        assert_eq!(sensor.info().serial_number, "RD2W-001");
    }

    #[test]
    fn test_set_increments_version() {
        let sensor = sensor();

        assert!(sensor.set(true));
        assert!(sensor.get());
        assert_eq!(sensor.version(), 1);

        // Setting same value doesn't increment
        assert!(!sensor.set(true));
        assert_eq!(sensor.version(), 1);

        assert!(sensor.set(false));
        assert!(!sensor.get());
        assert_eq!(sensor.version(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let sensor = sensor();
        let mut changes = sensor.subscribe();

        sensor.update_motion(true).unwrap();
        changes.changed().await.unwrap();
        assert!(*changes.borrow_and_update());

        // No notification for a repeated value
        sensor.update_motion(true).unwrap();
        assert!(!changes.has_changed().unwrap());
    }
}
