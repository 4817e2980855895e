//! Motion sensor exposed to the home-automation host.
//!
//! The host reads the sensor on demand and subscribes for pushed changes.
//! All sensors implement the [`Sensor`] trait which provides version tracking
//! for change detection.

pub mod device_info;
pub mod motion_sensor;

pub use device_info::AccessoryInformation;
pub use motion_sensor::MotionSensor;

use crate::error::Result;

/// Trait for sensors with change detection.
///
/// The version number is incremented each time the sensor value changes,
/// so readers can tell whether they have seen the latest value.
pub trait Sensor: Send + Sync {
    /// Get the current version number.
    fn version(&self) -> u32;
}

/// Receiver of confirmed motion transitions.
pub trait SensorSink: Send + Sync {
    /// Set the externally visible motion characteristic.
    fn update_motion(&self, detected: bool) -> Result<()>;
}
