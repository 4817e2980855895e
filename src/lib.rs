//! Reolink Motion Bridge library.
//!
//! Polls a Reolink camera's motion-detection state and fans every confirmed
//! transition out to a motion sensor and a retained MQTT topic.

pub mod bridge;
pub mod config;
pub mod error;
pub mod input;
pub mod motion;
pub mod mqtt;
pub mod sensors;

pub use bridge::{BridgeHandle, MotionBridge};
pub use config::Config;
pub use error::{BridgeError, Result};
