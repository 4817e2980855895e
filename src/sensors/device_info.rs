//! Static accessory identity.
//!
//! Fixed constants, never queried from the camera.

pub const MANUFACTURER: &str = "Reolink";
pub const MODEL: &str = "Duo 2 WiFi";
pub const SERIAL_NUMBER: &str = "RD2W-001";

/// Identity metadata shown next to the motion sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInformation {
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: &'static str,
}

impl AccessoryInformation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manufacturer: MANUFACTURER,
            model: MODEL,
            serial_number: SERIAL_NUMBER,
        }
    }
}
