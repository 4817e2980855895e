use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Missing required configuration value: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid MQTT broker address: {0}")]
    InvalidBrokerAddress(String),

    #[error("Camera request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Camera returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("Malformed camera response: {0}")]
    MalformedResponse(String),

    #[error("Camera rejected command (code {code}): {detail}")]
    DeviceError { code: i64, detail: String },

    #[error("MQTT publisher is not running")]
    PublisherClosed,

    #[error("MQTT publish queue is full")]
    PublishQueueFull,

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl BridgeError {
    /// True when the camera answered but the payload had an unexpected shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, BridgeError::MalformedResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
