use crate::error::{BridgeError, Result};
use crate::mqtt::options::BrokerAddress;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default display name of the motion sensor.
pub const DEFAULT_NAME: &str = "Reolink Motion";

/// Default camera poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

/// Default per-request timeout for camera queries in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Load environment variables from a .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
///
/// Variables that are already set are left untouched.
pub fn load_dotenv(path: impl AsRef<Path>) {
    let Ok(content) = fs::read_to_string(path.as_ref()) else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            // SAFETY: called from main before the async runtime spawns any threads
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Split at the first '=' only, passwords may contain more
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let mut value = value.trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            if !key.is_empty() {
                pairs.push((key, value));
            }
        }
    }

    pairs
}

/// Platform default location of the accessory config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reolink-motion-bridge").join("config.json"))
}

/// Immutable bridge configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub camera: CameraConfig,
    pub poll: PollConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera address, optionally with a `:port` suffix.
    pub host: String,
    pub username: String,
    pub password: String,
    pub channel: u8,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker URI such as `mqtt://10.0.0.2:1883`.
    pub broker: String,
    pub topic: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
    pub queue_capacity: usize,
}

/// Homebridge-style accessory config as written in `config.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessoryConfig {
    name: Option<String>,
    camera_ip: Option<String>,
    username: Option<String>,
    password: Option<String>,
    channel: Option<u8>,
    poll_interval: Option<u64>,
    request_timeout: Option<u64>,
    mqtt_broker: Option<String>,
    mqtt_topic: Option<String>,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    mqtt_client_id: Option<String>,
    mqtt_qos: Option<u8>,
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn random_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("reolink-motion-bridge-{}", &id[..8])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            camera: CameraConfig {
                host: String::new(),
                username: String::new(),
                password: String::new(),
                channel: 0,
                request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            },
            poll: PollConfig {
                interval_ms: DEFAULT_POLL_INTERVAL_MS,
            },
            mqtt: MqttConfig {
                broker: String::new(),
                topic: String::new(),
                client_id: random_client_id(),
                username: None,
                password: None,
                qos: 0,
                keep_alive_secs: 30,
                reconnect_delay_ms: 5000,
                queue_capacity: 64,
            },
        }
    }
}

impl Config {
    /// Parse an accessory config JSON document on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let accessory: AccessoryConfig = serde_json::from_str(json)?;
        let mut config = Self::default();
        config.apply_accessory(accessory);
        Ok(config)
    }

    /// Read an accessory config JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Load the config file (if any), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    log::info!("Using config file {}", path.display());
                    Self::from_file(path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_accessory(&mut self, accessory: AccessoryConfig) {
        if let Some(name) = accessory.name {
            self.name = name;
        }
        if let Some(host) = accessory.camera_ip {
            self.camera.host = host;
        }
        if let Some(username) = accessory.username {
            self.camera.username = username;
        }
        if let Some(password) = accessory.password {
            self.camera.password = password;
        }
        if let Some(channel) = accessory.channel {
            self.camera.channel = channel;
        }
        if let Some(interval) = accessory.poll_interval {
            self.poll.interval_ms = interval;
        }
        if let Some(timeout) = accessory.request_timeout {
            self.camera.request_timeout_ms = timeout;
        }
        if let Some(broker) = accessory.mqtt_broker {
            self.mqtt.broker = broker;
        }
        if let Some(topic) = accessory.mqtt_topic {
            self.mqtt.topic = topic;
        }
        // Config UIs write "" for cleared fields
        if let Some(username) = accessory.mqtt_username {
            self.mqtt.username = non_empty(username);
        }
        if let Some(password) = accessory.mqtt_password {
            self.mqtt.password = non_empty(password);
        }
        if let Some(client_id) = accessory.mqtt_client_id {
            self.mqtt.client_id = client_id;
        }
        if let Some(qos) = accessory.mqtt_qos {
            self.mqtt.qos = qos;
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("DEVICE_NAME") {
            self.name = name;
        }

        // Camera
        if let Some(host) = lookup("REOLINK_CAMERA_IP") {
            self.camera.host = host;
        }
        if let Some(username) = lookup("REOLINK_USERNAME") {
            self.camera.username = username;
        }
        if let Some(password) = lookup("REOLINK_PASSWORD") {
            self.camera.password = password;
        }
        if let Some(channel) = lookup("REOLINK_CHANNEL")
            && let Ok(c) = channel.parse()
        {
            self.camera.channel = c;
        }
        if let Some(timeout) = lookup("REQUEST_TIMEOUT_MS")
            && let Ok(t) = timeout.parse()
        {
            self.camera.request_timeout_ms = t;
        }
        if let Some(interval) = lookup("POLL_INTERVAL_MS")
            && let Ok(i) = interval.parse()
        {
            self.poll.interval_ms = i;
        }

        // MQTT
        if let Some(broker) = lookup("MQTT_BROKER") {
            self.mqtt.broker = broker;
        }
        if let Some(topic) = lookup("MQTT_TOPIC") {
            self.mqtt.topic = topic;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(username) = lookup("MQTT_USERNAME") {
            self.mqtt.username = non_empty(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = non_empty(password);
        }
        if let Some(qos) = lookup("MQTT_QOS")
            && let Ok(q) = qos.parse()
        {
            self.mqtt.qos = q;
        }
    }

    /// Reject configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.camera.host.trim().is_empty() {
            return Err(BridgeError::MissingConfig("cameraIp"));
        }
        if self.camera.username.is_empty() {
            return Err(BridgeError::MissingConfig("username"));
        }
        if self.camera.password.is_empty() {
            return Err(BridgeError::MissingConfig("password"));
        }
        if self.mqtt.broker.trim().is_empty() {
            return Err(BridgeError::MissingConfig("mqttBroker"));
        }
        if self.mqtt.topic.is_empty() {
            return Err(BridgeError::MissingConfig("mqttTopic"));
        }
        if self.mqtt.topic.contains(['+', '#']) {
            return Err(BridgeError::InvalidConfig(format!(
                "mqttTopic must not contain wildcards: {}",
                self.mqtt.topic
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(BridgeError::InvalidConfig(
                "pollInterval must be greater than zero".to_string(),
            ));
        }
        if self.camera.request_timeout_ms == 0 {
            return Err(BridgeError::InvalidConfig(
                "requestTimeout must be greater than zero".to_string(),
            ));
        }
        if self.mqtt.qos > 2 {
            return Err(BridgeError::InvalidConfig(format!(
                "mqttQos must be 0, 1 or 2, got {}",
                self.mqtt.qos
            )));
        }
        if self.mqtt.queue_capacity == 0 {
            return Err(BridgeError::InvalidConfig(
                "MQTT queue capacity must be greater than zero".to_string(),
            ));
        }
        BrokerAddress::parse(&self.mqtt.broker)?;
        Ok(())
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl CameraConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl MqttConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
