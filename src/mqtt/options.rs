//! Broker address parsing and MQTT client options.

use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};
use rumqttc::{MqttOptions, QoS};
use std::time::Duration;
use url::Url;

/// Default plain-TCP MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

/// Host and port of the broker, parsed from the configured URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    /// Parse `mqtt://host[:port]`, `tcp://host[:port]` or a bare `host[:port]`.
    pub fn parse(broker: &str) -> Result<Self> {
        let broker = broker.trim();
        let uri = if broker.contains("://") {
            broker.to_string()
        } else {
            format!("mqtt://{}", broker)
        };

        let url = Url::parse(&uri)
            .map_err(|e| BridgeError::InvalidBrokerAddress(format!("{}: {}", broker, e)))?;

        match url.scheme() {
            "mqtt" | "tcp" => {}
            other => {
                return Err(BridgeError::InvalidBrokerAddress(format!(
                    "unsupported scheme '{}' in {}",
                    other, broker
                )));
            }
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BridgeError::InvalidBrokerAddress(format!("no host in {}", broker)))?;

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
        })
    }
}

/// Map the numeric QoS level from the config.
pub fn qos_from_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(BridgeError::InvalidConfig(format!(
            "MQTT QoS must be 0, 1 or 2, got {}",
            other
        ))),
    }
}

/// Build rumqttc options from the bridge config.
pub fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions> {
    let address = BrokerAddress::parse(&config.broker)?;
    let mut options = MqttOptions::new(&config.client_id, address.host, address.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    // Credentials are only sent as a pair
    if let (Some(username), Some(password)) = (&config.username, &config.password)
        && !username.is_empty()
        && !password.is_empty()
    {
        options.set_credentials(username, password);
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri_with_port() {
        let address = BrokerAddress::parse("mqtt://10.0.0.2:1884").unwrap();
        assert_eq!(
            address,
            BrokerAddress {
                host: "10.0.0.2".to_string(),
                port: 1884
            }
        );
    }

    #[test]
    fn test_parse_defaults_port() {
        assert_eq!(BrokerAddress::parse("tcp://broker.lan").unwrap().port, 1883);
        assert_eq!(BrokerAddress::parse("mqtt://broker.lan/").unwrap().port, 1883);
    }

    #[test]
    fn test_parse_bare_host() {
        let address = BrokerAddress::parse("broker.lan:1885").unwrap();
        assert_eq!(address.host, "broker.lan");
        assert_eq!(address.port, 1885);

        assert_eq!(BrokerAddress::parse("broker.lan").unwrap().port, 1883);
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert!(matches!(
            BrokerAddress::parse("mqtts://broker.lan"),
            Err(BridgeError::InvalidBrokerAddress(_))
        ));
        assert!(matches!(
            BrokerAddress::parse("mqtt://"),
            Err(BridgeError::InvalidBrokerAddress(_))
        ));
    }

    #[test]
    fn test_qos_levels() {
        assert_eq!(qos_from_level(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1).unwrap(), QoS::AtLeastOnce);
        assert!(qos_from_level(7).is_err());
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let mut config = crate::config::Config::default().mqtt;
        config.broker = "mqtt://broker.lan".to_string();
        config.username = Some("user".to_string());

        let options = mqtt_options(&config).unwrap();
        assert!(options.credentials().is_none());

        config.password = Some("pass".to_string());
        let options = mqtt_options(&config).unwrap();
        assert_eq!(
            options.credentials(),
            Some(("user".to_string(), "pass".to_string()))
        );
    }

    #[test]
    fn test_empty_credentials_are_not_sent() {
        let config = crate::config::Config::from_json(
            r#"{
                "mqttBroker": "mqtt://broker.lan",
                "mqttUsername": "",
                "mqttPassword": ""
            }"#,
        )
        .unwrap();
        let options = mqtt_options(&config.mqtt).unwrap();
        assert!(options.credentials().is_none());

        let mut mqtt = config.mqtt;
        mqtt.username = Some("user".to_string());
        mqtt.password = Some(String::new());
        let options = mqtt_options(&mqtt).unwrap();
        assert!(options.credentials().is_none());
    }
}
