//! Broker connection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Topic the door-open command is published on. The payload is a plain
/// control verb, not JSON, as required by the paired firmware.
pub const CONTROL_TOPIC: &str = "datacenter/control";

/// Control verb understood by the door firmware.
pub const OPEN_DOOR_COMMAND: &str = "OPEN_DOOR";

/// Connection and retry settings for the single broker link.
///
/// The retry interval is fixed, not exponential; the firmware side expects
/// clients to come back at a steady cadence. `max_connect_attempts` bounds
/// how long the supervisor keeps trying before surfacing `Disconnected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker address as `host` or `host:port`.
    pub url: String,
    pub user: String,
    pub pw: String,
    pub client_id: String,
    /// Topics subscribed after every (re)connect.
    pub topics: Vec<String>,
    pub keep_alive_secs: u64,
    pub retry_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_connect_attempts: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: "localhost:1883".to_string(),
            user: String::new(),
            pw: String::new(),
            // Kept from the installation firmware pairing
            client_id: "ESP32_Datacentersecurity".to_string(),
            topics: vec![
                "datacenter/motion".to_string(),
                "datacenter/status".to_string(),
            ],
            keep_alive_secs: 60,
            retry_interval_secs: 5,
            connect_timeout_secs: 30,
            max_connect_attempts: 12,
        }
    }
}

impl MqttConfig {
    /// Split the configured url into host and port, defaulting to 1883.
    pub fn host_and_port(&self) -> (String, u16) {
        match self.url.split_once(':') {
            Some((host, port)) => {
                let port = port.parse().unwrap_or(1883);
                (host.to_string(), port)
            }
            None => (self.url.clone(), 1883),
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_with_port_is_split() {
        let config = MqttConfig {
            url: "10.75.158.160:9001".to_string(),
            ..Default::default()
        };
        assert_eq!(config.host_and_port(), ("10.75.158.160".to_string(), 9001));
    }

    #[test]
    fn url_without_port_uses_the_mqtt_default() {
        let config = MqttConfig {
            url: "broker.local".to_string(),
            ..Default::default()
        };
        assert_eq!(config.host_and_port(), ("broker.local".to_string(), 1883));
    }
}
