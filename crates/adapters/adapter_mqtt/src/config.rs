//! MQTT integration configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the MQTT bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Whether the bridge is started at all.
    pub enabled: bool,
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Base topic prefix for all luftuj MQTT communication.
    pub base_topic: String,
    /// Prefix Home Assistant listens on for discovery documents.
    pub discovery_prefix: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// Pause before reconnecting after a broker error, in seconds.
    pub reconnect_delay_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "luftuj".to_string(),
            username: None,
            password: None,
            base_topic: "luftuj".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
        }
    }
}

impl MqttConfig {
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// `host:port` of the broker, for logs and errors.
    #[must_use]
    pub fn broker(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = MqttConfig::default();
        assert!(config.enabled);
        assert_eq!(config.broker_host, "localhost");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.client_id, "luftuj");
        assert_eq!(config.base_topic, "luftuj");
        assert_eq!(config.discovery_prefix, "homeassistant");
        assert_eq!(config.keep_alive(), Duration::from_secs(30));
        assert!(config.username.is_none());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            broker_host = "mqtt.example.com"
            broker_port = 8883
            client_id = "attic-hru"
            username = "luftuj"
            password = "secret"
            discovery_prefix = "ha"
            keep_alive_secs = 60
        "#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker(), "mqtt.example.com:8883");
        assert_eq!(config.client_id, "attic-hru");
        assert_eq!(config.username.as_deref(), Some("luftuj"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.discovery_prefix, "ha");
        assert_eq!(config.keep_alive_secs, 60);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let toml = r#"broker_host = "192.168.1.100""#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_host, "192.168.1.100");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.client_id, "luftuj");
    }
}
