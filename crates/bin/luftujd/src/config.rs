//! Configuration loading — TOML file with environment variable overrides.
//!
//! Reads `luftuj.toml` (or the path given with `--config`). Every field has
//! a sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use luftuj_adapter_modbus_tokio::ModbusConfig;
use luftuj_adapter_mqtt::config::MqttConfig;
use luftuj_adapter_virtual::DamperConfig;
use luftuj_app::configuration::HruSettings;
use luftuj_domain::device::catalog;
use luftuj_domain::schedule::FallbackPolicy;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The installed unit.
    pub hru: HruConfig,
    /// Modbus timeouts.
    pub modbus: ModbusConfig,
    /// Home Assistant bridge.
    pub mqtt: MqttConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Periodic loops.
    pub scheduler: SchedulerConfig,
    /// Simulated dampers.
    pub valves: ValvesConfig,
}

/// Default unit settings, used until different ones are stored.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HruConfig {
    /// Device definition code, e.g. `atrea-rd5`.
    pub unit: String,
    /// Modbus TCP host. Empty means not configured yet.
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Periods of the background loops and the schedule fallback.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Active configuration evaluation period, in seconds.
    pub tick_secs: u64,
    /// Device read-back period, in seconds.
    pub poll_secs: u64,
    /// Discovery republish period, in seconds.
    pub discovery_secs: u64,
    /// What applies when no event has started yet today.
    pub fallback: FallbackPolicy,
}

/// Virtual damper set.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValvesConfig {
    pub dampers: Vec<DamperConfig>,
}

impl Config {
    /// Load configuration from `path` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LUFTUJ_HRU_UNIT") {
            self.hru.unit = val;
        }
        if let Ok(val) = std::env::var("LUFTUJ_HRU_HOST") {
            self.hru.host = val;
        }
        if let Ok(val) = std::env::var("LUFTUJ_HRU_PORT") {
            if let Ok(port) = val.parse() {
                self.hru.port = port;
            }
        }
        if let Ok(val) = std::env::var("LUFTUJ_HRU_UNIT_ID") {
            if let Ok(unit_id) = val.parse() {
                self.hru.unit_id = unit_id;
            }
        }
        if let Ok(val) = std::env::var("LUFTUJ_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Ok(val) = std::env::var("LUFTUJ_MQTT_PORT") {
            if let Ok(port) = val.parse() {
                self.mqtt.broker_port = port;
            }
        }
        if let Ok(val) = std::env::var("LUFTUJ_MQTT_USERNAME") {
            self.mqtt.username = Some(val);
        }
        if let Ok(val) = std::env::var("LUFTUJ_MQTT_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        if let Ok(val) = std::env::var("LUFTUJ_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("LUFTUJ_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if catalog::find(&self.hru.unit).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown unit `{}`",
                self.hru.unit
            )));
        }
        if self.hru.port == 0 {
            return Err(ConfigError::Validation(
                "hru port must be non-zero".to_string(),
            ));
        }
        if self.mqtt.enabled && self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "mqtt broker port must be non-zero".to_string(),
            ));
        }
        if self.scheduler.tick_secs == 0
            || self.scheduler.poll_secs == 0
            || self.scheduler.discovery_secs == 0
        {
            return Err(ConfigError::Validation(
                "scheduler periods must be non-zero".to_string(),
            ));
        }
        if let FallbackPolicy::LookBack { days } = self.scheduler.fallback {
            if !(1..=7).contains(&days) {
                return Err(ConfigError::Validation(format!(
                    "fallback look-back must be 1..=7 days, got {days}"
                )));
            }
        }

        let mut seen = HashSet::new();
        for damper in &self.valves.dampers {
            if !seen.insert(damper.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate damper `{}`",
                    damper.id
                )));
            }
            if !(0.0..=100.0).contains(&damper.initial) {
                return Err(ConfigError::Validation(format!(
                    "damper `{}` starts outside 0..=100",
                    damper.id
                )));
            }
        }
        Ok(())
    }

    /// Unit settings used until others are stored.
    #[must_use]
    pub fn hru_settings(&self) -> HruSettings {
        HruSettings {
            unit: self.hru.unit.clone(),
            host: self.hru.host.clone(),
            port: self.hru.port,
            unit_id: self.hru.unit_id,
        }
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    #[must_use]
    pub fn poll(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }

    #[must_use]
    pub fn discovery(&self) -> Duration {
        Duration::from_secs(self.discovery_secs)
    }
}

impl Default for HruConfig {
    fn default() -> Self {
        Self {
            unit: "atrea-rd5".to_string(),
            host: String::new(),
            port: 502,
            unit_id: 1,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:luftuj.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "luftujd=info,luftuj=info".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            poll_secs: 10,
            discovery_secs: 60,
            fallback: FallbackPolicy::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
