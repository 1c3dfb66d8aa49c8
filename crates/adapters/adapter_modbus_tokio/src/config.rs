//! Modbus connection settings.

use std::time::Duration;

use serde::Deserialize;

/// Timeouts shared by every client of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    /// Upper bound for opening the TCP connection, in seconds.
    pub connect_timeout_secs: u64,
    /// Upper bound for one request/response exchange, in seconds.
    pub request_timeout_secs: u64,
    /// How long a client still counts as connected after its last
    /// successful exchange, in seconds.
    pub grace_secs: u64,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 5,
            grace_secs: 15,
        }
    }
}

impl ModbusConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}
