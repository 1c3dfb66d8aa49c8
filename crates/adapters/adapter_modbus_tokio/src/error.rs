//! Modbus adapter error types.

use luftuj_domain::error::{ConnectionError, LuftujError, ProtocolError};
use tokio_modbus::ExceptionCode;

/// Errors specific to the Modbus adapter.
#[derive(Debug, thiserror::Error)]
pub enum ModbusError {
    /// Resolving or opening the TCP connection failed.
    #[error("failed to connect to {endpoint}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection attempt or a request exceeded its timeout.
    #[error("{endpoint} did not answer in time")]
    Timeout { endpoint: String },

    /// The established connection failed mid-request.
    #[error("transport to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: tokio_modbus::Error,
    },

    /// The unit answered with a Modbus exception.
    #[error("{function} at address {address} rejected with {code}")]
    Exception {
        function: &'static str,
        address: u16,
        code: ExceptionCode,
    },
}

impl ModbusError {
    /// Whether the context must be dropped before the next request.
    #[must_use]
    pub fn breaks_connection(&self) -> bool {
        !matches!(self, Self::Exception { .. })
    }

    /// Convert into the matching [`LuftujError`] variant for propagation
    /// across port boundaries.
    pub fn into_domain(self) -> LuftujError {
        match self {
            Self::Connect { endpoint, source } => ConnectionError::Connect {
                endpoint,
                source: Box::new(source),
            }
            .into(),
            Self::Timeout { endpoint } => ConnectionError::Timeout { endpoint }.into(),
            Self::Transport { endpoint, source } => ConnectionError::Transport {
                endpoint,
                source: Box::new(source),
            }
            .into(),
            Self::Exception {
                function,
                address,
                code,
            } => ProtocolError::Exception {
                function,
                address,
                code: code.to_string(),
            }
            .into(),
        }
    }
}

impl From<ModbusError> for LuftujError {
    fn from(err: ModbusError) -> Self {
        err.into_domain()
    }
}
