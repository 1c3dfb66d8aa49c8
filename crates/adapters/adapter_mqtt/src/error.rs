//! MQTT adapter error types.

use luftuj_domain::error::{ConnectionError, LuftujError};

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client refused a request (its event loop is gone).
    #[error("MQTT client error talking to {broker}")]
    Client {
        broker: String,
        #[source]
        source: rumqttc::ClientError,
    },

    /// Failed to serialize an outbound payload as JSON.
    #[error("failed to serialize MQTT payload")]
    Serialize(#[source] serde_json::Error),

    /// An inbound command payload could not be understood.
    #[error("invalid payload on {topic}: {payload:?}")]
    InvalidPayload { topic: String, payload: String },
}

impl MqttError {
    /// Convert into a [`LuftujError`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> LuftujError {
        match self {
            Self::Client { broker, source } => ConnectionError::Transport {
                endpoint: broker,
                source: Box::new(source),
            }
            .into(),
            other => LuftujError::Storage(Box::new(other)),
        }
    }
}

impl From<MqttError> for LuftujError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
