//! Outbound MQTT requests, behind a trait so the bridge can be driven
//! without a broker.

use std::future::Future;

use rumqttc::{AsyncClient, QoS};

use crate::error::MqttError;

/// The requests the bridge makes. Every message goes out at least once.
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        topic: String,
        retain: bool,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), MqttError>> + Send;

    fn subscribe(&self, filter: String) -> impl Future<Output = Result<(), MqttError>> + Send;

    fn unsubscribe(&self, filter: String) -> impl Future<Output = Result<(), MqttError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), MqttError>> + Send;
}

/// A rumqttc client connected to one broker.
#[derive(Clone)]
pub struct BrokerClient {
    client: AsyncClient,
    broker: String,
}

impl BrokerClient {
    #[must_use]
    pub fn new(client: AsyncClient, broker: String) -> Self {
        Self { client, broker }
    }

    fn error(&self, source: rumqttc::ClientError) -> MqttError {
        MqttError::Client {
            broker: self.broker.clone(),
            source,
        }
    }
}

impl Publisher for BrokerClient {
    async fn publish(&self, topic: String, retain: bool, payload: Vec<u8>) -> Result<(), MqttError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(|source| self.error(source))
    }

    async fn subscribe(&self, filter: String) -> Result<(), MqttError> {
        self.client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|source| self.error(source))
    }

    async fn unsubscribe(&self, filter: String) -> Result<(), MqttError> {
        self.client
            .unsubscribe(filter)
            .await
            .map_err(|source| self.error(source))
    }

    async fn disconnect(&self) -> Result<(), MqttError> {
        self.client
            .disconnect()
            .await
            .map_err(|source| self.error(source))
    }
}
