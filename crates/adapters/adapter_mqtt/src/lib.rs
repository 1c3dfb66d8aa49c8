//! # luftuj-adapter-mqtt
//!
//! MQTT adapter — exposes the HRU to Home Assistant through an MQTT broker.
//!
//! ## Responsibilities
//! - Connect to the broker with an `offline` last will on the status topic
//! - Publish retained discovery documents and clear the ones of boost modes
//!   that were renamed, deleted or un-flagged
//! - Publish device state and the stored boost duration
//! - Subscribe to the boost command topics and turn inbound messages into
//!   typed `BridgeEvent`s
//! - Move every retained message and subscription when the configured unit
//!   changes
//!
//! ## Dependency rule
//! Same as other adapters: depends on `luftuj-app` and `luftuj-domain`.

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod publisher;
pub mod topics;

pub use bridge::MqttBridge;
pub use config::MqttConfig;
pub use error::MqttError;
pub use publisher::{BrokerClient, Publisher};
