//! Bridge port — the home-automation bus (MQTT with Home Assistant discovery).
//!
//! Outbound calls go through [`HomeBridge`]. Inbound traffic is delivered
//! as typed [`BridgeEvent`]s on a channel owned by the adapter.

use std::future::Future;

use luftuj_domain::device::DeviceDefinition;
use luftuj_domain::error::LuftujError;
use luftuj_domain::hru_state::HruState;
use luftuj_domain::id::ModeId;
use luftuj_domain::timeline::Mode;

/// A remote command received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    StartBoost { mode_id: ModeId },
    CancelBoost,
    SetBoostDuration(u32),
}

/// Inbound notification from the bridge adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// (Re)connected to the broker; subscriptions are in place.
    Connected,
    Disconnected,
    Command(BridgeCommand),
}

/// Everything needed to publish the discovery documents once.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub definition: &'static DeviceDefinition,
    /// Slug of the configured unit; topics are rebuilt when it changes.
    pub unit: String,
    /// Modes flagged as boost, each becomes a start button.
    pub boost_modes: Vec<Mode>,
}

/// Outbound side of the bus.
pub trait HomeBridge: Send + Sync {
    /// Publish the merged device state.
    fn publish_state(&self, state: &HruState) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Echo the stored boost duration.
    fn publish_boost_duration(
        &self,
        minutes: u32,
    ) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Publish (and reconcile) the discovery documents.
    fn publish_discovery(
        &self,
        request: &DiscoveryRequest,
    ) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Mark the unit unavailable and close the session.
    fn shutdown(&self) -> impl Future<Output = Result<(), LuftujError>> + Send;
}
