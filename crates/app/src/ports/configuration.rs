//! Configuration port — which unit is installed and where it lives.

use std::future::Future;

use luftuj_domain::device::DeviceDefinition;
use luftuj_domain::error::LuftujError;

use super::register::Endpoint;

/// Device settings joined with the static definition of the unit model.
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    pub endpoint: Endpoint,
    pub definition: &'static DeviceDefinition,
    /// Topic-safe unit identifier used in MQTT topics.
    pub unit: String,
}

/// Source of the current [`ResolvedConfiguration`].
pub trait ConfigurationSource: Send + Sync {
    fn resolve(&self) -> impl Future<Output = Result<ResolvedConfiguration, LuftujError>> + Send;
}
