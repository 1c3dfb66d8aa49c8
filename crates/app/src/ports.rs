//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod bridge;
pub mod configuration;
pub mod register;
pub mod storage;
pub mod valve;

pub use bridge::{BridgeCommand, BridgeEvent, DiscoveryRequest, HomeBridge};
pub use configuration::{ConfigurationSource, ResolvedConfiguration};
pub use register::{ClientRegistry, Endpoint, RegisterClient};
pub use storage::{SettingsRepository, TimelineRepository};
pub use valve::ValveControl;
