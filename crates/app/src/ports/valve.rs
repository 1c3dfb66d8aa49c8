//! Valve port — the external control surface of the dampers.

use std::future::Future;

use tokio::sync::broadcast;

use luftuj_domain::error::LuftujError;
use luftuj_domain::valve::{ValveSnapshot, ValveStateChange};

/// Something that owns the physical dampers (Home Assistant, a simulator).
pub trait ValveControl: Send + Sync {
    /// Current state of every known damper.
    fn fetch_entities(&self) -> impl Future<Output = Result<Vec<ValveSnapshot>, LuftujError>> + Send;

    /// Command a damper to `value` percent.
    fn set_value(&self, id: &str, value: f64) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Stream of state-changed notifications.
    fn subscribe_state_changes(&self) -> broadcast::Receiver<ValveStateChange>;
}
