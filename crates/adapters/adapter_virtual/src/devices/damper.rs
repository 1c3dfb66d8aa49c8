//! Virtual damper — holds an aperture and reports it like a number entity.

use std::sync::Mutex;

use luftuj_domain::time::now;
use luftuj_domain::valve::{ValveSnapshot, ValveStateChange, format_state};

/// A simulated motorised damper.
pub struct VirtualDamper {
    id: String,
    friendly_name: String,
    value: Mutex<f64>,
}

impl VirtualDamper {
    #[must_use]
    pub fn new(id: impl Into<String>, friendly_name: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            friendly_name: friendly_name.into(),
            value: Mutex::new(value),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut attributes = serde_json::Map::new();
        attributes.insert(
            "friendly_name".to_string(),
            serde_json::Value::String(self.friendly_name.clone()),
        );
        attributes
    }

    fn lock_value(&self) -> std::sync::MutexGuard<'_, f64> {
        self.value
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current state as the control surface reports it.
    #[must_use]
    pub fn snapshot(&self) -> ValveSnapshot {
        let mut snapshot = ValveSnapshot::new(self.id.clone(), *self.lock_value(), now());
        snapshot.attributes = self.attributes();
        snapshot
    }

    /// Move to `value` and describe the change.
    pub fn set(&self, value: f64) -> ValveStateChange {
        *self.lock_value() = value;
        ValveStateChange {
            id: self.id.clone(),
            value,
            state: format_state(value),
            attributes: Some(self.attributes()),
            at: now(),
        }
    }
}
