//! # luftuj-adapter-virtual
//!
//! Virtual/demo valve control surface: simulated dampers for running the
//! controller without Home Assistant.
//!
//! ## Behaviour
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `fetch_entities` | Snapshot of every configured damper |
//! | `set_value` | Moves the damper and echoes a state-change event |
//! | [`VirtualValves::nudge`] | Simulates a change made outside the controller |
//!
//! ## Dependency rule
//!
//! Depends on `luftuj-app` (port traits) and `luftuj-domain` only.

mod devices;

use std::collections::BTreeMap;

use serde::Deserialize;
use tokio::sync::broadcast;

use luftuj_app::ports::ValveControl;
use luftuj_domain::error::{LuftujError, NotFoundError};
use luftuj_domain::valve::{ValveSnapshot, ValveStateChange};

pub use devices::VirtualDamper;

const CHANGE_CAPACITY: usize = 32;

/// One simulated damper in the configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DamperConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub initial: f64,
}

/// Virtual control surface holding a fixed set of dampers.
pub struct VirtualValves {
    dampers: BTreeMap<String, VirtualDamper>,
    changes: broadcast::Sender<ValveStateChange>,
}

impl VirtualValves {
    #[must_use]
    pub fn new(configs: &[DamperConfig]) -> Self {
        let dampers = configs
            .iter()
            .map(|config| {
                let name = config.name.clone().unwrap_or_else(|| config.id.clone());
                (
                    config.id.clone(),
                    VirtualDamper::new(config.id.clone(), name, config.initial),
                )
            })
            .collect();
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { dampers, changes }
    }

    fn damper(&self, id: &str) -> Result<&VirtualDamper, NotFoundError> {
        self.dampers.get(id).ok_or_else(|| NotFoundError {
            entity: "Valve",
            id: id.to_string(),
        })
    }

    fn emit(&self, change: ValveStateChange) {
        // No subscriber yet is fine; the next fetch sees the value.
        let _ = self.changes.send(change);
    }

    /// Move a damper as if someone changed it by hand.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown damper.
    pub fn nudge(&self, id: &str, value: f64) -> Result<(), NotFoundError> {
        let change = self.damper(id)?.set(value);
        tracing::debug!(valve = %id, value, "virtual damper nudged");
        self.emit(change);
        Ok(())
    }
}

impl ValveControl for VirtualValves {
    async fn fetch_entities(&self) -> Result<Vec<ValveSnapshot>, LuftujError> {
        Ok(self.dampers.values().map(VirtualDamper::snapshot).collect())
    }

    async fn set_value(&self, id: &str, value: f64) -> Result<(), LuftujError> {
        let change = self.damper(id)?.set(value);
        self.emit(change);
        Ok(())
    }

    fn subscribe_state_changes(&self) -> broadcast::Receiver<ValveStateChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valves() -> VirtualValves {
        VirtualValves::new(&[
            DamperConfig {
                id: "number.kitchen".to_string(),
                name: Some("Kitchen".to_string()),
                initial: 30.0,
            },
            DamperConfig {
                id: "number.bedroom".to_string(),
                name: None,
                initial: 0.0,
            },
        ])
    }

    #[tokio::test]
    async fn should_fetch_configured_dampers_in_id_order() {
        let entities = valves().fetch_entities().await.unwrap();

        let ids: Vec<_> = entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["number.bedroom", "number.kitchen"]);
        assert!((entities[1].value - 30.0).abs() < f64::EPSILON);
        assert_eq!(entities[0].attributes["friendly_name"], "number.bedroom");
    }

    #[tokio::test]
    async fn should_echo_state_change_on_set() {
        let valves = valves();
        let mut changes = valves.subscribe_state_changes();

        valves.set_value("number.kitchen", 55.0).await.unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.id, "number.kitchen");
        assert_eq!(change.state, "55");
    }

    #[tokio::test]
    async fn should_reject_unknown_damper() {
        let result = valves().set_value("number.attic", 10.0).await;

        assert!(matches!(result, Err(LuftujError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_emit_change_when_nudged() {
        let valves = valves();
        let mut changes = valves.subscribe_state_changes();

        valves.nudge("number.bedroom", 80.0).unwrap();

        assert!((changes.recv().await.unwrap().value - 80.0).abs() < f64::EPSILON);
        let entities = valves.fetch_entities().await.unwrap();
        assert!((entities[0].value - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_deserialize_damper_list_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            dampers: Vec<DamperConfig>,
        }
        let section: Section = toml::from_str(
            r#"
                [[dampers]]
                id = "number.bedroom"
                name = "Bedroom"

                [[dampers]]
                id = "number.kitchen"
                initial = 25.0
            "#,
        )
        .unwrap();
        assert_eq!(section.dampers.len(), 2);
        assert_eq!(section.dampers[0].name.as_deref(), Some("Bedroom"));
        assert!((section.dampers[1].initial - 25.0).abs() < f64::EPSILON);
    }
}
