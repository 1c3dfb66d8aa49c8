//! Valve manager — authoritative in-memory map of damper states.
//!
//! One async mutex guards the map. Every public operation runs inside it,
//! including the forwarded write to the control surface, so a `set_value`
//! and an inbound state change can never interleave. Each accepted change
//! is broadcast as a [`ValveMessage::Update`], also when the value did not
//! move.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use luftuj_domain::error::{LuftujError, ValidationError};
use luftuj_domain::time::now;
use luftuj_domain::valve::{
    ValveMessage, ValveSnapshot, ValveStateChange, format_state, validate_aperture,
};

use crate::event_bus::EventBus;
use crate::ports::ValveControl;

/// Capacity of the broadcast channel towards live clients.
const BROADCAST_CAPACITY: usize = 64;

pub struct ValveManager<V> {
    control: V,
    valves: Mutex<BTreeMap<String, ValveSnapshot>>,
    bus: EventBus<ValveMessage>,
    listener: StdMutex<Option<JoinHandle<()>>>,
}

impl<V> ValveManager<V>
where
    V: ValveControl + 'static,
{
    pub fn new(control: V) -> Self {
        Self {
            control,
            valves: Mutex::new(BTreeMap::new()),
            bus: EventBus::new(BROADCAST_CAPACITY),
            listener: StdMutex::new(None),
        }
    }

    /// Subscribe to `snapshot` / `update` messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ValveMessage> {
        self.bus.subscribe()
    }

    /// Load the dampers from the control surface and follow its state
    /// changes until [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// Returns the control surface's error when the initial fetch fails.
    pub async fn start(self: &Arc<Self>) -> Result<(), LuftujError> {
        // Subscribe before fetching so no change falls between the two.
        let mut changes = self.control.subscribe_state_changes();
        self.refresh().await?;

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => this.apply_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "valve state stream lagged, refetching");
                        if let Err(err) = this.refresh().await {
                            tracing::warn!(error = %err, "failed to refetch valves");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("valve state stream closed");
                        break;
                    }
                }
            }
        });

        let previous = self
            .listener
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    /// Stop following state changes. The last known map is kept.
    pub fn stop(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Copies of every snapshot, ordered by id.
    pub async fn snapshot(&self) -> Vec<ValveSnapshot> {
        self.valves.lock().await.values().cloned().collect()
    }

    /// Command damper `id` to `value` and broadcast the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownValve`] or
    /// [`ValidationError::ApertureOutOfRange`] without touching the
    /// control surface, otherwise the control surface's error.
    pub async fn set_value(&self, id: &str, value: f64) -> Result<ValveSnapshot, LuftujError> {
        validate_aperture(value)?;
        let mut valves = self.valves.lock().await;
        let Some(snapshot) = valves.get_mut(id) else {
            return Err(ValidationError::UnknownValve(id.to_string()).into());
        };

        self.control.set_value(id, value).await?;

        snapshot.value = value;
        snapshot.state = format_state(value);
        snapshot.last_updated = now();
        let updated = snapshot.clone();
        self.bus.publish(ValveMessage::Update(updated.clone()));
        tracing::debug!(valve = %id, value, "valve set");
        Ok(updated)
    }

    async fn refresh(&self) -> Result<(), LuftujError> {
        let entities = self.control.fetch_entities().await?;
        let mut valves = self.valves.lock().await;
        *valves = entities
            .into_iter()
            .map(|snapshot| (snapshot.id.clone(), snapshot))
            .collect();
        tracing::info!(count = valves.len(), "valves loaded");
        self.bus
            .publish(ValveMessage::Snapshot(valves.values().cloned().collect()));
        Ok(())
    }

    async fn apply_change(&self, change: ValveStateChange) {
        let mut valves = self.valves.lock().await;
        let Some(snapshot) = valves.get_mut(&change.id) else {
            tracing::debug!(valve = %change.id, "ignoring change of untracked valve");
            return;
        };
        snapshot.apply(&change);
        self.bus.publish(ValveMessage::Update(snapshot.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeValves;
    use std::time::Duration;

    async fn started(ids: &[&str]) -> (Arc<ValveManager<FakeValves>>, FakeValves) {
        let control = FakeValves::with(ids);
        let manager = Arc::new(ValveManager::new(control.clone()));
        manager.start().await.unwrap();
        (manager, control)
    }

    #[tokio::test]
    async fn should_load_snapshot_on_start() {
        let (manager, _) = started(&["number.bedroom", "number.kitchen"]).await;

        let ids: Vec<_> = manager.snapshot().await.into_iter().map(|s| s.id).collect();

        assert_eq!(ids, vec!["number.bedroom", "number.kitchen"]);
    }

    #[tokio::test]
    async fn should_forward_update_and_broadcast() {
        let (manager, control) = started(&["number.bedroom"]).await;
        let mut rx = manager.subscribe();

        let snapshot = manager.set_value("number.bedroom", 40.0).await.unwrap();

        assert!((snapshot.value - 40.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.state, "40");
        assert_eq!(control.calls(), vec![("number.bedroom".to_string(), 40.0)]);
        assert!(matches!(
            rx.recv().await.unwrap(),
            ValveMessage::Update(s) if s.id == "number.bedroom"
        ));
    }

    #[tokio::test]
    async fn should_broadcast_twice_for_repeated_value() {
        let (manager, _) = started(&["number.bedroom"]).await;
        let mut rx = manager.subscribe();

        manager.set_value("number.bedroom", 25.0).await.unwrap();
        manager.set_value("number.bedroom", 25.0).await.unwrap();

        for _ in 0..2 {
            let ValveMessage::Update(snapshot) = rx.recv().await.unwrap() else {
                panic!("expected update");
            };
            assert!((snapshot.value - 25.0).abs() < f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn should_reject_unknown_valve_without_forwarding() {
        let (manager, control) = started(&["number.bedroom"]).await;

        let result = manager.set_value("number.attic", 10.0).await;

        assert!(matches!(
            result,
            Err(LuftujError::Validation(ValidationError::UnknownValve(id))) if id == "number.attic"
        ));
        assert!(control.calls().is_empty());
    }

    #[tokio::test]
    async fn should_reject_out_of_range_aperture() {
        let (manager, control) = started(&["number.bedroom"]).await;

        let result = manager.set_value("number.bedroom", 120.0).await;

        assert!(matches!(
            result,
            Err(LuftujError::Validation(ValidationError::ApertureOutOfRange(_)))
        ));
        assert!(control.calls().is_empty());
    }

    #[tokio::test]
    async fn should_keep_snapshot_when_control_surface_fails() {
        let (manager, control) = started(&["number.bedroom"]).await;
        control.fail_on("number.bedroom");

        let result = manager.set_value("number.bedroom", 70.0).await;

        assert!(matches!(result, Err(LuftujError::Connection(_))));
        let snapshot = manager.snapshot().await;
        assert!(snapshot[0].value.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn should_apply_external_state_change_and_broadcast_delta() {
        let (manager, control) = started(&["number.bedroom"]).await;
        let mut rx = manager.subscribe();

        control.emit(ValveStateChange {
            id: "number.bedroom".to_string(),
            value: 80.0,
            state: "80".to_string(),
            attributes: None,
            at: now(),
        });

        let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(message, ValveMessage::Update(s) if (s.value - 80.0).abs() < f64::EPSILON));
        assert!((manager.snapshot().await[0].value - 80.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn should_stop_following_changes_after_stop() {
        let (manager, control) = started(&["number.bedroom"]).await;
        manager.stop();
        tokio::task::yield_now().await;

        control.emit(ValveStateChange {
            id: "number.bedroom".to_string(),
            value: 55.0,
            state: "55".to_string(),
            attributes: None,
            at: now(),
        });
        tokio::task::yield_now().await;

        assert!(manager.snapshot().await[0].value.abs() < f64::EPSILON);
    }
}
