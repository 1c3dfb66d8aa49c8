//! Active configuration resolver.
//!
//! Decides what the unit and the dampers should be set to right now and
//! applies it. An unexpired boost override wins; otherwise the weekly
//! schedule picks an event; otherwise nothing is managed and nothing is
//! written.
//!
//! ```text
//!        boost started                   boost expired / cancelled
//!  Idle ───────────────▶ Boosting ─────────────────────────────▶ Scheduled
//!   ▲                                                              │
//!   └──────────────────── no event applies ◀───────────────────────┘
//! ```

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use luftuj_domain::active_state::{ActiveSource, ActiveState};
use luftuj_domain::schedule::{FallbackPolicy, Origin, select_event};
use luftuj_domain::time::{Timestamp, now, to_local};
use luftuj_domain::timeline::{ModeSetting, TargetConfig, ValveConfig};

use crate::device::DeviceGateway;
use crate::ports::{
    ClientRegistry, ConfigurationSource, SettingsRepository, TimelineRepository, ValveControl,
};
use crate::settings::{self, BOOST_OVERRIDE_KEY};
use crate::trigger::Trigger;
use crate::valve_manager::ValveManager;

/// What one evaluation decided to apply.
struct Resolution {
    state: ActiveState,
    target: TargetConfig,
    valves: ValveConfig,
}

pub struct ActiveConfigResolver<C, R, S, T, V> {
    gateway: Arc<DeviceGateway<C, R>>,
    settings: S,
    timeline: T,
    valves: Arc<ValveManager<V>>,
    policy: FallbackPolicy,
    state: watch::Sender<ActiveState>,
    evaluation: Mutex<()>,
    reevaluate: Trigger,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl<C, R, S, T, V> ActiveConfigResolver<C, R, S, T, V>
where
    C: ConfigurationSource + 'static,
    R: ClientRegistry + 'static,
    S: SettingsRepository + 'static,
    T: TimelineRepository + 'static,
    V: ValveControl + 'static,
{
    pub fn new(
        gateway: Arc<DeviceGateway<C, R>>,
        settings: S,
        timeline: T,
        valves: Arc<ValveManager<V>>,
        policy: FallbackPolicy,
    ) -> Self {
        let (state, _) = watch::channel(ActiveState::default());
        Self {
            gateway,
            settings,
            timeline,
            valves,
            policy,
            state,
            evaluation: Mutex::new(()),
            reevaluate: Trigger::new(),
            task: StdMutex::new(None),
        }
    }

    /// Outcome of the latest evaluation.
    #[must_use]
    pub fn active_state(&self) -> ActiveState {
        self.state.borrow().clone()
    }

    /// Receiver notified whenever the active state changes (not on every
    /// evaluation).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ActiveState> {
        self.state.subscribe()
    }

    /// Handle that asks the running loop to re-evaluate immediately.
    #[must_use]
    pub fn reevaluate_trigger(&self) -> Trigger {
        self.reevaluate.clone()
    }

    /// Periodic evaluation; skipped when one is already running.
    pub async fn tick(&self) -> Option<ActiveState> {
        let Ok(_guard) = self.evaluation.try_lock() else {
            tracing::debug!("evaluation already in flight, skipping tick");
            return None;
        };
        Some(self.evaluate(now()).await)
    }

    /// Forced re-evaluation, waiting for a running one to finish first.
    pub async fn execute_scheduled_event(&self) -> ActiveState {
        let _guard = self.evaluation.lock().await;
        self.evaluate(now()).await
    }

    /// Evaluate every `period` and on [`reevaluate_trigger`] until
    /// [`stop`](Self::stop). Each evaluation runs on its own task.
    ///
    /// [`reevaluate_trigger`]: Self::reevaluate_trigger
    pub fn start(self: &Arc<Self>, period: Duration) {
        let this = Arc::clone(self);
        let trigger = self.reevaluate.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let this = Arc::clone(&this);
                        tokio::spawn(async move {
                            this.tick().await;
                        });
                    }
                    () = trigger.fired() => {
                        let this = Arc::clone(&this);
                        tokio::spawn(async move {
                            this.execute_scheduled_event().await;
                        });
                    }
                }
            }
        });
        tracing::info!(period_secs = period.as_secs(), "resolver started");
        let previous = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the timer loop. An evaluation already running completes.
    pub fn stop(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("resolver stopped");
        }
    }

    async fn evaluate(&self, now: Timestamp) -> ActiveState {
        let state = match self.resolve(now).await {
            Some(resolution) => {
                self.apply(&resolution).await;
                resolution.state
            }
            None => ActiveState::manual(now),
        };
        self.record(state.clone());
        state
    }

    async fn resolve(&self, now: Timestamp) -> Option<Resolution> {
        if let Some(resolution) = self.resolve_boost(now).await {
            return Some(resolution);
        }
        self.resolve_schedule(now).await
    }

    async fn resolve_boost(&self, now: Timestamp) -> Option<Resolution> {
        let boost = match settings::boost_override(&self.settings).await {
            Ok(boost) => boost?,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load boost override");
                return None;
            }
        };

        if !boost.is_active(now) {
            tracing::info!(mode_id = %boost.mode_id, "boost expired");
            if let Err(err) = self.settings.delete(BOOST_OVERRIDE_KEY).await {
                tracing::warn!(error = %err, "failed to clear expired boost");
            }
            return None;
        }

        let mode = match self.timeline.find_mode(boost.mode_id).await {
            Ok(Some(mode)) => mode,
            Ok(None) => {
                tracing::warn!(mode_id = %boost.mode_id, "boost references an unknown mode, ignoring");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load boost mode");
                return None;
            }
        };

        Some(Resolution {
            state: ActiveState {
                source: ActiveSource::Boost,
                mode_name: Some(mode.name),
                mode_id: Some(mode.id),
                event_id: None,
                boost_remaining: boost.remaining_minutes(now),
                evaluated_at: Some(now),
            },
            target: mode.target_config,
            valves: mode.valve_config,
        })
    }

    async fn resolve_schedule(&self, now: Timestamp) -> Option<Resolution> {
        let events = match self.timeline.list_events().await {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load timeline events");
                return None;
            }
        };
        let selection = select_event(&events, to_local(now), self.policy)?;
        if let Origin::CarriedOver { days_ago } = selection.origin {
            tracing::debug!(event_id = %selection.event.id, days_ago, "carrying over earlier event");
        }
        let event = selection.event.clone();

        let mode_name = match &event.target_config.mode {
            Some(ModeSetting::Name(name)) => Some(name.clone()),
            Some(ModeSetting::Code(code)) => self
                .gateway
                .configuration()
                .await
                .ok()
                .map(|config| config.definition.mode_label(*code).to_string()),
            None => None,
        };

        Some(Resolution {
            state: ActiveState {
                source: ActiveSource::Schedule,
                mode_name,
                mode_id: None,
                event_id: Some(event.id),
                boost_remaining: 0,
                evaluated_at: Some(now),
            },
            target: event.target_config,
            valves: event.valve_config,
        })
    }

    /// Dampers first, then the unit.
    async fn apply(&self, resolution: &Resolution) {
        for (id, value) in &resolution.valves {
            if let Err(err) = self.valves.set_value(id, *value).await {
                tracing::warn!(valve = %id, value, error = %err, "failed to set valve");
            }
        }

        if resolution.target.is_empty() {
            return;
        }
        match self.gateway.open().await {
            Ok(session) => {
                let report = session.apply_target(&resolution.target).await;
                tracing::debug!(
                    applied = report.applied.len(),
                    unsupported = report.unsupported.len(),
                    failed = report.failed.len(),
                    "target applied"
                );
            }
            Err(err) => tracing::warn!(error = %err, "device unavailable, skipping writes"),
        }
    }

    fn record(&self, state: ActiveState) {
        self.state.send_if_modified(|current| {
            let changed = current.source != state.source
                || current.mode_name != state.mode_name
                || current.mode_id != state.mode_id
                || current.event_id != state.event_id
                || current.boost_remaining != state.boost_remaining;
            if changed {
                tracing::info!(
                    source = %state.source,
                    mode = state.mode_name.as_deref().unwrap_or("-"),
                    boost_remaining = state.boost_remaining,
                    "active configuration changed"
                );
            }
            *current = state;
            changed
        });
    }
}
