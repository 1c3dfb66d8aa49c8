//! Device synchronizer — reads the unit back and publishes its state.
//!
//! A poll cycle runs every period, whenever the trigger fires (bridge
//! connected, command received) and whenever the resolver's active state
//! changes. A cycle requested while another one is in flight is dropped,
//! not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use luftuj_domain::active_state::ActiveState;
use luftuj_domain::hru_state::HruState;
use luftuj_domain::time::{Timestamp, now};

use crate::device::DeviceGateway;
use crate::ports::{ClientRegistry, ConfigurationSource, HomeBridge};
use crate::trigger::Trigger;

/// Result of one [`DeviceSynchronizer::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Published(HruState),
    /// Another cycle was in flight.
    Skipped,
    Failed,
}

/// Clears the in-flight flag however the cycle ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DeviceSynchronizer<C, R, B> {
    gateway: Arc<DeviceGateway<C, R>>,
    bridge: Arc<B>,
    active: watch::Receiver<ActiveState>,
    in_flight: AtomicBool,
    last_success: StdMutex<Option<Timestamp>>,
    trigger: Trigger,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl<C, R, B> DeviceSynchronizer<C, R, B>
where
    C: ConfigurationSource + 'static,
    R: ClientRegistry + 'static,
    B: HomeBridge + 'static,
{
    pub fn new(
        gateway: Arc<DeviceGateway<C, R>>,
        bridge: Arc<B>,
        active: watch::Receiver<ActiveState>,
    ) -> Self {
        Self {
            gateway,
            bridge,
            active,
            in_flight: AtomicBool::new(false),
            last_success: StdMutex::new(None),
            trigger: Trigger::new(),
            task: StdMutex::new(None),
        }
    }

    /// Handle that requests a poll as soon as possible.
    #[must_use]
    pub fn trigger(&self) -> Trigger {
        self.trigger.clone()
    }

    /// When state was last read and published successfully.
    #[must_use]
    pub fn last_success(&self) -> Option<Timestamp> {
        *self
            .last_success
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run one cycle unless one is already running.
    ///
    /// Read failures end the cycle; the shared client stays registered so
    /// other users keep it.
    pub async fn poll(&self) -> PollOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("poll already in flight, skipping");
            return PollOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);

        let session = match self.gateway.open().await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "device not configured, skipping poll");
                return PollOutcome::Failed;
            }
        };
        let reading = match session.read().await {
            Ok(reading) => reading,
            Err(err) => {
                tracing::warn!(
                    endpoint = %session.configuration().endpoint,
                    error = %err,
                    "failed to read device state"
                );
                return PollOutcome::Failed;
            }
        };

        let active = self.active.borrow().clone();
        let state = HruState::merge(reading, &active);
        if let Err(err) = self.bridge.publish_state(&state).await {
            tracing::warn!(error = %err, "failed to publish device state");
            return PollOutcome::Failed;
        }

        *self
            .last_success
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(now());
        tracing::debug!(
            power = state.power,
            temperature = state.temperature,
            mode = %state.mode_formatted,
            "device state published"
        );
        PollOutcome::Published(state)
    }

    /// Poll every `period`, on the trigger and on active state changes,
    /// until [`stop`](Self::stop).
    pub fn start(self: &Arc<Self>, period: Duration) {
        let this = Arc::clone(self);
        let trigger = self.trigger.clone();
        let mut active = self.active.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    () = trigger.fired() => {}
                    Ok(()) = active.changed() => {}
                }
                let this = Arc::clone(&this);
                tokio::spawn(async move {
                    this.poll().await;
                });
            }
        });
        tracing::info!(period_secs = period.as_secs(), "synchronizer started");
        let previous = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop polling. A cycle already running completes.
    pub fn stop(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("synchronizer stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeClient, FakeRegistry, SpyBridge, StaticConfiguration};
    use luftuj_domain::active_state::ActiveSource;
    use luftuj_domain::device::catalog::ATREA_RD5;

    type TestSynchronizer = DeviceSynchronizer<StaticConfiguration, FakeRegistry, SpyBridge>;

    struct Fixture {
        sync: Arc<TestSynchronizer>,
        client: Arc<FakeClient>,
        bridge: Arc<SpyBridge>,
        active: watch::Sender<ActiveState>,
        registry: Arc<FakeRegistry>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(FakeRegistry::default());
        let client = Arc::clone(&registry.client);
        client.set_holding(10704, 45);
        client.set_holding(10706, 224);
        client.set_holding(10705, 1);
        let gateway = Arc::new(DeviceGateway::new(
            StaticConfiguration::new(&ATREA_RD5),
            Arc::clone(&registry),
        ));
        let bridge = Arc::new(SpyBridge::default());
        let (active, rx) = watch::channel(ActiveState::default());
        let sync = Arc::new(DeviceSynchronizer::new(gateway, Arc::clone(&bridge), rx));
        Fixture {
            sync,
            client,
            bridge,
            active,
            registry,
        }
    }

    #[tokio::test]
    async fn should_publish_scaled_state() {
        let fx = fixture();

        let outcome = fx.sync.poll().await;

        let PollOutcome::Published(state) = outcome else {
            panic!("expected a published state, got {outcome:?}");
        };
        assert!((state.power - 45.0).abs() < f64::EPSILON);
        assert!((state.temperature - 22.4).abs() < 1e-9);
        assert_eq!(state.mode_formatted, "Automatic");
        assert_eq!(fx.bridge.states().len(), 1);
        assert!(fx.sync.last_success().is_some());
    }

    #[tokio::test]
    async fn should_merge_boost_state() {
        let fx = fixture();
        fx.active.send_replace(ActiveState {
            source: ActiveSource::Boost,
            mode_name: Some("Party".to_string()),
            boost_remaining: 12,
            ..ActiveState::default()
        });

        fx.sync.poll().await;

        let state = &fx.bridge.states()[0];
        assert_eq!(state.mode_formatted, "Party");
        assert_eq!(state.boost_remaining, 12);
        assert_eq!(state.boost_name.as_deref(), Some("Party"));
    }

    #[tokio::test]
    async fn should_publish_unknown_for_unmapped_mode() {
        let fx = fixture();
        fx.client.set_holding(10705, 42);

        fx.sync.poll().await;

        assert_eq!(fx.bridge.states()[0].mode_formatted, "Unknown");
    }

    #[tokio::test]
    async fn should_end_cycle_on_read_failure_without_releasing_client() {
        let fx = fixture();
        fx.client.fail_reads(true);

        let outcome = fx.sync.poll().await;

        assert_eq!(outcome, PollOutcome::Failed);
        assert!(fx.bridge.states().is_empty());
        assert!(fx.sync.last_success().is_none());
        assert_eq!(fx.client.disconnects(), 0);
        assert_eq!(
            fx.registry
                .released
                .load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_poll_while_another_is_in_flight() {
        let fx = fixture();
        fx.client.delay_reads(Duration::from_secs(1));

        let first = tokio::spawn({
            let sync = Arc::clone(&fx.sync);
            async move { sync.poll().await }
        });
        tokio::task::yield_now().await;
        let second = fx.sync.poll().await;

        assert_eq!(second, PollOutcome::Skipped);
        assert!(matches!(first.await.unwrap(), PollOutcome::Published(_)));
        assert_eq!(fx.bridge.states().len(), 1);
    }

    #[tokio::test]
    async fn should_allow_next_poll_after_failure() {
        let fx = fixture();
        fx.client.fail_reads(true);
        fx.sync.poll().await;
        fx.client.fail_reads(false);

        assert!(matches!(fx.sync.poll().await, PollOutcome::Published(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_poll_on_trigger_and_state_change() {
        let fx = fixture();
        fx.sync.start(Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fx.bridge.states().len(), 1);

        fx.sync.trigger().fire();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fx.bridge.states().len(), 2);

        fx.active.send_replace(ActiveState {
            source: ActiveSource::Schedule,
            mode_name: Some("Night".to_string()),
            ..ActiveState::default()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        fx.sync.stop();

        let states = fx.bridge.states();
        assert_eq!(states.len(), 3);
        assert_eq!(states[2].mode_formatted, "Night");
    }
}
