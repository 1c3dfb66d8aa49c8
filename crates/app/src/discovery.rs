//! Discovery scheduler — keeps the Home Assistant discovery documents fresh.
//!
//! Requests set a pending flag. One drain runs at a time and publishes
//! until the flag stays clear, so any number of requests made during a
//! publish collapse into a single follow-up cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use luftuj_domain::error::LuftujError;

use crate::ports::{ConfigurationSource, DiscoveryRequest, HomeBridge, TimelineRepository};
use crate::trigger::Trigger;

pub struct DiscoveryScheduler<C, T, B> {
    configuration: C,
    timeline: T,
    bridge: Arc<B>,
    pending: AtomicBool,
    in_flight: AtomicBool,
    trigger: Trigger,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl<C, T, B> DiscoveryScheduler<C, T, B>
where
    C: ConfigurationSource + 'static,
    T: TimelineRepository + 'static,
    B: HomeBridge + 'static,
{
    pub fn new(configuration: C, timeline: T, bridge: Arc<B>) -> Self {
        Self {
            configuration,
            timeline,
            bridge,
            pending: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            trigger: Trigger::new(),
            task: StdMutex::new(None),
        }
    }

    /// Handle that requests a publish from the running loop.
    #[must_use]
    pub fn trigger(&self) -> Trigger {
        self.trigger.clone()
    }

    /// Build the request from the configured unit and the boost modes and
    /// hand it to the bridge.
    ///
    /// # Errors
    ///
    /// Returns the configuration, storage or bridge error.
    pub async fn publish_once(&self) -> Result<(), LuftujError> {
        let configuration = self.configuration.resolve().await?;
        let boost_modes: Vec<_> = self
            .timeline
            .list_modes()
            .await?
            .into_iter()
            .filter(|mode| mode.is_boost)
            .collect();
        let request = DiscoveryRequest {
            definition: configuration.definition,
            unit: configuration.unit,
            boost_modes,
        };
        self.bridge.publish_discovery(&request).await?;
        tracing::debug!(
            unit = %request.unit,
            boost_modes = request.boost_modes.len(),
            "discovery published"
        );
        Ok(())
    }

    /// Mark a publish as pending and drain it unless a drain is running.
    ///
    /// Returns the number of publish cycles this call performed.
    pub async fn request(&self) -> usize {
        self.pending.store(true, Ordering::Release);
        let mut cycles = 0;
        loop {
            if self.in_flight.swap(true, Ordering::AcqRel) {
                return cycles;
            }
            while self.pending.swap(false, Ordering::AcqRel) {
                if let Err(err) = self.publish_once().await {
                    tracing::warn!(error = %err, "failed to publish discovery");
                }
                cycles += 1;
            }
            self.in_flight.store(false, Ordering::Release);
            // A request may have landed between the last swap and the release.
            if !self.pending.load(Ordering::Acquire) {
                return cycles;
            }
        }
    }

    /// Publish every `period` and on the trigger until [`stop`](Self::stop).
    pub fn start(self: &Arc<Self>, period: Duration) {
        let this = Arc::clone(self);
        let trigger = self.trigger.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    () = trigger.fired() => {}
                }
                let this = Arc::clone(&this);
                tokio::spawn(async move {
                    this.request().await;
                });
            }
        });
        tracing::info!(period_secs = period.as_secs(), "discovery scheduler started");
        let previous = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub fn stop(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("discovery scheduler stopped");
        }
    }
}
