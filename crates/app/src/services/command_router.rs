//! Command router — turns bridge events into boost operations and wake-ups.

use std::sync::Arc;

use tokio::sync::mpsc;

use luftuj_domain::error::LuftujError;
use luftuj_domain::time::now;

use crate::ports::{BridgeCommand, BridgeEvent, HomeBridge, SettingsRepository, TimelineRepository};
use crate::services::boost_service::BoostService;
use crate::trigger::Trigger;

/// Loops to wake after bridge traffic.
#[derive(Debug, Clone, Default)]
pub struct Wakeups {
    /// Re-evaluate the active configuration.
    pub reevaluate: Trigger,
    /// Read the unit back and publish its state.
    pub poll: Trigger,
    /// Republish the discovery documents.
    pub discovery: Trigger,
}

pub struct CommandRouter<S, T, B> {
    boost: BoostService<S, T>,
    bridge: Arc<B>,
    wakeups: Wakeups,
}

impl<S, T, B> CommandRouter<S, T, B>
where
    S: SettingsRepository,
    T: TimelineRepository,
    B: HomeBridge,
{
    pub fn new(boost: BoostService<S, T>, bridge: Arc<B>, wakeups: Wakeups) -> Self {
        Self {
            boost,
            bridge,
            wakeups,
        }
    }

    /// Handle events until the bridge drops its sender.
    pub async fn run(self, mut events: mpsc::Receiver<BridgeEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(err) = self.handle(event).await {
                tracing::warn!(error = %err, "bridge event failed");
            }
        }
        tracing::info!("bridge event stream closed");
    }

    /// # Errors
    ///
    /// Returns the boost service's or bridge's error; nothing is woken up
    /// for a rejected command.
    pub async fn handle(&self, event: BridgeEvent) -> Result<(), LuftujError> {
        match event {
            BridgeEvent::Connected => {
                tracing::info!("bridge connected");
                self.wakeups.discovery.fire();
                self.wakeups.poll.fire();
                let minutes = self.boost.duration().await?;
                self.bridge.publish_boost_duration(minutes).await
            }
            BridgeEvent::Disconnected => {
                tracing::warn!("bridge disconnected");
                Ok(())
            }
            BridgeEvent::Command(command) => self.command(command).await,
        }
    }

    async fn command(&self, command: BridgeCommand) -> Result<(), LuftujError> {
        match command {
            BridgeCommand::StartBoost { mode_id } => {
                self.boost.start(mode_id, now()).await?;
                self.reevaluate();
                Ok(())
            }
            BridgeCommand::CancelBoost => {
                self.boost.cancel().await?;
                self.reevaluate();
                Ok(())
            }
            BridgeCommand::SetBoostDuration(minutes) => {
                let minutes = self.boost.set_duration(minutes).await?;
                self.bridge.publish_boost_duration(minutes).await
            }
        }
    }

    fn reevaluate(&self) {
        self.wakeups.reevaluate.fire();
        self.wakeups.poll.fire();
    }
}
