//! MQTT implementation of the [`HomeBridge`] port.
//!
//! The rumqttc event loop runs on its own task. On every `ConnAck` it
//! re-subscribes to the command topics, marks the unit `online` and emits
//! [`BridgeEvent::Connected`]; inbound command messages become
//! [`BridgeEvent::Command`]s on the channel returned by
//! [`MqttBridge::start`].
//!
//! The topics follow the configured unit. When a discovery request names
//! another unit, the retained messages of the old one are cleared and the
//! command subscriptions move. The last will is fixed at connect time and
//! keeps pointing at the status topic of the unit the bridge started with.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use luftuj_app::ports::{BridgeEvent, DiscoveryRequest, HomeBridge};
use luftuj_domain::error::LuftujError;
use luftuj_domain::hru_state::HruState;

use crate::config::MqttConfig;
use crate::discovery::{DiscoveryTracker, documents, fixed_topics};
use crate::error::MqttError;
use crate::publisher::{BrokerClient, Publisher};
use crate::topics::Topics;

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";
const EVENT_CAPACITY: usize = 32;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct MqttBridge<P = BrokerClient> {
    publisher: P,
    topics: Arc<RwLock<Topics>>,
    tracker: Mutex<DiscoveryTracker>,
    boost_duration: StdMutex<Option<u32>>,
    shutting_down: Arc<AtomicBool>,
    event_loop: StdMutex<Option<JoinHandle<()>>>,
}

impl MqttBridge<BrokerClient> {
    /// Create the client for `unit` and spawn its event loop.
    ///
    /// The connection is established by the event loop; this returns
    /// immediately.
    pub fn start(config: &MqttConfig, unit: &str) -> (Self, mpsc::Receiver<BridgeEvent>) {
        let topics = Topics::new(&config.base_topic, &config.discovery_prefix, unit);

        let mut options = MqttOptions::new(
            config.client_id.as_str(),
            config.broker_host.as_str(),
            config.broker_port,
        );
        options.set_keep_alive(config.keep_alive());
        options.set_last_will(LastWill::new(
            topics.status(),
            OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.as_str(), password.as_str());
        }

        let (client, event_loop) = AsyncClient::new(options, 64);
        let (events, receiver) = mpsc::channel(EVENT_CAPACITY);
        let bridge = Self::new(BrokerClient::new(client.clone(), config.broker()), topics);
        let handle = tokio::spawn(run_event_loop(
            event_loop,
            client,
            Arc::clone(&bridge.topics),
            events,
            Arc::clone(&bridge.shutting_down),
            config.reconnect_delay(),
        ));
        *bridge
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        tracing::info!(broker = %config.broker(), unit, "mqtt bridge started");
        (bridge, receiver)
    }
}

impl<P: Publisher> MqttBridge<P> {
    /// Bridge over an already connected publisher. Nothing consumes inbound
    /// messages; [`MqttBridge::start`] wires the event loop as well.
    #[must_use]
    pub fn new(publisher: P, topics: Topics) -> Self {
        Self {
            publisher,
            topics: Arc::new(RwLock::new(topics)),
            tracker: Mutex::new(DiscoveryTracker::default()),
            boost_duration: StdMutex::new(None),
            shutting_down: Arc::new(AtomicBool::new(false)),
            event_loop: StdMutex::new(None),
        }
    }

    /// Topics of the unit currently bridged.
    #[must_use]
    pub fn topics(&self) -> Topics {
        current(&self.topics)
    }

    async fn publish(
        &self,
        topic: String,
        retain: bool,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), MqttError> {
        self.publisher.publish(topic, retain, payload.into()).await
    }

    /// Clear every retained message of the current unit, move the command
    /// subscriptions and only then switch the topics. A failure leaves the
    /// old unit in place so the next discovery round starts over.
    async fn switch_unit(
        &self,
        tracker: &mut DiscoveryTracker,
        unit: &str,
    ) -> Result<(), MqttError> {
        let old = self.topics();
        let new = old.for_unit(unit);
        tracing::info!(from = old.unit(), to = unit, "unit changed, moving topics");

        let retained = fixed_topics(&old)
            .into_iter()
            .chain(tracker.published_topics(&old))
            .chain([old.status(), old.boost_duration()]);
        for topic in retained {
            self.publish(topic, true, Vec::new()).await?;
        }
        for filter in old.command_filters() {
            self.publisher.unsubscribe(filter).await?;
        }
        for filter in new.command_filters() {
            self.publisher.subscribe(filter).await?;
        }
        self.publish(new.status(), true, ONLINE).await?;
        let minutes = *self
            .boost_duration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(minutes) = minutes {
            self.publish(new.boost_duration(), true, minutes.to_string())
                .await?;
        }

        *self.topics.write().unwrap_or_else(PoisonError::into_inner) = new;
        tracker.clear();
        Ok(())
    }
}

impl<P: Publisher> HomeBridge for MqttBridge<P> {
    async fn publish_state(&self, state: &HruState) -> Result<(), LuftujError> {
        let payload = serde_json::to_vec(state).map_err(MqttError::Serialize)?;
        self.publish(self.topics().state(), false, payload).await?;
        Ok(())
    }

    async fn publish_boost_duration(&self, minutes: u32) -> Result<(), LuftujError> {
        self.publish(self.topics().boost_duration(), true, minutes.to_string())
            .await?;
        *self
            .boost_duration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(minutes);
        Ok(())
    }

    async fn publish_discovery(&self, request: &DiscoveryRequest) -> Result<(), LuftujError> {
        let mut tracker = self.tracker.lock().await;
        if self.topics().unit() != request.unit {
            self.switch_unit(&mut tracker, &request.unit).await?;
        }

        let topics = self.topics();
        let plan = tracker.plan(&topics, &request.boost_modes);
        for topic in &plan.stale {
            tracing::info!(%topic, "clearing stale discovery document");
            self.publish(topic.clone(), true, Vec::new()).await?;
        }
        for document in documents(&topics, request) {
            let payload = serde_json::to_vec(&document.payload).map_err(MqttError::Serialize)?;
            self.publish(document.topic, true, payload).await?;
        }
        tracker.commit(plan);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), LuftujError> {
        self.shutting_down.store(true, Ordering::Release);
        self.publish(self.topics().status(), true, OFFLINE).await?;
        self.publisher.disconnect().await?;

        let handle = self
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                tracing::warn!("mqtt event loop did not stop in time, aborting");
                handle.abort();
            }
        }
        tracing::info!("mqtt bridge stopped");
        Ok(())
    }
}

fn current(topics: &RwLock<Topics>) -> Topics {
    topics.read().unwrap_or_else(PoisonError::into_inner).clone()
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topics: Arc<RwLock<Topics>>,
    events: mpsc::Sender<BridgeEvent>,
    shutting_down: Arc<AtomicBool>,
    reconnect_delay: Duration,
) {
    let mut connected = false;
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected = true;
                on_connected(&client, &current(&topics));
                if events.send(BridgeEvent::Connected).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(message))) => {
                let parsed = current(&topics).parse_command(&message.topic, &message.payload);
                match parsed {
                    Ok(Some(command)) => {
                        tracing::debug!(topic = %message.topic, ?command, "command received");
                        if events.send(BridgeEvent::Command(command)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => tracing::warn!(error = %err, "ignoring command"),
                }
            }
            Ok(_) => {}
            Err(err) => {
                if shutting_down.load(Ordering::Acquire) {
                    break;
                }
                tracing::warn!(error = %err, "mqtt connection error");
                if connected {
                    connected = false;
                    if events.send(BridgeEvent::Disconnected).await.is_err() {
                        break;
                    }
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
    tracing::debug!("mqtt event loop finished");
}

/// Queue the subscriptions and the `online` mark without waiting: the
/// event loop that would drain the request queue is the caller.
fn on_connected(client: &AsyncClient, topics: &Topics) {
    for filter in topics.command_filters() {
        if let Err(err) = client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
            tracing::warn!(%filter, error = %err, "failed to subscribe");
        }
    }
    if let Err(err) = client.try_publish(topics.status(), QoS::AtLeastOnce, true, ONLINE) {
        tracing::warn!(error = %err, "failed to publish availability");
    }
    tracing::info!(node_id = topics.node_id(), "mqtt connected");
}
