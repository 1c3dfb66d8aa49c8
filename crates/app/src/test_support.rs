//! In-memory fakes of the ports, shared by the unit tests of this crate.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use luftuj_domain::device::DeviceDefinition;
use luftuj_domain::error::{ConnectionError, LuftujError};
use luftuj_domain::hru_state::HruState;
use luftuj_domain::id::{EventId, ModeId};
use luftuj_domain::timeline::{Mode, TimelineEvent};
use luftuj_domain::valve::{ValveSnapshot, ValveStateChange};

use crate::event_bus::EventBus;
use crate::ports::{
    ClientRegistry, ConfigurationSource, DiscoveryRequest, Endpoint, HomeBridge, RegisterClient,
    ResolvedConfiguration, SettingsRepository, TimelineRepository, ValveControl,
};

// ---------------------------------------------------------------------------
// Register client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    ReadHolding(u16, u16),
    ReadInput(u16, u16),
    WriteHolding(u16, u16),
    WriteHoldingMulti(u16, Vec<u16>),
    WriteCoil(u16, bool),
}

impl Op {
    fn is_write(&self) -> bool {
        !matches!(self, Self::ReadHolding(..) | Self::ReadInput(..))
    }
}

#[derive(Default)]
struct ClientState {
    holding: Mutex<HashMap<u16, u16>>,
    input: Mutex<HashMap<u16, u16>>,
    log: Mutex<Vec<(Instant, Op)>>,
    fail_writes_at: Mutex<Option<u16>>,
    fail_reads: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
    disconnects: AtomicUsize,
}

/// Register client over two in-memory register banks. Clones share state.
#[derive(Clone, Default)]
pub struct FakeClient {
    state: Arc<ClientState>,
}

impl FakeClient {
    pub fn set_holding(&self, address: u16, value: u16) {
        self.state.holding.lock().unwrap().insert(address, value);
    }

    pub fn set_input(&self, address: u16, value: u16) {
        self.state.input.lock().unwrap().insert(address, value);
    }

    pub fn holding(&self, address: u16) -> Option<u16> {
        self.state.holding.lock().unwrap().get(&address).copied()
    }

    pub fn fail_writes_at(&self, address: u16) {
        *self.state.fail_writes_at.lock().unwrap() = Some(address);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn delay_reads(&self, delay: Duration) {
        *self.state.read_delay.lock().unwrap() = Some(delay);
    }

    pub fn ops(&self) -> Vec<Op> {
        let log = self.state.log.lock().unwrap();
        log.iter().map(|(_, op)| op.clone()).collect()
    }

    pub fn writes(&self) -> Vec<Op> {
        self.ops().into_iter().filter(Op::is_write).collect()
    }

    pub fn timed_writes(&self) -> Vec<(Instant, Op)> {
        let log = self.state.log.lock().unwrap();
        log.iter().filter(|(_, op)| op.is_write()).cloned().collect()
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    fn record(&self, op: Op) {
        self.state.log.lock().unwrap().push((Instant::now(), op));
    }

    async fn read(&self, op: Op, address: u16, count: u16, input: bool) -> Result<Vec<u16>, LuftujError> {
        let delay = *self.state.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(op);
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotConnected.into());
        }
        let bank = if input {
            self.state.input.lock().unwrap()
        } else {
            self.state.holding.lock().unwrap()
        };
        Ok((address..address.saturating_add(count))
            .map(|a| bank.get(&a).copied().unwrap_or(0))
            .collect())
    }

    fn check_write(&self, address: u16) -> Result<(), LuftujError> {
        if *self.state.fail_writes_at.lock().unwrap() == Some(address) {
            return Err(ConnectionError::NotConnected.into());
        }
        Ok(())
    }
}

impl RegisterClient for FakeClient {
    async fn connect(&self) -> Result<(), LuftujError> {
        Ok(())
    }

    async fn read_holding(&self, address: u16, count: u16) -> Result<Vec<u16>, LuftujError> {
        self.read(Op::ReadHolding(address, count), address, count, false)
            .await
    }

    async fn read_input(&self, address: u16, count: u16) -> Result<Vec<u16>, LuftujError> {
        self.read(Op::ReadInput(address, count), address, count, true)
            .await
    }

    async fn write_holding(&self, address: u16, value: u16) -> Result<(), LuftujError> {
        self.check_write(address)?;
        self.record(Op::WriteHolding(address, value));
        self.set_holding(address, value);
        Ok(())
    }

    async fn write_holding_multi(&self, address: u16, values: &[u16]) -> Result<(), LuftujError> {
        self.check_write(address)?;
        self.record(Op::WriteHoldingMulti(address, values.to_vec()));
        for (offset, value) in (0_u16..).zip(values) {
            self.set_holding(address + offset, *value);
        }
        Ok(())
    }

    async fn write_coil(&self, address: u16, value: bool) -> Result<(), LuftujError> {
        self.check_write(address)?;
        self.record(Op::WriteCoil(address, value));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn disconnect(&self) {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry handing out one shared [`FakeClient`]; temporary clients share
/// its register banks too.
#[derive(Default)]
pub struct FakeRegistry {
    pub client: Arc<FakeClient>,
    pub released: AtomicUsize,
    pub released_endpoints: Mutex<Vec<Endpoint>>,
}

impl ClientRegistry for FakeRegistry {
    type Client = FakeClient;

    fn acquire(&self, _endpoint: &Endpoint) -> Arc<FakeClient> {
        Arc::clone(&self.client)
    }

    fn open_temporary(&self, _endpoint: &Endpoint) -> FakeClient {
        FakeClient::clone(&self.client)
    }

    async fn release(&self, endpoint: &Endpoint) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.released_endpoints
            .lock()
            .unwrap()
            .push(endpoint.clone());
    }

    async fn close_all(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub struct StaticConfiguration(pub ResolvedConfiguration);

impl StaticConfiguration {
    pub fn new(definition: &'static DeviceDefinition) -> Self {
        Self(ResolvedConfiguration {
            endpoint: Endpoint::new("127.0.0.1", 502, 1),
            definition,
            unit: "test_unit".to_string(),
        })
    }
}

impl ConfigurationSource for StaticConfiguration {
    async fn resolve(&self) -> Result<ResolvedConfiguration, LuftujError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct InMemorySettings {
    store: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemorySettings {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.store.lock().unwrap().get(key).cloned()
    }
}

impl SettingsRepository for InMemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>, LuftujError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LuftujError> {
        self.store
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), LuftujError> {
        self.store.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTimeline {
    events: Arc<Mutex<BTreeMap<EventId, TimelineEvent>>>,
    modes: Arc<Mutex<BTreeMap<ModeId, Mode>>>,
}

impl InMemoryTimeline {
    pub fn with(events: Vec<TimelineEvent>, modes: Vec<Mode>) -> Self {
        let timeline = Self::default();
        {
            let mut stored = timeline.events.lock().unwrap();
            for event in events {
                stored.insert(event.id, event);
            }
        }
        {
            let mut stored = timeline.modes.lock().unwrap();
            for mode in modes {
                stored.insert(mode.id, mode);
            }
        }
        timeline
    }
}

impl TimelineRepository for InMemoryTimeline {
    async fn list_events(&self) -> Result<Vec<TimelineEvent>, LuftujError> {
        Ok(self.events.lock().unwrap().values().cloned().collect())
    }

    async fn list_modes(&self) -> Result<Vec<Mode>, LuftujError> {
        Ok(self.modes.lock().unwrap().values().cloned().collect())
    }

    async fn save_event(&self, event: TimelineEvent) -> Result<TimelineEvent, LuftujError> {
        self.events.lock().unwrap().insert(event.id, event.clone());
        Ok(event)
    }

    async fn save_mode(&self, mode: Mode) -> Result<Mode, LuftujError> {
        self.modes.lock().unwrap().insert(mode.id, mode.clone());
        Ok(mode)
    }

    async fn delete_event(&self, id: EventId) -> Result<(), LuftujError> {
        self.events.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn delete_mode(&self, id: ModeId) -> Result<(), LuftujError> {
        self.modes.lock().unwrap().remove(&id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Valves
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakeValves {
    entities: Arc<Mutex<BTreeMap<String, f64>>>,
    calls: Arc<Mutex<Vec<(String, f64)>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    changes: EventBus<ValveStateChange>,
}

impl FakeValves {
    pub fn with(ids: &[&str]) -> Self {
        Self {
            entities: Arc::new(Mutex::new(
                ids.iter().map(|id| ((*id).to_string(), 0.0)).collect(),
            )),
            calls: Arc::default(),
            failing: Arc::default(),
            changes: EventBus::new(16),
        }
    }

    pub fn fail_on(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<(String, f64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn emit(&self, change: ValveStateChange) {
        self.changes.publish(change);
    }
}

impl ValveControl for FakeValves {
    async fn fetch_entities(&self) -> Result<Vec<ValveSnapshot>, LuftujError> {
        let now = luftuj_domain::time::now();
        Ok(self
            .entities
            .lock()
            .unwrap()
            .iter()
            .map(|(id, value)| ValveSnapshot::new(id.clone(), *value, now))
            .collect())
    }

    async fn set_value(&self, id: &str, value: f64) -> Result<(), LuftujError> {
        if self.failing.lock().unwrap().contains(id) {
            return Err(ConnectionError::NotConnected.into());
        }
        self.calls.lock().unwrap().push((id.to_string(), value));
        self.entities.lock().unwrap().insert(id.to_string(), value);
        Ok(())
    }

    fn subscribe_state_changes(&self) -> broadcast::Receiver<ValveStateChange> {
        self.changes.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SpyBridge {
    pub states: Mutex<Vec<HruState>>,
    pub durations: Mutex<Vec<u32>>,
    pub discoveries: Mutex<Vec<Vec<ModeId>>>,
    pub discovery_units: Mutex<Vec<String>>,
    pub discovery_delay: Mutex<Option<Duration>>,
    pub shutdowns: AtomicUsize,
}

impl SpyBridge {
    pub fn states(&self) -> Vec<HruState> {
        self.states.lock().unwrap().clone()
    }

    pub fn discovery_count(&self) -> usize {
        self.discoveries.lock().unwrap().len()
    }

    pub fn units(&self) -> Vec<String> {
        self.discovery_units.lock().unwrap().clone()
    }
}

impl HomeBridge for SpyBridge {
    async fn publish_state(&self, state: &HruState) -> Result<(), LuftujError> {
        self.states.lock().unwrap().push(state.clone());
        Ok(())
    }

    async fn publish_boost_duration(&self, minutes: u32) -> Result<(), LuftujError> {
        self.durations.lock().unwrap().push(minutes);
        Ok(())
    }

    async fn publish_discovery(&self, request: &DiscoveryRequest) -> Result<(), LuftujError> {
        let delay = *self.discovery_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.discoveries
            .lock()
            .unwrap()
            .push(request.boost_modes.iter().map(|mode| mode.id).collect());
        self.discovery_units
            .lock()
            .unwrap()
            .push(request.unit.clone());
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), LuftujError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
