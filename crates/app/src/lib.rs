//! # luftuj-app
//!
//! Application layer — use-cases, background loops and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RegisterClient` / `ClientRegistry` — Modbus register access per endpoint
//!   - `SettingsRepository` — keyed application settings
//!   - `TimelineRepository` — weekly events and modes
//!   - `ConfigurationSource` — the installed unit and its definition
//!   - `ValveControl` — the external damper control surface
//!   - `HomeBridge` — state, discovery and command traffic with the home bus
//! - Run the register-level machinery: command script interpreter and write sequencer
//! - Run the **background loops**:
//!   - `ActiveConfigResolver` — boost and weekly schedule, applied every tick
//!   - `DeviceSynchronizer` — read the unit back and publish its state
//!   - `DiscoveryScheduler` — keep the discovery documents fresh
//! - Own the authoritative damper map (`ValveManager`)
//! - Route inbound bridge commands to the boost service
//!
//! ## Dependency rule
//! Depends on `luftuj-domain` only (plus `tokio` for sync primitives and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod configuration;
pub mod device;
pub mod discovery;
pub mod event_bus;
pub mod interpreter;
pub mod ports;
pub mod resolver;
pub mod services;
pub mod settings;
pub mod synchronizer;
pub mod trigger;
pub mod valve_manager;
pub mod write_sequencer;

#[cfg(test)]
mod test_support;
