//! # luftuj-adapter-modbus-tokio
//!
//! Modbus TCP adapter using [tokio-modbus](https://docs.rs/tokio-modbus).
//!
//! ## Responsibilities
//! - Implement `RegisterClient` over one lazily opened TCP context per unit
//! - Implement `ClientRegistry`: one shared client per endpoint plus
//!   unregistered temporary clients for one-off scripts
//! - Bound connection attempts and requests with timeouts
//! - Map transport failures and device exceptions into domain errors
//!
//! ## Dependency rule
//! Depends on `luftuj-app` (for port traits) and `luftuj-domain` (for error types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod client;
pub mod config;
pub mod error;
pub mod registry;

pub use client::ModbusClient;
pub use config::ModbusConfig;
pub use error::ModbusError;
pub use registry::ConnectionRegistry;
