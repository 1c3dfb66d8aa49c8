//! Register port — word-level access to the HRU's Modbus registers.

use std::future::Future;
use std::sync::Arc;

use luftuj_domain::error::LuftujError;

/// Address of one Modbus TCP unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
}

impl Endpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}#{}", self.host, self.port, self.unit_id)
    }
}

/// A client bound to one [`Endpoint`].
///
/// Implementations connect lazily on first I/O and never retry on their
/// own: a failed call surfaces a `ConnectionError` and the next call
/// starts over with a fresh connection.
pub trait RegisterClient: Send + Sync {
    /// Establish the connection now instead of on first I/O. A no-op when
    /// already connected.
    fn connect(&self) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Read `count` holding registers starting at `address` (FC 3).
    fn read_holding(
        &self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, LuftujError>> + Send;

    /// Read `count` input registers starting at `address` (FC 4).
    fn read_input(
        &self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, LuftujError>> + Send;

    /// Write one holding register (FC 6).
    fn write_holding(
        &self,
        address: u16,
        value: u16,
    ) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Write consecutive holding registers starting at `address` (FC 16).
    fn write_holding_multi(
        &self,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Write one coil (FC 5).
    fn write_coil(
        &self,
        address: u16,
        value: bool,
    ) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Whether the connection is up, or was used successfully within the
    /// implementation's grace window.
    fn is_connected(&self) -> bool;

    /// Drop the connection. Safe to call when not connected.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

/// Owns the shared clients, one per [`Endpoint`].
pub trait ClientRegistry: Send + Sync {
    type Client: RegisterClient + 'static;

    /// Shared client for `endpoint`, created on first use.
    fn acquire(&self, endpoint: &Endpoint) -> Arc<Self::Client>;

    /// A single-use client that is not registered. The caller must
    /// disconnect it when done.
    fn open_temporary(&self, endpoint: &Endpoint) -> Self::Client;

    /// Disconnect and forget the shared client for `endpoint`.
    fn release(&self, endpoint: &Endpoint) -> impl Future<Output = ()> + Send;

    /// Disconnect and forget every shared client.
    fn close_all(&self) -> impl Future<Output = ()> + Send;
}
