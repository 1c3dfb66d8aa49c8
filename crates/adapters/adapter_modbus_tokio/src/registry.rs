//! Connection registry — one shared [`ModbusClient`] per endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use luftuj_app::ports::{ClientRegistry, Endpoint, RegisterClient};

use crate::client::ModbusClient;
use crate::config::ModbusConfig;

#[derive(Default)]
pub struct ConnectionRegistry {
    config: ModbusConfig,
    clients: Mutex<HashMap<Endpoint, Arc<ModbusClient>>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new(config: ModbusConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Number of registered shared clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Endpoint, Arc<ModbusClient>>> {
        self.clients
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ClientRegistry for ConnectionRegistry {
    type Client = ModbusClient;

    fn acquire(&self, endpoint: &Endpoint) -> Arc<ModbusClient> {
        let mut clients = self.lock();
        let client = clients.entry(endpoint.clone()).or_insert_with(|| {
            tracing::debug!(endpoint = %endpoint, "registering modbus client");
            Arc::new(ModbusClient::new(endpoint.clone(), self.config.clone()))
        });
        Arc::clone(client)
    }

    fn open_temporary(&self, endpoint: &Endpoint) -> ModbusClient {
        ModbusClient::new(endpoint.clone(), self.config.clone())
    }

    async fn release(&self, endpoint: &Endpoint) {
        let removed = self.lock().remove(endpoint);
        if let Some(client) = removed {
            client.disconnect().await;
        }
    }

    async fn close_all(&self) {
        let clients: Vec<_> = self.lock().drain().map(|(_, client)| client).collect();
        let count = clients.len();
        for client in clients {
            client.disconnect().await;
        }
        tracing::info!(count, "modbus clients closed");
    }
}
