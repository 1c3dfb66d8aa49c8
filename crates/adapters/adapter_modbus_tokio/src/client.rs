//! Modbus TCP register client.
//!
//! The TCP context is opened on the first request and kept until a
//! transport failure or timeout, after which the next request reconnects.
//! All requests on one client are serialized by the context mutex.

use std::sync::Mutex as StdMutex;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio_modbus::client::{Context, Reader, Writer};
use tokio_modbus::prelude::{Slave, tcp};

use luftuj_app::ports::{Endpoint, RegisterClient};
use luftuj_domain::error::LuftujError;

use crate::config::ModbusConfig;
use crate::error::ModbusError;

enum Request<'a> {
    ReadHolding(u16, u16),
    ReadInput(u16, u16),
    WriteHolding(u16, u16),
    WriteHoldingMulti(u16, &'a [u16]),
    WriteCoil(u16, bool),
}

impl Request<'_> {
    fn function(&self) -> &'static str {
        match self {
            Self::ReadHolding(..) => "read_holding",
            Self::ReadInput(..) => "read_input",
            Self::WriteHolding(..) => "write_holding",
            Self::WriteHoldingMulti(..) => "write_holding_multi",
            Self::WriteCoil(..) => "write_coil",
        }
    }

    fn address(&self) -> u16 {
        match self {
            Self::ReadHolding(address, _)
            | Self::ReadInput(address, _)
            | Self::WriteHolding(address, _)
            | Self::WriteHoldingMulti(address, _)
            | Self::WriteCoil(address, _) => *address,
        }
    }

    async fn send(&self, context: &mut Context) -> tokio_modbus::Result<Vec<u16>> {
        match *self {
            Self::ReadHolding(address, count) => context.read_holding_registers(address, count).await,
            Self::ReadInput(address, count) => context.read_input_registers(address, count).await,
            Self::WriteHolding(address, value) => context
                .write_single_register(address, value)
                .await
                .map(|res| res.map(|()| Vec::new())),
            Self::WriteHoldingMulti(address, values) => context
                .write_multiple_registers(address, values)
                .await
                .map(|res| res.map(|()| Vec::new())),
            Self::WriteCoil(address, value) => context
                .write_single_coil(address, value)
                .await
                .map(|res| res.map(|()| Vec::new())),
        }
    }
}

/// Register client bound to one Modbus TCP unit.
pub struct ModbusClient {
    endpoint: Endpoint,
    config: ModbusConfig,
    context: Mutex<Option<Context>>,
    last_success: StdMutex<Option<Instant>>,
}

impl ModbusClient {
    #[must_use]
    pub fn new(endpoint: Endpoint, config: ModbusConfig) -> Self {
        Self {
            endpoint,
            config,
            context: Mutex::new(None),
            last_success: StdMutex::new(None),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn open_context(&self) -> Result<Context, ModbusError> {
        let target = format!("{}:{}", self.endpoint.host, self.endpoint.port);
        let slave = Slave(self.endpoint.unit_id);
        let attempt = async {
            let address = tokio::net::lookup_host(target.as_str())
                .await?
                .next()
                .ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "host has no address")
                })?;
            tcp::connect_slave(address, slave).await
        };
        match tokio::time::timeout(self.config.connect_timeout(), attempt).await {
            Ok(Ok(context)) => {
                tracing::info!(endpoint = %self.endpoint, "modbus connected");
                Ok(context)
            }
            Ok(Err(source)) => Err(ModbusError::Connect {
                endpoint: self.endpoint.to_string(),
                source,
            }),
            Err(_) => Err(ModbusError::Timeout {
                endpoint: self.endpoint.to_string(),
            }),
        }
    }

    async fn execute(&self, request: Request<'_>) -> Result<Vec<u16>, ModbusError> {
        let mut guard = self.context.lock().await;
        let context = match &mut *guard {
            Some(context) => context,
            slot @ None => slot.insert(self.open_context().await?),
        };

        let outcome = tokio::time::timeout(self.config.request_timeout(), request.send(context))
            .await
            .map_err(|_| ModbusError::Timeout {
                endpoint: self.endpoint.to_string(),
            })
            .and_then(|result| {
                result.map_err(|source| ModbusError::Transport {
                    endpoint: self.endpoint.to_string(),
                    source,
                })
            })
            .and_then(|response| {
                response.map_err(|code| ModbusError::Exception {
                    function: request.function(),
                    address: request.address(),
                    code,
                })
            });

        match outcome {
            Ok(words) => {
                *self
                    .last_success
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Instant::now());
                Ok(words)
            }
            Err(err) => {
                if err.breaks_connection() {
                    tracing::warn!(endpoint = %self.endpoint, error = %err, "dropping modbus connection");
                    *guard = None;
                    *self
                        .last_success
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
                }
                Err(err)
            }
        }
    }
}

impl RegisterClient for ModbusClient {
    async fn connect(&self) -> Result<(), LuftujError> {
        let mut guard = self.context.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_context().await?);
        }
        Ok(())
    }

    async fn read_holding(&self, address: u16, count: u16) -> Result<Vec<u16>, LuftujError> {
        Ok(self.execute(Request::ReadHolding(address, count)).await?)
    }

    async fn read_input(&self, address: u16, count: u16) -> Result<Vec<u16>, LuftujError> {
        Ok(self.execute(Request::ReadInput(address, count)).await?)
    }

    async fn write_holding(&self, address: u16, value: u16) -> Result<(), LuftujError> {
        self.execute(Request::WriteHolding(address, value)).await?;
        Ok(())
    }

    async fn write_holding_multi(&self, address: u16, values: &[u16]) -> Result<(), LuftujError> {
        self.execute(Request::WriteHoldingMulti(address, values))
            .await?;
        Ok(())
    }

    async fn write_coil(&self, address: u16, value: bool) -> Result<(), LuftujError> {
        self.execute(Request::WriteCoil(address, value)).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        if let Ok(guard) = self.context.try_lock() {
            if guard.is_some() {
                return true;
            }
        }
        self.last_success
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some_and(|at| at.elapsed() < self.config.grace())
    }

    async fn disconnect(&self) {
        let previous = self.context.lock().await.take();
        *self
            .last_success
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        if previous.is_some() {
            tracing::debug!(endpoint = %self.endpoint, "modbus disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luftuj_domain::error::{ConnectionError, ProtocolError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal Modbus TCP unit: FC 3 answers `address + 1` per register,
    /// FC 6 echoes the request, anything else gets exception 0x02.
    async fn spawn_unit() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut header = [0_u8; 7];
                    while socket.read_exact(&mut header).await.is_ok() {
                        let length = usize::from(u16::from_be_bytes([header[4], header[5]]));
                        let mut pdu = vec![0_u8; length - 1];
                        if socket.read_exact(&mut pdu).await.is_err() {
                            break;
                        }
                        let reply = match pdu[0] {
                            0x03 => {
                                let address = u16::from_be_bytes([pdu[1], pdu[2]]);
                                let count = u16::from_be_bytes([pdu[3], pdu[4]]);
                                let mut reply = vec![0x03, u8::try_from(count * 2).unwrap()];
                                for offset in 0..count {
                                    reply.extend_from_slice(&(address + offset + 1).to_be_bytes());
                                }
                                reply
                            }
                            0x06 => pdu.clone(),
                            function => vec![function | 0x80, 0x02],
                        };
                        let mut frame = header[..4].to_vec();
                        frame.extend_from_slice(&u16::try_from(reply.len() + 1).unwrap().to_be_bytes());
                        frame.push(header[6]);
                        frame.extend_from_slice(&reply);
                        if socket.write_all(&frame).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        port
    }

    fn client(port: u16) -> ModbusClient {
        ModbusClient::new(Endpoint::new("127.0.0.1", port, 1), ModbusConfig::default())
    }

    #[tokio::test]
    async fn should_read_holding_registers() {
        let port = spawn_unit().await;
        let client = client(port);

        let words = client.read_holding(10704, 3).await.unwrap();

        assert_eq!(words, vec![10705, 10706, 10707]);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn should_connect_before_first_request() {
        let port = spawn_unit().await;
        let client = client(port);
        assert!(!client.is_connected());

        client.connect().await.unwrap();
        client.connect().await.unwrap();

        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn should_write_single_register() {
        let port = spawn_unit().await;
        let client = client(port);

        client.write_holding(10708, 43).await.unwrap();
    }

    #[tokio::test]
    async fn should_map_exception_to_protocol_error_and_stay_connected() {
        let port = spawn_unit().await;
        let client = client(port);

        let result = client.read_input(1001, 1).await;

        assert!(matches!(
            result,
            Err(LuftujError::Protocol(ProtocolError::Exception { address: 1001, .. }))
        ));
        assert!(client.read_holding(1, 1).await.is_ok());
    }

    #[tokio::test]
    async fn should_report_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let client = client(port);

        let result = client.read_holding(1, 1).await;

        assert!(matches!(
            result,
            Err(LuftujError::Connection(ConnectionError::Connect { .. }))
        ));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn should_forget_connection_on_disconnect() {
        let port = spawn_unit().await;
        let client = client(port);
        client.read_holding(1, 1).await.unwrap();

        client.disconnect().await;

        assert!(!client.is_connected());
        assert!(client.read_holding(1, 1).await.is_ok());
    }
}
