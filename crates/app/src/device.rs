//! Device access — the three logical values of the installed unit.
//!
//! [`DeviceGateway`] resolves the current configuration and hands out a
//! [`DeviceSession`] bound to the shared client of that unit. Sessions are
//! cheap and short-lived: open one per cycle. When the configured endpoint
//! changes, the gateway releases the client of the previous one.
//!
//! Register-mapped units are decoded and written directly; scripted units
//! run their read and write procedures through the [`Interpreter`].

use std::sync::{Arc, Mutex, PoisonError};

use luftuj_domain::device::{
    Access, DeviceDefinition, Field, ModeResolution, ReadMap, RegisterKind, RegisterRead,
    ScriptedAccess, round_to,
};
use luftuj_domain::error::{ConfigurationError, LuftujError, ProtocolError};
use luftuj_domain::hru_state::HruReading;
use luftuj_domain::script::Variables;
use luftuj_domain::timeline::TargetConfig;

use crate::interpreter::Interpreter;
use crate::ports::{
    ClientRegistry, ConfigurationSource, Endpoint, RegisterClient, ResolvedConfiguration,
};
use crate::write_sequencer;

/// Variable a write script finds the requested value in.
pub const WRITE_VALUE_VARIABLE: &str = "value";

/// Read one register described by `register`.
///
/// # Errors
///
/// Returns the client's error, or [`ProtocolError::ShortResponse`] when
/// the unit answered with no words.
pub async fn read_register<C: RegisterClient>(
    client: &C,
    register: &RegisterRead,
) -> Result<u16, LuftujError> {
    let words = match register.kind {
        RegisterKind::Holding => client.read_holding(register.address, 1).await?,
        RegisterKind::Input => client.read_input(register.address, 1).await?,
    };
    words.first().copied().ok_or_else(|| {
        ProtocolError::ShortResponse {
            address: register.address,
            expected: 1,
            actual: 0,
        }
        .into()
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mode_word(value: f64) -> u16 {
    if value.is_finite() {
        value.round().clamp(0.0, f64::from(u16::MAX)) as u16
    } else {
        0
    }
}

/// Configuration plus the connection registry.
pub struct DeviceGateway<C, R> {
    configuration: C,
    registry: Arc<R>,
    /// Endpoint of the shared client handed out last.
    current: Mutex<Option<Endpoint>>,
}

impl<C, R> DeviceGateway<C, R>
where
    C: ConfigurationSource,
    R: ClientRegistry,
{
    pub fn new(configuration: C, registry: Arc<R>) -> Self {
        Self {
            configuration,
            registry,
            current: Mutex::new(None),
        }
    }

    /// Resolve the configuration without touching the wire.
    ///
    /// # Errors
    ///
    /// Returns the configuration source's error.
    pub async fn configuration(&self) -> Result<ResolvedConfiguration, LuftujError> {
        self.configuration.resolve().await
    }

    /// Open a session on the shared client of the configured unit.
    ///
    /// # Errors
    ///
    /// Returns the configuration source's error.
    pub async fn open(&self) -> Result<DeviceSession<R::Client>, LuftujError> {
        let configuration = self.configuration.resolve().await?;
        if let Some(previous) = self.switch_to(&configuration.endpoint) {
            tracing::info!(
                from = %previous,
                to = %configuration.endpoint,
                "unit endpoint changed, releasing previous client"
            );
            self.registry.release(&previous).await;
        }
        let client = self.registry.acquire(&configuration.endpoint);
        Ok(DeviceSession {
            client,
            configuration,
        })
    }

    /// Remember `endpoint` and return the one it replaces, if different.
    fn switch_to(&self, endpoint: &Endpoint) -> Option<Endpoint> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref() == Some(endpoint) {
            return None;
        }
        current.replace(endpoint.clone())
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }
}

/// Result of applying a [`TargetConfig`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub applied: Vec<Field>,
    /// Fields requested but read-only on this unit.
    pub unsupported: Vec<Field>,
    pub failed: Vec<Field>,
}

/// One unit, one shared client.
pub struct DeviceSession<Cl> {
    client: Arc<Cl>,
    configuration: ResolvedConfiguration,
}

impl<Cl: RegisterClient> DeviceSession<Cl> {
    #[must_use]
    pub fn definition(&self) -> &'static DeviceDefinition {
        self.configuration.definition
    }

    #[must_use]
    pub fn configuration(&self) -> &ResolvedConfiguration {
        &self.configuration
    }

    /// Read and decode power, temperature and mode.
    ///
    /// # Errors
    ///
    /// Returns the first register read error, or the script's error for a
    /// scripted unit.
    pub async fn read(&self) -> Result<HruReading, LuftujError> {
        match &self.definition().access {
            Access::Registers { read, .. } => self.read_registers(read).await,
            Access::Scripted(scripts) => self.read_scripted(scripts).await,
        }
    }

    async fn read_registers(&self, read: &ReadMap) -> Result<HruReading, LuftujError> {
        let power = read_register(&*self.client, &read.power).await?;
        let temperature = read_register(&*self.client, &read.temperature).await?;
        let mode = read_register(&*self.client, &read.mode).await?;
        Ok(HruReading {
            power: read.power.decode(power),
            temperature: read.temperature.decode(temperature),
            mode_code: mode,
            mode: self.definition().mode_label(mode).to_string(),
        })
    }

    async fn read_scripted(&self, scripts: &ScriptedAccess) -> Result<HruReading, LuftujError> {
        let script = scripts.read_script()?;
        let values = Interpreter::new(&*self.client, Variables::new())
            .run(&script)
            .await?;
        let value = |name: &str| values.get(name).copied().unwrap_or(0.0);
        let mode = mode_word(value("mode"));
        Ok(HruReading {
            power: value("power"),
            temperature: round_to(value("temperature"), 1),
            mode_code: mode,
            mode: self.definition().mode_label(mode).to_string(),
        })
    }

    /// Write `input` to `field`, through the write steps of a register
    /// mapped unit or the field's script with `$value` bound to `input`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnsupportedWrite`] when the field is
    /// read-only, otherwise the sequencer's or the script's error.
    pub async fn write_field(&self, field: Field, input: f64) -> Result<(), LuftujError> {
        let unsupported = ConfigurationError::UnsupportedWrite {
            field: field.as_str(),
        };
        match &self.definition().access {
            Access::Registers { write, .. } => {
                let steps = write.get(field).ok_or(unsupported)?;
                write_sequencer::apply(&*self.client, steps, input).await
            }
            Access::Scripted(scripts) => {
                let script = scripts.write_script(field)?.ok_or(unsupported)?;
                let variables = Variables::from([(WRITE_VALUE_VARIABLE.to_string(), input)]);
                Interpreter::new(&*self.client, variables)
                    .run(&script)
                    .await?;
                Ok(())
            }
        }
    }

    /// Apply power, temperature and mode in that order.
    ///
    /// Each field is independent: a read-only field is skipped and a
    /// failing one is logged, the others are still written.
    pub async fn apply_target(&self, target: &TargetConfig) -> WriteReport {
        let mode = target.mode.as_ref().map(|setting| {
            let resolution = self.definition().resolve_mode(setting);
            if resolution == ModeResolution::Fallback {
                tracing::warn!(mode = ?setting, "unresolved mode, writing code 0");
            }
            f64::from(resolution.code())
        });

        let mut report = WriteReport::default();
        for (field, value) in [
            (Field::Power, target.power),
            (Field::Temperature, target.temperature),
            (Field::Mode, mode),
        ] {
            let Some(value) = value else { continue };
            match self.write_field(field, value).await {
                Ok(()) => {
                    tracing::debug!(%field, value, "field applied");
                    report.applied.push(field);
                }
                Err(LuftujError::Configuration(ConfigurationError::UnsupportedWrite { .. })) => {
                    tracing::info!(%field, unit = self.definition().code, "field is read-only, skipping");
                    report.unsupported.push(field);
                }
                Err(err) => {
                    tracing::warn!(%field, error = %err, "failed to apply field");
                    report.failed.push(field);
                }
            }
        }
        report
    }
}
