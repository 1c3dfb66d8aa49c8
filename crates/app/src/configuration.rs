//! Resolved device configuration backed by the settings store.

use serde::{Deserialize, Serialize};

use luftuj_domain::device::catalog;
use luftuj_domain::error::{ConfigurationError, LuftujError};
use luftuj_domain::slug::slugify;

use crate::ports::{ConfigurationSource, Endpoint, ResolvedConfiguration, SettingsRepository};
use crate::settings::{self, HRU_SETTINGS_KEY};

/// Connection settings of the installed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HruSettings {
    /// Code of a built-in definition, e.g. `atrea-rd5`.
    pub unit: String,
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
}

impl HruSettings {
    /// Join these settings with their device definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingUnit`] without a host and
    /// [`ConfigurationError::UnknownUnit`] for an unknown unit code.
    pub fn resolve(&self) -> Result<ResolvedConfiguration, ConfigurationError> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::MissingUnit);
        }
        let definition = catalog::find(&self.unit)
            .ok_or_else(|| ConfigurationError::UnknownUnit(self.unit.clone()))?;
        Ok(ResolvedConfiguration {
            endpoint: Endpoint::new(self.host.trim(), self.port, self.unit_id),
            definition,
            unit: slugify(definition.code),
        })
    }
}

/// Settings stored under [`HRU_SETTINGS_KEY`], falling back to the
/// defaults from the configuration file.
#[derive(Clone)]
pub struct StoredConfiguration<S> {
    settings: S,
    defaults: HruSettings,
}

impl<S: SettingsRepository> StoredConfiguration<S> {
    pub fn new(settings: S, defaults: HruSettings) -> Self {
        Self { settings, defaults }
    }
}

impl<S: SettingsRepository> ConfigurationSource for StoredConfiguration<S> {
    async fn resolve(&self) -> Result<ResolvedConfiguration, LuftujError> {
        let stored: Option<HruSettings> = settings::load(&self.settings, HRU_SETTINGS_KEY).await?;
        let effective = stored.as_ref().unwrap_or(&self.defaults);
        Ok(effective.resolve()?)
    }
}
