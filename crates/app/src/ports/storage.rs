//! Storage port — repository traits for persistence.

use std::future::Future;

use luftuj_domain::error::LuftujError;
use luftuj_domain::id::{EventId, ModeId};
use luftuj_domain::timeline::{Mode, TimelineEvent};

/// Key/value application settings (JSON-encoded values).
pub trait SettingsRepository: Send + Sync {
    /// Fetch a setting, `None` when the key was never stored.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, LuftujError>> + Send;

    /// Insert or replace a setting.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Remove a setting. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), LuftujError>> + Send;
}

/// The weekly schedule and the named modes.
pub trait TimelineRepository: Send + Sync {
    fn list_events(&self) -> impl Future<Output = Result<Vec<TimelineEvent>, LuftujError>> + Send;

    fn list_modes(&self) -> impl Future<Output = Result<Vec<Mode>, LuftujError>> + Send;

    /// Insert or replace an event by id.
    fn save_event(
        &self,
        event: TimelineEvent,
    ) -> impl Future<Output = Result<TimelineEvent, LuftujError>> + Send;

    /// Insert or replace a mode by id.
    fn save_mode(&self, mode: Mode) -> impl Future<Output = Result<Mode, LuftujError>> + Send;

    fn delete_event(&self, id: EventId) -> impl Future<Output = Result<(), LuftujError>> + Send;

    fn delete_mode(&self, id: ModeId) -> impl Future<Output = Result<(), LuftujError>> + Send;

    /// Look up one mode by id.
    fn find_mode(
        &self,
        id: ModeId,
    ) -> impl Future<Output = Result<Option<Mode>, LuftujError>> + Send {
        async move {
            let modes = self.list_modes().await?;
            Ok(modes.into_iter().find(|mode| mode.id == id))
        }
    }
}
