//! Boost service — start, cancel and size the schedule override.

use luftuj_domain::error::{LuftujError, NotFoundError};
use luftuj_domain::id::ModeId;
use luftuj_domain::time::Timestamp;
use luftuj_domain::timeline::{BoostOverride, validate_boost_duration};

use crate::ports::{SettingsRepository, TimelineRepository};
use crate::settings::{self, BOOST_DURATION_KEY, BOOST_OVERRIDE_KEY};

/// Application service owning the single boost override.
pub struct BoostService<S, T> {
    settings: S,
    timeline: T,
}

impl<S, T> BoostService<S, T>
where
    S: SettingsRepository,
    T: TimelineRepository,
{
    pub fn new(settings: S, timeline: T) -> Self {
        Self { settings, timeline }
    }

    /// Start a boost of `mode_id` at `now` for the stored duration,
    /// replacing any boost already running.
    ///
    /// # Errors
    ///
    /// Returns [`LuftujError::NotFound`] when the mode does not exist, or a
    /// storage error.
    pub async fn start(&self, mode_id: ModeId, now: Timestamp) -> Result<BoostOverride, LuftujError> {
        let mode = self.timeline.find_mode(mode_id).await?.ok_or_else(|| NotFoundError {
            entity: "Mode",
            id: mode_id.to_string(),
        })?;
        if !mode.is_boost {
            tracing::warn!(mode_id = %mode_id, name = %mode.name, "starting boost with a mode not flagged as boost");
        }
        let minutes = settings::boost_duration(&self.settings).await?;
        let boost = BoostOverride::start(mode_id, now, minutes)?;
        settings::store(&self.settings, BOOST_OVERRIDE_KEY, &boost).await?;
        tracing::info!(mode_id = %mode_id, minutes, end_time = %boost.end_time, "boost started");
        Ok(boost)
    }

    /// Remove the boost override, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn cancel(&self) -> Result<(), LuftujError> {
        self.settings.delete(BOOST_OVERRIDE_KEY).await?;
        tracing::info!("boost cancelled");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn duration(&self) -> Result<u32, LuftujError> {
        settings::boost_duration(&self.settings).await
    }

    /// Store the duration used by the next boost.
    ///
    /// # Errors
    ///
    /// Returns [`LuftujError::Validation`] outside `1..=1440` minutes, or a
    /// storage error.
    pub async fn set_duration(&self, minutes: u32) -> Result<u32, LuftujError> {
        validate_boost_duration(minutes)?;
        settings::store(&self.settings, BOOST_DURATION_KEY, &minutes).await?;
        tracing::info!(minutes, "boost duration updated");
        Ok(minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InMemorySettings, InMemoryTimeline};
    use chrono::TimeZone;
    use luftuj_domain::error::ValidationError;
    use luftuj_domain::timeline::{Mode, TargetConfig, ValveConfig};

    fn mode(id: u32, is_boost: bool) -> Mode {
        Mode {
            id: ModeId::new(id),
            name: format!("Mode {id}"),
            color: None,
            is_boost,
            target_config: TargetConfig::default(),
            valve_config: ValveConfig::new(),
        }
    }

    fn now() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap()
    }

    fn service() -> (
        BoostService<InMemorySettings, InMemoryTimeline>,
        InMemorySettings,
    ) {
        let settings = InMemorySettings::default();
        let timeline = InMemoryTimeline::with(vec![], vec![mode(1, true), mode(2, false)]);
        (BoostService::new(settings.clone(), timeline), settings)
    }

    #[tokio::test]
    async fn should_start_boost_with_stored_duration() {
        let (svc, settings) = service();
        svc.set_duration(45).await.unwrap();

        let boost = svc.start(ModeId::new(1), now()).await.unwrap();

        assert_eq!(boost.duration_minutes, 45);
        assert_eq!(boost.end_time, now() + chrono::Duration::minutes(45));
        assert_eq!(
            settings::boost_override(&settings).await.unwrap(),
            Some(boost)
        );
    }

    #[tokio::test]
    async fn should_replace_running_boost() {
        let (svc, settings) = service();
        svc.start(ModeId::new(1), now()).await.unwrap();
        let later = now() + chrono::Duration::minutes(5);

        svc.start(ModeId::new(2), later).await.unwrap();

        let stored = settings::boost_override(&settings).await.unwrap().unwrap();
        assert_eq!(stored.mode_id, ModeId::new(2));
        assert_eq!(stored.end_time, later + chrono::Duration::minutes(30));
    }

    #[tokio::test]
    async fn should_reject_unknown_mode() {
        let (svc, settings) = service();

        let result = svc.start(ModeId::new(42), now()).await;

        assert!(matches!(result, Err(LuftujError::NotFound(_))));
        assert!(settings.raw(BOOST_OVERRIDE_KEY).is_none());
    }

    #[tokio::test]
    async fn should_delete_override_on_cancel() {
        let (svc, settings) = service();
        svc.start(ModeId::new(1), now()).await.unwrap();

        svc.cancel().await.unwrap();

        assert!(settings.raw(BOOST_OVERRIDE_KEY).is_none());
    }

    #[tokio::test]
    async fn should_reject_out_of_range_duration() {
        let (svc, _) = service();

        let result = svc.set_duration(0).await;

        assert!(matches!(
            result,
            Err(LuftujError::Validation(ValidationError::BoostDurationOutOfRange(0)))
        ));
        assert_eq!(svc.duration().await.unwrap(), 30);
    }
}
