//! Typed access to the application settings the core owns.

use serde::Serialize;
use serde::de::DeserializeOwned;

use luftuj_domain::error::LuftujError;
use luftuj_domain::timeline::{BoostOverride, DEFAULT_BOOST_DURATION};

use crate::ports::SettingsRepository;

/// The active boost override, if any.
pub const BOOST_OVERRIDE_KEY: &str = "hru.boost_override";
/// Minutes a newly started boost lasts.
pub const BOOST_DURATION_KEY: &str = "hru.boost_duration";
/// Operator overrides of the unit connection settings.
pub const HRU_SETTINGS_KEY: &str = "hru.settings";

fn storage_error(err: serde_json::Error) -> LuftujError {
    LuftujError::Storage(Box::new(err))
}

/// Load and decode a JSON setting.
///
/// # Errors
///
/// Returns the repository's error, or [`LuftujError::Storage`] when the
/// stored value is not valid JSON for `T`.
pub async fn load<S, T>(settings: &S, key: &str) -> Result<Option<T>, LuftujError>
where
    S: SettingsRepository,
    T: DeserializeOwned,
{
    match settings.get(key).await? {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(storage_error),
        None => Ok(None),
    }
}

/// Encode and store a JSON setting.
///
/// # Errors
///
/// Returns the repository's error.
pub async fn store<S, T>(settings: &S, key: &str, value: &T) -> Result<(), LuftujError>
where
    S: SettingsRepository,
    T: Serialize + Sync,
{
    let raw = serde_json::to_string(value).map_err(storage_error)?;
    settings.set(key, &raw).await
}

/// The stored boost override. A value that no longer decodes is removed
/// so it is reported once instead of on every evaluation.
///
/// # Errors
///
/// Returns the repository's error.
pub async fn boost_override<S: SettingsRepository>(
    settings: &S,
) -> Result<Option<BoostOverride>, LuftujError> {
    let Some(raw) = settings.get(BOOST_OVERRIDE_KEY).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(boost) => Ok(Some(boost)),
        Err(err) => {
            tracing::warn!(error = %err, key = BOOST_OVERRIDE_KEY, "discarding unreadable boost override");
            settings.delete(BOOST_OVERRIDE_KEY).await?;
            Ok(None)
        }
    }
}

/// Stored boost duration, [`DEFAULT_BOOST_DURATION`] when unset.
///
/// # Errors
///
/// See [`load`].
pub async fn boost_duration<S: SettingsRepository>(settings: &S) -> Result<u32, LuftujError> {
    Ok(load(settings, BOOST_DURATION_KEY)
        .await?
        .unwrap_or(DEFAULT_BOOST_DURATION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemorySettings;
    use chrono::TimeZone;
    use luftuj_domain::id::ModeId;

    #[tokio::test]
    async fn should_default_boost_duration_when_unset() {
        let settings = InMemorySettings::default();
        assert_eq!(
            boost_duration(&settings).await.unwrap(),
            DEFAULT_BOOST_DURATION
        );
    }

    #[tokio::test]
    async fn should_roundtrip_boost_override_as_json() {
        let settings = InMemorySettings::default();
        let now = chrono::Utc.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap();
        let boost = BoostOverride::start(ModeId::new(3), now, 20).unwrap();

        store(&settings, BOOST_OVERRIDE_KEY, &boost).await.unwrap();

        assert_eq!(boost_override(&settings).await.unwrap(), Some(boost));
    }

    #[tokio::test]
    async fn should_discard_unreadable_boost_override() {
        let settings = InMemorySettings::default();
        settings.set(BOOST_OVERRIDE_KEY, "not json").await.unwrap();

        assert_eq!(boost_override(&settings).await.unwrap(), None);
        assert!(settings.raw(BOOST_OVERRIDE_KEY).is_none());
        assert_eq!(boost_override(&settings).await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_report_corrupt_setting_as_storage_error() {
        let settings = InMemorySettings::default();
        settings.set(BOOST_DURATION_KEY, "not json").await.unwrap();

        let result = boost_duration(&settings).await;

        assert!(matches!(result, Err(LuftujError::Storage(_))));
    }
}
