//! `SQLite` implementation of [`TimelineRepository`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use luftuj_app::ports::TimelineRepository;
use luftuj_domain::error::LuftujError;
use luftuj_domain::id::{EventId, ModeId};
use luftuj_domain::timeline::{Mode, TimelineEvent};

use crate::error::StorageError;

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Decode one row, logging and skipping it when a column does not decode.
fn decode_or_skip<'r, T: FromRow<'r, SqliteRow>>(row: &'r SqliteRow, table: &'static str) -> Option<T> {
    match T::from_row(row) {
        Ok(value) => Some(value),
        Err(err) => {
            let id: Option<i64> = row.try_get("id").ok();
            tracing::warn!(table, ?id, error = %err, "skipping unreadable row");
            None
        }
    }
}

fn decode_int<T: TryFrom<i64>>(value: i64) -> Result<T, sqlx::Error>
where
    T::Error: std::error::Error + Send + Sync + 'static,
{
    T::try_from(value).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Wrapper for converting database rows into a domain [`TimelineEvent`].
struct EventRow(TimelineEvent);

impl<'r> FromRow<'r, SqliteRow> for EventRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let start_time: i64 = row.try_get("start_time")?;
        let day_of_week: Option<i64> = row.try_get("day_of_week")?;
        let target_config: String = row.try_get("target_config")?;
        let valve_config: String = row.try_get("valve_config")?;
        let enabled: bool = row.try_get("enabled")?;
        let priority: i64 = row.try_get("priority")?;

        Ok(Self(TimelineEvent {
            id: EventId::new(decode_int(id)?),
            start_time: decode_int(start_time)?,
            day_of_week: day_of_week.map(decode_int).transpose()?,
            target_config: decode_json(&target_config)?,
            valve_config: decode_json(&valve_config)?,
            enabled,
            priority: decode_int(priority)?,
        }))
    }
}

/// Wrapper for converting database rows into a domain [`Mode`].
struct ModeRow(Mode);

impl<'r> FromRow<'r, SqliteRow> for ModeRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let color: Option<String> = row.try_get("color")?;
        let is_boost: bool = row.try_get("is_boost")?;
        let target_config: String = row.try_get("target_config")?;
        let valve_config: String = row.try_get("valve_config")?;

        Ok(Self(Mode {
            id: ModeId::new(decode_int(id)?),
            name,
            color,
            is_boost,
            target_config: decode_json(&target_config)?,
            valve_config: decode_json(&valve_config)?,
        }))
    }
}

const SELECT_EVENTS: &str = "SELECT * FROM timeline_events ORDER BY id";
const SELECT_MODES: &str = "SELECT * FROM timeline_modes ORDER BY id";
const UPSERT_EVENT: &str = "INSERT INTO timeline_events \
     (id, start_time, day_of_week, target_config, valve_config, enabled, priority) \
     VALUES (?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT(id) DO UPDATE SET start_time = excluded.start_time, \
     day_of_week = excluded.day_of_week, target_config = excluded.target_config, \
     valve_config = excluded.valve_config, enabled = excluded.enabled, \
     priority = excluded.priority";
const UPSERT_MODE: &str = "INSERT INTO timeline_modes \
     (id, name, color, is_boost, target_config, valve_config) \
     VALUES (?, ?, ?, ?, ?, ?) \
     ON CONFLICT(id) DO UPDATE SET name = excluded.name, color = excluded.color, \
     is_boost = excluded.is_boost, target_config = excluded.target_config, \
     valve_config = excluded.valve_config";
const DELETE_EVENT: &str = "DELETE FROM timeline_events WHERE id = ?";
const DELETE_MODE: &str = "DELETE FROM timeline_modes WHERE id = ?";

/// `SQLite`-backed timeline repository.
#[derive(Clone)]
pub struct SqliteTimelineRepository {
    pool: SqlitePool,
}

impl SqliteTimelineRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TimelineRepository for SqliteTimelineRepository {
    fn list_events(&self) -> impl Future<Output = Result<Vec<TimelineEvent>, LuftujError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows = sqlx::query(SELECT_EVENTS)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows
                .iter()
                .filter_map(|row| decode_or_skip::<EventRow>(row, "timeline_events"))
                .map(|row| row.0)
                .collect())
        }
    }

    fn list_modes(&self) -> impl Future<Output = Result<Vec<Mode>, LuftujError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows = sqlx::query(SELECT_MODES)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows
                .iter()
                .filter_map(|row| decode_or_skip::<ModeRow>(row, "timeline_modes"))
                .map(|row| row.0)
                .collect())
        }
    }

    fn save_event(
        &self,
        event: TimelineEvent,
    ) -> impl Future<Output = Result<TimelineEvent, LuftujError>> + Send {
        let pool = self.pool.clone();
        async move {
            event.validate()?;
            let target_config =
                serde_json::to_string(&event.target_config).map_err(StorageError::from)?;
            let valve_config =
                serde_json::to_string(&event.valve_config).map_err(StorageError::from)?;

            sqlx::query(UPSERT_EVENT)
                .bind(i64::from(event.id.get()))
                .bind(i64::from(event.start_time))
                .bind(event.day_of_week.map(i64::from))
                .bind(target_config)
                .bind(valve_config)
                .bind(event.enabled)
                .bind(i64::from(event.priority))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(event)
        }
    }

    fn save_mode(&self, mode: Mode) -> impl Future<Output = Result<Mode, LuftujError>> + Send {
        let pool = self.pool.clone();
        async move {
            mode.validate()?;
            let target_config =
                serde_json::to_string(&mode.target_config).map_err(StorageError::from)?;
            let valve_config =
                serde_json::to_string(&mode.valve_config).map_err(StorageError::from)?;

            sqlx::query(UPSERT_MODE)
                .bind(i64::from(mode.id.get()))
                .bind(&mode.name)
                .bind(mode.color.as_deref())
                .bind(mode.is_boost)
                .bind(target_config)
                .bind(valve_config)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(mode)
        }
    }

    fn delete_event(&self, id: EventId) -> impl Future<Output = Result<(), LuftujError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(DELETE_EVENT)
                .bind(i64::from(id.get()))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn delete_mode(&self, id: ModeId) -> impl Future<Output = Result<(), LuftujError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(DELETE_MODE)
                .bind(i64::from(id.get()))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
