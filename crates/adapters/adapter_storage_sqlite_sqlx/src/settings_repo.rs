//! `SQLite` implementation of [`SettingsRepository`].

use std::future::Future;

use sqlx::SqlitePool;

use luftuj_app::ports::SettingsRepository;
use luftuj_domain::error::LuftujError;
use luftuj_domain::time::now;

use crate::error::StorageError;

const SELECT_BY_KEY: &str = "SELECT value FROM app_settings WHERE key = ?";
const UPSERT: &str = "INSERT INTO app_settings (key, value, updated_at) VALUES (?, ?, ?) \
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";
const DELETE_BY_KEY: &str = "DELETE FROM app_settings WHERE key = ?";

/// `SQLite`-backed key/value settings.
#[derive(Clone)]
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SettingsRepository for SqliteSettingsRepository {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, LuftujError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_string();
        async move {
            let row: Option<(String,)> = sqlx::query_as(SELECT_BY_KEY)
                .bind(key)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|(value,)| value))
        }
    }

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), LuftujError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_string();
        let value = value.to_string();
        async move {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(value)
                .bind(now().to_rfc3339())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), LuftujError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_string();
        async move {
            sqlx::query(DELETE_BY_KEY)
                .bind(key)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Config;

    async fn setup() -> SqliteSettingsRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteSettingsRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn should_return_none_for_missing_key() {
        let repo = setup().await;

        assert_eq!(repo.get("hru.boost_duration").await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_replace_existing_value() {
        let repo = setup().await;
        repo.set("hru.boost_duration", "30").await.unwrap();

        repo.set("hru.boost_duration", "45").await.unwrap();

        assert_eq!(
            repo.get("hru.boost_duration").await.unwrap().as_deref(),
            Some("45")
        );
    }

    #[tokio::test]
    async fn should_delete_key_and_ignore_missing_one() {
        let repo = setup().await;
        repo.set("hru.boost_override", "{}").await.unwrap();

        repo.delete("hru.boost_override").await.unwrap();
        repo.delete("hru.boost_override").await.unwrap();

        assert_eq!(repo.get("hru.boost_override").await.unwrap(), None);
    }
}
