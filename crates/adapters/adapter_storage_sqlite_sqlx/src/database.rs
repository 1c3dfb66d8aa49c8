//! Database lifecycle: connection options, pool sizing and migrations.
//!
//! A file database runs in WAL mode so the resolver, the synchronizer and
//! the command router can read while another task writes a setting. An
//! in-memory database lives in a single connection that is never recycled;
//! every extra connection would open a fresh, empty database.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::error::StorageError;

/// How long a writer waits for a competing lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 4;

/// Storage section of the daemon configuration.
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:luftuj.db?mode=rwc` or `sqlite::memory:`).
    pub database_url: String,
}

impl Config {
    fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, StorageError> {
        let options = SqliteConnectOptions::from_str(&self.database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        if self.is_memory() {
            return Ok(options);
        }
        Ok(options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        if self.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        }
    }

    /// Open the database and bring its schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the URL is invalid, the connection
    /// fails or a migration fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        let pool = self
            .pool_options()
            .connect_with(self.connect_options()?)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(url = %self.database_url, "database ready");
        Ok(Database { pool })
    }
}

/// The open database.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
