//! # luftuj-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `luftuj-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows (JSON columns for the
//!   nested target and valve configurations)
//!
//! ## Dependency rule
//! Depends on `luftuj-app` (for port traits) and `luftuj-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod database;
pub mod error;
pub mod settings_repo;
pub mod timeline_repo;

pub use database::{Config, Database};
pub use settings_repo::SqliteSettingsRepository;
pub use timeline_repo::SqliteTimelineRepository;
