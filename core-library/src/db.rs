//! # Database Connection Pools
//!
//! Two independent SQLite stores back the agent:
//!
//! - **Replica store**: playlists, tracks, artists and content blobs
//! - **Queue store**: settings and the outgoing history queue
//!
//! Each pool is limited to a single connection so every statement against a
//! store is serialized. File databases use WAL journaling; foreign keys are
//! always enforced. Migrations are embedded at compile time.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_library::db::{create_replica_pool, DatabaseConfig};
//!
//! let pool = create_replica_pool(DatabaseConfig::new("/var/lib/music/offline.db")).await?;
//! ```

use crate::{LibraryError, Result};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

static REPLICA_MIGRATOR: Migrator = sqlx::migrate!("./migrations/replica");
static QUEUE_MIGRATOR: Migrator = sqlx::migrate!("./migrations/queue");

/// Database configuration for one SQLite store
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite:<path>` or `sqlite::memory:`
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,

    /// Maximum lifetime of a connection
    pub max_lifetime: Option<Duration>,

    /// Maximum idle time for a connection before being closed
    pub idle_timeout: Option<Duration>,

    /// Number of prepared statements cached per connection
    pub statement_cache_capacity: usize,
}

impl DatabaseConfig {
    /// Configuration for a database file, created when missing
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        let database_url = format!("sqlite:{}", path.display());

        Self {
            database_url,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Some(Duration::from_secs(1800)),
            idle_timeout: Some(Duration::from_secs(600)),
            statement_cache_capacity: 100,
        }
    }

    /// Configuration for an in-memory database (useful for testing)
    ///
    /// The single connection is never recycled: closing it would drop the
    /// database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: None,
            idle_timeout: None,
            statement_cache_capacity: 100,
        }
    }

    /// Set the connection acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the statement cache capacity
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    pub fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the replica store and apply its migrations
pub async fn create_replica_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    create_pool(config, &REPLICA_MIGRATOR, "replica").await
}

/// Open the queue store and apply its migrations
pub async fn create_queue_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    create_pool(config, &QUEUE_MIGRATOR, "queue").await
}

/// In-memory replica store with migrations applied
pub async fn create_test_replica_pool() -> Result<Pool<Sqlite>> {
    create_replica_pool(DatabaseConfig::in_memory()).await
}

/// In-memory queue store with migrations applied
pub async fn create_test_queue_pool() -> Result<Pool<Sqlite>> {
    create_queue_pool(DatabaseConfig::in_memory()).await
}

async fn create_pool(
    config: DatabaseConfig,
    migrator: &Migrator,
    store: &'static str,
) -> Result<Pool<Sqlite>> {
    info!(
        store = store,
        database_url = %config.database_url,
        "Opening local store"
    );

    let mut connect_options =
        SqliteConnectOptions::from_str(&config.database_url).map_err(LibraryError::Database)?;

    connect_options = connect_options
        .foreign_keys(true)
        .create_if_missing(true)
        .busy_timeout(config.acquire_timeout)
        .statement_cache_capacity(config.statement_cache_capacity);

    if !config.is_memory() {
        connect_options = connect_options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(store = store, error = %e, "Failed to open local store");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool, migrator, store).await?;
    health_check(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &Pool<Sqlite>, migrator: &Migrator, store: &str) -> Result<()> {
    debug!(store = store, "Running database migrations");

    migrator.run(pool).await.map_err(|e| {
        warn!(store = store, error = %e, "Migration failed");
        LibraryError::Migration(e.to_string())
    })?;

    debug!(store = store, "Database migrations completed");
    Ok(())
}

async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Database health check failed");
        LibraryError::Database(e)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(pool: &Pool<Sqlite>) -> Vec<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' AND name NOT LIKE 'sqlite%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_replica_schema() {
        let pool = create_test_replica_pool().await.unwrap();
        assert_eq!(
            table_names(&pool).await,
            vec!["content", "playlist", "track", "track_artist"]
        );
    }

    #[tokio::test]
    async fn test_queue_schema() {
        let pool = create_test_queue_pool().await.unwrap();
        assert_eq!(table_names(&pool).await, vec!["history", "settings"]);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = create_test_replica_pool().await.unwrap();
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);

        // No content row for this path.
        let orphan = sqlx::query(
            "INSERT INTO track (path, playlist, mtime) VALUES ('a.ogg', 'Rock', '1')",
        )
        .execute(&pool)
        .await;
        assert!(orphan.is_err());
    }

    #[tokio::test]
    async fn test_file_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.db");

        let pool = create_replica_pool(DatabaseConfig::new(&path)).await.unwrap();
        sqlx::query("INSERT INTO playlist (path) VALUES ('Rock')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        // Migrations are already applied; reopening must not fail.
        let pool = create_replica_pool(DatabaseConfig::new(&path)).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlist")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_config() {
        let config = DatabaseConfig::in_memory().acquire_timeout(Duration::from_secs(5));
        assert!(config.is_memory());
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));

        let file = DatabaseConfig::new("/tmp/queue.db");
        assert_eq!(file.database_url, "sqlite:/tmp/queue.db");
        assert!(!file.is_memory());
    }
}
