//! # Ledger Store Handle
//!
//! `Database` is the one object the reception app holds on to: the SQLite
//! pool behind every ledger collection and the change feed that wakes
//! subscriptions after each write. Both are shared by every clone.
//!
//! ```text
//!   DbConfig ──► Database::new
//!                   │  open pool (WAL, create if missing)
//!                   │  apply embedded migrations
//!                   ▼
//!   ┌─────────── Database ───────────┐
//!   │  SqlitePool      ChangeFeed    │
//!   └──────┬──────────────┬──────────┘
//!          │              │
//!   ledger() writes ──────┘ announce(path, key)
//!          │
//!   LedgerTransport::subscribe re-queries on each announcement
//! ```
//!
//! An in-memory store lives only as long as its single connection, so that
//! connection is never allowed to idle out or expire.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::feed::{ChangeFeed, DEFAULT_FEED_CAPACITY};
use crate::migrations;
use crate::repository::ledger::LedgerRepository;

/// Where the ledger lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// Ledger store settings.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("reception.db").feed_capacity(256)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: StoreLocation,
    /// Default: 4 for a file, 1 in memory.
    pub pool_size: u32,
    /// How long a ledger call waits for a free connection. Default: 30s.
    pub acquire_timeout: Duration,
    /// Changes a slow subscriber may fall behind before it re-reads.
    pub feed_capacity: usize,
}

impl DbConfig {
    /// File-backed store; the file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: StoreLocation::File(path.into()),
            pool_size: 4,
            acquire_timeout: Duration::from_secs(30),
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    /// Private store for tests and demos.
    pub fn in_memory() -> Self {
        DbConfig {
            location: StoreLocation::Memory,
            pool_size: 1,
            acquire_timeout: Duration::from_secs(5),
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size.max(1);
        self
    }

    pub fn feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity.max(1);
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        match &self.location {
            StoreLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            StoreLocation::Memory => SqliteConnectOptions::new().in_memory(true),
        }
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .min_connections(1)
            .acquire_timeout(self.acquire_timeout);
        match self.location {
            StoreLocation::File(_) => options.max_connections(self.pool_size),
            StoreLocation::Memory => options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }
}

/// Pool plus change feed. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl Database {
    /// Opens the store and brings its schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        migrations::run_migrations(&pool).await?;

        info!(
            location = ?config.location,
            pool_size = config.pool_size,
            feed_capacity = config.feed_capacity,
            "Ledger store open"
        );

        Ok(Database {
            pool,
            feed: ChangeFeed::new(config.feed_capacity),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Every committed write is announced here.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone(), self.feed.clone())
    }

    /// Closes the pool; later ledger calls fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing ledger store");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::migration_status;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }

    #[test]
    fn test_config_defaults() {
        let file = DbConfig::new("/tmp/reception.db");
        assert_eq!(file.location, StoreLocation::File(PathBuf::from("/tmp/reception.db")));
        assert_eq!(file.pool_size, 4);

        let memory = DbConfig::in_memory().pool_size(0).feed_capacity(0);
        assert_eq!(memory.location, StoreLocation::Memory);
        assert_eq!(memory.pool_size, 1);
        assert_eq!(memory.feed_capacity, 1);
    }

    #[tokio::test]
    async fn test_clones_share_ledger_and_feed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let other = db.clone();
        let mut changes = db.feed().subscribe();

        let key = other
            .ledger()
            .append("cashCounts", &json!({"user": "anna"}))
            .await
            .unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!((change.path.as_str(), change.key.as_str()), ("cashCounts", key.as_str()));
        assert_eq!(db.ledger().count("cashCounts").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_closed_store_fails_calls() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        assert!(!db.health_check().await);
        let result = db.ledger().count("cashCounts").await;
        assert!(matches!(result, Err(DbError::ConnectionFailed(_))));
    }
}
