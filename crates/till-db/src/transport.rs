//! # Ledger Transport
//!
//! The realtime interface the reception app talks to. A subscription is a
//! stream of whole snapshots: one on subscribe, then one after every write
//! to the subscribed path.
//!
//! ## Subscription Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  subscribe("cashCounts", query)                                        │
//! │       │                                                                 │
//! │       ├── 1. feed.subscribe()      (before the first read: no gaps)    │
//! │       ├── 2. list() ──► Ok(snapshot) / Err(DbError) ──► mpsc           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────── loop ──────────────────────────────────────────┐    │
//! │  │  change on "cashCounts"   ──► list() ──► send                  │    │
//! │  │  change on another path   ──► ignore                           │    │
//! │  │  lagged                   ──► list() ──► send                  │    │
//! │  │  feed closed / rx dropped ──► stop                             │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::pool::Database;
use crate::query::LedgerQuery;
use crate::repository::ledger::Snapshot;

/// Snapshots buffered per subscription before the store waits on the reader.
pub const SUBSCRIPTION_BUFFER: usize = 16;

/// Stream of snapshots (or read failures) for one subscription.
pub type SnapshotStream = mpsc::Receiver<DbResult<Snapshot>>;

/// Realtime ledger operations.
///
/// Every write is a single operation against one path; there are no
/// multi-path transactions.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Starts a live subscription. Dropping the receiver ends it.
    fn subscribe(&self, path: &str, query: LedgerQuery) -> SnapshotStream;

    /// Reads one record.
    async fn fetch(&self, path: &str, key: &str) -> DbResult<Option<Value>>;

    /// Appends under a generated key and returns the key.
    async fn append(&self, path: &str, record: Value) -> DbResult<String>;

    /// Writes under `key`; fails if the key exists.
    async fn create(&self, path: &str, key: &str, record: Value) -> DbResult<()>;

    /// Writes under `key`, replacing any existing record.
    async fn overwrite(&self, path: &str, key: &str, record: Value) -> DbResult<()>;

    /// Merges `patch` into the existing record at `key`.
    async fn update(&self, path: &str, key: &str, patch: Value) -> DbResult<()>;
}

#[async_trait]
impl LedgerTransport for Database {
    fn subscribe(&self, path: &str, query: LedgerQuery) -> SnapshotStream {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut changes = self.feed().subscribe();
        let repo = self.ledger();
        let path = path.to_string();

        tokio::spawn(async move {
            debug!(path = %path, "Ledger subscription started");

            if tx.send(repo.list(&path, &query).await).await.is_err() {
                return;
            }

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok(change) if change.path == path => {}
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(path = %path, skipped, "Change feed lagged, re-reading collection");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }

                if tx.send(repo.list(&path, &query).await).await.is_err() {
                    break;
                }
            }

            debug!(path = %path, "Ledger subscription ended");
        });

        rx
    }

    async fn fetch(&self, path: &str, key: &str) -> DbResult<Option<Value>> {
        self.ledger().get(path, key).await
    }

    async fn append(&self, path: &str, record: Value) -> DbResult<String> {
        self.ledger().append(path, &record).await
    }

    async fn create(&self, path: &str, key: &str, record: Value) -> DbResult<()> {
        self.ledger().insert(path, key, &record).await
    }

    async fn overwrite(&self, path: &str, key: &str, record: Value) -> DbResult<()> {
        self.ledger().upsert(path, key, &record).await
    }

    async fn update(&self, path: &str, key: &str, patch: Value) -> DbResult<()> {
        self.ledger().merge(path, key, &patch).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::DbError;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next(stream: &mut SnapshotStream) -> Snapshot {
        let Ok(Some(Ok(snapshot))) = timeout(Duration::from_secs(5), stream.recv()).await else {
            panic!("expected a snapshot");
        };
        snapshot
    }

    #[tokio::test]
    async fn test_subscription_sees_initial_and_later_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.append("cashCounts", json!({"user": "anna", "timestamp": "2024-01-01"}))
            .await
            .unwrap();

        let mut stream = db.subscribe("cashCounts", LedgerQuery::all());
        assert_eq!(next(&mut stream).await.len(), 1);

        db.append("safeCounts", json!({"user": "anna"})).await.unwrap();
        db.append("cashCounts", json!({"user": "marco", "timestamp": "2024-01-02"}))
            .await
            .unwrap();

        // The safe write does not wake the cash subscription.
        assert_eq!(next(&mut stream).await.len(), 2);
    }

    #[tokio::test]
    async fn test_subscription_applies_query() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for ts in ["2024-01-01", "2024-01-05", "2024-02-01"] {
            db.append("cashCounts", json!({"timestamp": ts})).await.unwrap();
        }

        let query = LedgerQuery::ordered_by("timestamp")
            .start_at("2024-01-01")
            .end_at("2024-01-31");
        let mut stream = db.subscribe("cashCounts", query);
        assert_eq!(next(&mut stream).await.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_query_is_streamed_as_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut stream = db.subscribe("cashCounts", LedgerQuery::ordered_by("bad child"));

        let Ok(Some(Err(err))) = timeout(Duration::from_secs(5), stream.recv()).await else {
            panic!("expected an error");
        };
        assert!(matches!(err, DbError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_keyed_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.create("tillShifts", "shift-1", json!({"status": "open"})).await.unwrap();
        db.update("tillShifts", "shift-1", json!({"status": "closed"})).await.unwrap();
        db.overwrite("eodClosures", "2026-02-28", json!({"confirmedBy": "anna"}))
            .await
            .unwrap();

        let shift = db.fetch("tillShifts", "shift-1").await.unwrap().unwrap();
        assert_eq!(shift["status"], "closed");
        assert!(db.fetch("eodClosures", "2026-02-28").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropping_stream_ends_task() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut stream = db.subscribe("cashCounts", LedgerQuery::all());
        next(&mut stream).await;
        assert_eq!(db.feed().receiver_count(), 1);

        drop(stream);
        db.append("cashCounts", json!({"user": "anna"})).await.unwrap();

        for _ in 0..50 {
            if db.feed().receiver_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("subscription task kept running");
    }
}
