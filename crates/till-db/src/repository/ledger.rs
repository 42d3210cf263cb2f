//! # Ledger Repository
//!
//! Reads and writes records of any ledger collection. Every committed write
//! is announced on the [`ChangeFeed`].
//!
//! ## Write Operations
//! ```text
//! ┌──────────────┬───────────────────────────────┬───────────────────────┐
//! │ Operation    │ SQL                           │ Used for              │
//! ├──────────────┼───────────────────────────────┼───────────────────────┤
//! │ append       │ INSERT, key = uuid v4         │ cash/safe/PMS/...     │
//! │ insert       │ INSERT, caller key            │ new till shift        │
//! │ upsert       │ INSERT .. ON CONFLICT UPDATE  │ EOD closure           │
//! │ merge        │ UPDATE .. json_patch          │ till shift close      │
//! └──────────────┴───────────────────────────────┴───────────────────────┘
//! ```

use chrono::Utc;
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::feed::{ChangeFeed, ChangeKind, LedgerChange};
use crate::query::{LedgerQuery, QueryLimit};

/// One collection as seen at a point in time: key → record JSON.
pub type Snapshot = BTreeMap<String, Value>;

/// Repository for ledger collections.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        LedgerRepository { pool, feed }
    }

    /// Reads the records of `path` selected by `query`.
    pub async fn list(&self, path: &str, query: &LedgerQuery) -> DbResult<Snapshot> {
        let sort = query.sort_expression()?;

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT key, payload FROM ledger_entries WHERE path = ");
        builder.push_bind(path.to_string());

        if let Some(start) = &query.start_at {
            builder.push(format!(" AND {sort} >= "));
            builder.push_bind(start.clone());
        }
        if let Some(end) = &query.end_at {
            builder.push(format!(" AND {sort} <= "));
            builder.push_bind(end.clone());
        }
        if let Some(limit) = query.limit {
            let (direction, n) = match limit {
                QueryLimit::First(n) => ("ASC", n),
                QueryLimit::Last(n) => ("DESC", n),
            };
            builder.push(format!(" ORDER BY {sort} {direction}, key {direction} LIMIT "));
            builder.push_bind(i64::from(n));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut snapshot = Snapshot::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let payload: String = row.try_get("payload")?;
            snapshot.insert(key, serde_json::from_str(&payload)?);
        }

        debug!(path = %path, records = snapshot.len(), "Ledger listed");
        Ok(snapshot)
    }

    /// Reads one record.
    pub async fn get(&self, path: &str, key: &str) -> DbResult<Option<Value>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM ledger_entries WHERE path = ?1 AND key = ?2")
                .bind(path)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(DbError::from))
            .transpose()
    }

    /// Appends a record under a freshly generated key and returns the key.
    pub async fn append(&self, path: &str, record: &Value) -> DbResult<String> {
        let key = Uuid::new_v4().to_string();
        self.write_new(path, &key, record).await?;
        self.announce(path, &key, ChangeKind::Appended);
        Ok(key)
    }

    /// Writes a record under `key`. Fails with `KeyExists` if it exists.
    pub async fn insert(&self, path: &str, key: &str, record: &Value) -> DbResult<()> {
        self.write_new(path, key, record).await?;
        self.announce(path, key, ChangeKind::Created);
        Ok(())
    }

    /// Writes a record under `key`, replacing whatever was there.
    pub async fn upsert(&self, path: &str, key: &str, record: &Value) -> DbResult<()> {
        let payload = object_payload(record)?;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (path, key, payload, written_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (path, key) DO UPDATE SET
                payload = excluded.payload,
                written_at = excluded.written_at
            "#,
        )
        .bind(path)
        .bind(key)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.announce(path, key, ChangeKind::Overwritten);
        Ok(())
    }

    /// Merges `patch` into the record at `key` in one statement.
    ///
    /// `null` fields in the patch remove the field.
    pub async fn merge(&self, path: &str, key: &str, patch: &Value) -> DbResult<()> {
        let payload = object_payload(patch)?;

        let result = sqlx::query(
            r#"
            UPDATE ledger_entries SET
                payload = json_patch(payload, ?3),
                written_at = ?4
            WHERE path = ?1 AND key = ?2
            "#,
        )
        .bind(path)
        .bind(key)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(path, key));
        }

        self.announce(path, key, ChangeKind::Updated);
        Ok(())
    }

    /// Number of records in a collection.
    pub async fn count(&self, path: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries WHERE path = ?1")
            .bind(path)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn write_new(&self, path: &str, key: &str, record: &Value) -> DbResult<()> {
        let payload = object_payload(record)?;

        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries (path, key, payload, written_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(path)
        .bind(key)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(DbError::key_exists(path, key))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn announce(&self, path: &str, key: &str, kind: ChangeKind) {
        debug!(path = %path, key = %key, kind = ?kind, "Ledger write committed");
        self.feed.publish(LedgerChange::new(path, key, kind));
    }
}

/// Records are stored as JSON objects only.
fn object_payload(record: &Value) -> DbResult<String> {
    if !record.is_object() {
        return Err(DbError::InvalidPayload("record must be a JSON object".to_string()));
    }
    Ok(serde_json::to_string(record)?)
}

// =============================================================================
// Unit Tests
// =============================================================================
