//! # Ledger Store Errors
//!
//! Readers see a `DbError` as the transport error of a subscription; writers
//! log it and show a generic toast. Either way the message must make sense
//! on its own, so every variant names the ledger path or the SQLite cause.
//!
//! ```text
//!   sqlx::Error ─────────────┐
//!   MigrateError ────────────┼──► DbError ──► subscription state / toast
//!   serde_json::Error ───────┤
//!   ledger checks (key, JSON)┘
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Partial update of a key that was never written.
    #[error("No record at {path}/{key}")]
    NotFound { path: String, key: String },

    /// Keyed create of a key that is already taken.
    #[error("{path}/{key} already exists")]
    KeyExists { path: String, key: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    /// Rejected before reaching SQLite, e.g. `orderByChild` that is not a
    /// plain field name.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Payload that is not a JSON object, or stored JSON that no longer parses.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Timed out waiting for a ledger connection")]
    PoolTimedOut,

    #[error("Ledger store error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(path: impl Into<String>, key: impl Into<String>) -> Self {
        DbError::NotFound {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn key_exists(path: impl Into<String>, key: impl Into<String>) -> Self {
        DbError::KeyExists {
            path: path.into(),
            key: key.into(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::Query(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => DbError::PoolTimedOut,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("ledger store is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::InvalidPayload(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_ledger_path() {
        assert_eq!(
            DbError::not_found("tillShifts", "shift-1").to_string(),
            "No record at tillShifts/shift-1"
        );
        assert_eq!(
            DbError::key_exists("eodClosures", "2026-02-28").to_string(),
            "eodClosures/2026-02-28 already exists"
        );
    }

    #[test]
    fn test_sqlx_mapping() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::PoolTimedOut));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::ConnectionFailed(_)
        ));
        assert!(matches!(DbError::from(sqlx::Error::RowNotFound), DbError::Internal(_)));
    }

    #[test]
    fn test_bad_json_is_invalid_payload() {
        let Err(err) = serde_json::from_str::<serde_json::Value>("{") else {
            panic!("truncated JSON parsed");
        };
        assert!(matches!(DbError::from(err), DbError::InvalidPayload(_)));
    }
}
