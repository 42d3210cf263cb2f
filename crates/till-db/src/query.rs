//! # Ledger Queries
//!
//! The query shape a subscription can ask for: order by one child field,
//! bound it, and keep the first or last N.
//!
//! ```text
//!   LedgerQuery::ordered_by("timestamp")
//!       .start_at("2026-01-29T00:00:00.000+00:00")
//!       .end_at("2026-02-28T23:59:59.999+00:00")
//!       .limit_to_last(50)
//!
//!   SELECT key, payload FROM ledger_entries
//!    WHERE path = ?
//!      AND json_extract(payload, '$.timestamp') >= ?
//!      AND json_extract(payload, '$.timestamp') <= ?
//!    ORDER BY json_extract(payload, '$.timestamp') DESC, key DESC
//!    LIMIT 50
//! ```
//!
//! Without `order_by_child` the bounds and limit apply to the record key.

use crate::error::{DbError, DbResult};

/// Keep the first or the last `n` records in sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLimit {
    First(u32),
    Last(u32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerQuery {
    pub order_by_child: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub limit: Option<QueryLimit>,
}

impl LedgerQuery {
    /// Every record of the collection.
    pub fn all() -> Self {
        LedgerQuery::default()
    }

    pub fn ordered_by(child: impl Into<String>) -> Self {
        LedgerQuery {
            order_by_child: Some(child.into()),
            ..LedgerQuery::default()
        }
    }

    pub fn start_at(mut self, bound: impl Into<String>) -> Self {
        self.start_at = Some(bound.into());
        self
    }

    pub fn end_at(mut self, bound: impl Into<String>) -> Self {
        self.end_at = Some(bound.into());
        self
    }

    pub fn limit_to_first(mut self, n: u32) -> Self {
        self.limit = Some(QueryLimit::First(n));
        self
    }

    pub fn limit_to_last(mut self, n: u32) -> Self {
        self.limit = Some(QueryLimit::Last(n));
        self
    }

    /// SQL expression the query sorts and bounds on.
    ///
    /// The child name is spliced into the JSON path, so it must be a plain
    /// identifier.
    pub(crate) fn sort_expression(&self) -> DbResult<String> {
        match self.order_by_child.as_deref() {
            None => Ok("key".to_string()),
            Some(child) if is_identifier(child) => Ok(format!("json_extract(payload, '$.{child}')")),
            Some(child) => Err(DbError::InvalidQuery(format!(
                "orderByChild must be a field name, got '{child}'"
            ))),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let query = LedgerQuery::ordered_by("closedAt")
            .start_at("a")
            .end_at("b")
            .limit_to_first(5);
        assert_eq!(query.order_by_child.as_deref(), Some("closedAt"));
        assert_eq!(query.start_at.as_deref(), Some("a"));
        assert_eq!(query.end_at.as_deref(), Some("b"));
        assert_eq!(query.limit, Some(QueryLimit::First(5)));
    }

    #[test]
    fn test_sort_expression() {
        assert_eq!(LedgerQuery::all().sort_expression().unwrap(), "key");
        assert_eq!(
            LedgerQuery::ordered_by("timestamp").sort_expression().unwrap(),
            "json_extract(payload, '$.timestamp')"
        );
    }

    #[test]
    fn test_rejects_non_identifier_child() {
        for child in ["", "1abc", "a.b", "x') OR 1=1 --", "time stamp"] {
            let result = LedgerQuery::ordered_by(child).sort_expression();
            assert!(matches!(result, Err(DbError::InvalidQuery(_))), "{child}");
        }
    }
}
