//! # Validation Module
//!
//! The single validation boundary every ledger record crosses, on both the
//! read side (snapshots) and the write side (mutations).
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Decoding (serde)                                              │
//! │  ├── Shape, enum names, integer counts                                 │
//! │  └── Failure → ValidationError::Malformed                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: LedgerRecord::validate (THIS MODULE)                          │
//! │  ├── Required strings, finite numbers                                  │
//! │  └── Cross-field rules (exchange breakdowns, shift lifecycle)          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Snapshot (parse_snapshot)                                    │
//! │  ├── Any issue in any record rejects the WHOLE snapshot                │
//! │  └── Success yields the records sorted ascending                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use std::collections::BTreeMap;
//! use serde_json::json;
//! use till_core::types::CashCount;
//! use till_core::validation::parse_snapshot;
//!
//! let mut snapshot = BTreeMap::new();
//! snapshot.insert("b".to_string(), json!({"user": "u", "timestamp": "2024-01-02", "type": "close"}));
//! snapshot.insert("a".to_string(), json!({"user": "u", "timestamp": "2024-01-01", "type": "opening"}));
//!
//! let counts = parse_snapshot::<CashCount>(&snapshot, None).unwrap();
//! assert_eq!(counts[0].timestamp, "2024-01-01");
//! ```

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{ValidationError, ValidationErrors};
use crate::money::Amount;
use crate::types::{
    CashCount, EodClosure, ManualPmsPosting, ManualTerminalBatch, PosTransaction,
    SafeCount, SafeCountType, SafeDenomBreakdown, ShiftStatus, TillShift,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationErrors>;

// =============================================================================
// Ledger Record Trait
// =============================================================================

/// A record type that lives in one ledger collection.
pub trait LedgerRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection path in the ledger store.
    const COLLECTION: &'static str;

    /// Human label used in messages ("cash count").
    const LABEL: &'static str;

    /// Key the view is sorted by, given the query's `orderByChild`.
    fn sort_key(&self, order_by: Option<&str>) -> &str;

    /// Field rules beyond what decoding already enforces.
    fn validate(&self) -> Vec<ValidationError>;

    /// Runs [`LedgerRecord::validate`] and collects the issues.
    fn check(&self) -> ValidationResult<()> {
        ValidationErrors::from(self.validate()).into_result()
    }
}

// =============================================================================
// Field Rules
// =============================================================================

/// Non-empty after trimming.
pub fn require_text(issues: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(ValidationError::Required {
            field: field.to_string(),
        });
    }
}

pub fn require_finite(issues: &mut Vec<ValidationError>, field: &str, value: Option<Amount>) {
    if let Some(amount) = value {
        if !amount.is_finite() {
            issues.push(ValidationError::NotFinite {
                field: field.to_string(),
            });
        }
    }
}

/// Finite and strictly positive (manual entry rule).
pub fn require_positive(issues: &mut Vec<ValidationError>, field: &str, value: Amount) {
    if !value.is_finite() {
        issues.push(ValidationError::NotFinite {
            field: field.to_string(),
        });
    } else if value.value() <= 0.0 {
        issues.push(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
}

fn require_present<T>(issues: &mut Vec<ValidationError>, field: &str, value: &Option<T>) {
    if value.is_none() {
        issues.push(ValidationError::Required {
            field: field.to_string(),
        });
    }
}

fn forbid_present<T>(issues: &mut Vec<ValidationError>, field: &str, value: &Option<T>, reason: &str) {
    if value.is_some() {
        issues.push(ValidationError::Unexpected {
            field: field.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Validates a `YYYY-MM-DD` business date.
pub fn validate_business_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "expected YYYY-MM-DD".to_string(),
    })
}

// =============================================================================
// Record Implementations
// =============================================================================

impl LedgerRecord for CashCount {
    const COLLECTION: &'static str = "cashCounts";
    const LABEL: &'static str = "cash count";

    fn sort_key(&self, _order_by: Option<&str>) -> &str {
        &self.timestamp
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();
        require_text(&mut issues, "user", &self.user);
        require_text(&mut issues, "timestamp", &self.timestamp);
        require_finite(&mut issues, "count", self.count);
        require_finite(&mut issues, "difference", self.difference);
        require_finite(&mut issues, "amount", self.amount);
        issues
    }
}

impl LedgerRecord for SafeCount {
    const COLLECTION: &'static str = "safeCounts";
    const LABEL: &'static str = "safe count";

    fn sort_key(&self, _order_by: Option<&str>) -> &str {
        &self.timestamp
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();
        require_text(&mut issues, "user", &self.user);
        require_text(&mut issues, "timestamp", &self.timestamp);
        require_finite(&mut issues, "count", self.count);
        require_finite(&mut issues, "difference", self.difference);
        require_finite(&mut issues, "amount", self.amount);

        let is_exchange = self.kind == SafeCountType::Exchange;
        match (&self.denom_breakdown, is_exchange) {
            (Some(SafeDenomBreakdown::Flat(_)), true) => issues.push(ValidationError::InvalidFormat {
                field: "denomBreakdown".to_string(),
                reason: "exchange requires incoming and outgoing breakdowns".to_string(),
            }),
            (Some(SafeDenomBreakdown::Exchange { .. }), false) => {
                issues.push(ValidationError::InvalidFormat {
                    field: "denomBreakdown".to_string(),
                    reason: format!("{} requires a flat denomination map", self.kind),
                })
            }
            _ => {}
        }
        if !is_exchange {
            forbid_present(&mut issues, "direction", &self.direction, "outside an exchange");
        }
        issues
    }
}

impl LedgerRecord for TillShift {
    const COLLECTION: &'static str = "tillShifts";
    const LABEL: &'static str = "till shift";

    /// Shifts ordered by `closedAt` fall back to `openedAt` while still open.
    fn sort_key(&self, order_by: Option<&str>) -> &str {
        match (order_by, self.closed_at.as_deref()) {
            (Some("closedAt"), Some(closed_at)) => closed_at,
            _ => &self.opened_at,
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();
        require_text(&mut issues, "shiftId", &self.shift_id);
        require_text(&mut issues, "openedAt", &self.opened_at);
        require_text(&mut issues, "openedBy", &self.opened_by);
        require_finite(&mut issues, "openingCash", Some(self.opening_cash));
        require_finite(&mut issues, "closingCash", self.closing_cash);
        require_finite(&mut issues, "closeDifference", self.close_difference);

        match self.status {
            ShiftStatus::Closed => {
                require_present(&mut issues, "closedAt", &self.closed_at);
                require_present(&mut issues, "closedBy", &self.closed_by);
                require_present(&mut issues, "closingCash", &self.closing_cash);
                require_present(&mut issues, "closingKeycards", &self.closing_keycards);
                require_present(&mut issues, "closeDifference", &self.close_difference);
                require_present(&mut issues, "closeType", &self.close_type);
            }
            ShiftStatus::Open => {
                let reason = "on an open shift";
                forbid_present(&mut issues, "closedAt", &self.closed_at, reason);
                forbid_present(&mut issues, "closedBy", &self.closed_by, reason);
                forbid_present(&mut issues, "closingCash", &self.closing_cash, reason);
                forbid_present(&mut issues, "closingKeycards", &self.closing_keycards, reason);
                forbid_present(&mut issues, "closeDifference", &self.close_difference, reason);
                forbid_present(&mut issues, "closeType", &self.close_type, reason);
            }
        }
        issues
    }
}

impl LedgerRecord for ManualPmsPosting {
    const COLLECTION: &'static str = "pmsPostings";
    const LABEL: &'static str = "PMS posting";

    fn sort_key(&self, _order_by: Option<&str>) -> &str {
        &self.created_at
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();
        require_finite(&mut issues, "amount", Some(self.amount));
        require_text(&mut issues, "createdAt", &self.created_at);
        require_text(&mut issues, "createdBy", &self.created_by);
        issues
    }
}

impl LedgerRecord for ManualTerminalBatch {
    const COLLECTION: &'static str = "terminalBatches";
    const LABEL: &'static str = "terminal batch";

    fn sort_key(&self, _order_by: Option<&str>) -> &str {
        &self.created_at
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();
        require_finite(&mut issues, "amount", Some(self.amount));
        require_text(&mut issues, "createdAt", &self.created_at);
        require_text(&mut issues, "createdBy", &self.created_by);
        issues
    }
}

impl LedgerRecord for PosTransaction {
    const COLLECTION: &'static str = "transactions";
    const LABEL: &'static str = "transaction";

    fn sort_key(&self, _order_by: Option<&str>) -> &str {
        &self.timestamp
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();
        require_finite(&mut issues, "amount", Some(self.amount));
        require_text(&mut issues, "timestamp", &self.timestamp);
        issues
    }
}

impl LedgerRecord for EodClosure {
    const COLLECTION: &'static str = "eodClosures";
    const LABEL: &'static str = "end-of-day closure";

    fn sort_key(&self, _order_by: Option<&str>) -> &str {
        &self.date
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();
        if let Err(err) = validate_business_date("date", &self.date) {
            issues.push(err);
        }
        require_text(&mut issues, "timestamp", &self.timestamp);
        require_text(&mut issues, "confirmedBy", &self.confirmed_by);
        issues
    }
}

// =============================================================================
// Snapshot Parsing
// =============================================================================

/// Decodes and validates one raw record stored under `key`.
pub fn parse_record<T: LedgerRecord>(key: &str, value: &Value) -> ValidationResult<T> {
    let record: T = serde_json::from_value(value.clone()).map_err(|err| {
        ValidationErrors::from(ValidationError::Malformed {
            field: key.to_string(),
            reason: err.to_string(),
        })
    })?;
    let issues: Vec<ValidationError> = record
        .validate()
        .into_iter()
        .map(|issue| issue.within(key))
        .collect();
    ValidationErrors::from(issues).into_result()?;
    Ok(record)
}

/// Parses a whole collection snapshot.
///
/// ## Rules
/// - Every record must decode and validate; one bad record rejects all
/// - Issues from every record are collected, not just the first
/// - The result is sorted ascending by [`LedgerRecord::sort_key`]
///   (lexical; ties keep key order)
pub fn parse_snapshot<T: LedgerRecord>(
    snapshot: &BTreeMap<String, Value>,
    order_by: Option<&str>,
) -> ValidationResult<Vec<T>> {
    let mut records = Vec::with_capacity(snapshot.len());
    let mut errors = ValidationErrors::new();

    for (key, value) in snapshot {
        match parse_record::<T>(key, value) {
            Ok(record) => records.push(record),
            Err(issues) => errors.extend(issues.issues().iter().cloned()),
        }
    }

    errors.into_result()?;
    sort_records(&mut records, order_by);
    Ok(records)
}

/// Sorts records ascending by their sort key.
pub fn sort_records<T: LedgerRecord>(records: &mut [T], order_by: Option<&str>) {
    records.sort_by(|a, b| a.sort_key(order_by).cmp(b.sort_key(order_by)));
}

// =============================================================================
// Unit Tests
// =============================================================================
