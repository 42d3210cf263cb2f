//! # Ledger Record Types
//!
//! Every record the reception ledgers hold, as it travels on the wire.
//!
//! ## Collections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Path              Record              Write style                      │
//! │  ────────────────  ──────────────────  ──────────────────────────────   │
//! │  cashCounts        CashCount           append (auto key)                │
//! │  safeCounts        SafeCount           append (auto key)                │
//! │  tillShifts/<id>   TillShift           create once, close once          │
//! │  pmsPostings       ManualPmsPosting    append (auto key)                │
//! │  terminalBatches   ManualTerminalBatch append (auto key)                │
//! │  transactions      PosTransaction      read only (POS owns it)          │
//! │  eodClosures/<day> EodClosure          keyed overwrite (idempotent)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names are camelCase on the wire. Timestamps are ISO-8601 strings in
//! Italy local time and are compared lexically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::money::Amount;

/// Denomination label (`"50"`, `"0.2"`) → number of notes/coins.
pub type DenomBreakdown = BTreeMap<String, u32>;

// =============================================================================
// Enums
// =============================================================================

/// Payment method shared by POS transactions and PMS postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Cc,
}

/// Drawer-level event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum CashCountType {
    Opening,
    Close,
    Reconcile,
    Float,
    TenderRemoval,
}

impl CashCountType {
    /// Close and reconcile counts end a shift and carry its variance.
    pub fn ends_shift(&self) -> bool {
        matches!(self, CashCountType::Close | CashCountType::Reconcile)
    }
}

/// Safe-level event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum SafeCountType {
    Deposit,
    Withdrawal,
    BankDeposit,
    BankWithdrawal,
    Exchange,
    PettyWithdrawal,
    Opening,
    SafeReset,
    SafeReconcile,
}

impl SafeCountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafeCountType::Deposit => "deposit",
            SafeCountType::Withdrawal => "withdrawal",
            SafeCountType::BankDeposit => "bankDeposit",
            SafeCountType::BankWithdrawal => "bankWithdrawal",
            SafeCountType::Exchange => "exchange",
            SafeCountType::PettyWithdrawal => "pettyWithdrawal",
            SafeCountType::Opening => "opening",
            SafeCountType::SafeReset => "safeReset",
            SafeCountType::SafeReconcile => "safeReconcile",
        }
    }
}

impl fmt::Display for SafeCountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way notes moved during an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ExchangeDirection {
    DrawerToSafe,
    SafeToDrawer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ShiftStatus {
    Open,
    Closed,
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftStatus::Open => f.write_str("open"),
            ShiftStatus::Closed => f.write_str("closed"),
        }
    }
}

/// How a shift ended: a full close or a mid-shift reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum CloseType {
    Close,
    Reconcile,
}

// =============================================================================
// Cash Count
// =============================================================================

/// One drawer-level event.
///
/// `count` is meaningful for opening/close/reconcile, `amount` for float and
/// tender removal. Records are never edited once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashCount {
    pub user: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: CashCountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub count: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub difference: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub denom_breakdown: Option<DenomBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub keycard_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub shift_id: Option<String>,
}

impl CashCount {
    /// Creates a bare event; optional fields start empty.
    pub fn new(user: impl Into<String>, timestamp: impl Into<String>, kind: CashCountType) -> Self {
        CashCount {
            user: user.into(),
            timestamp: timestamp.into(),
            kind,
            count: None,
            difference: None,
            amount: None,
            denom_breakdown: None,
            keycard_count: None,
            shift_id: None,
        }
    }
}

// =============================================================================
// Safe Count
// =============================================================================

/// Denominations moved in a safe event.
///
/// Exchanges record both sides; every other type records a flat map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum SafeDenomBreakdown {
    Exchange {
        incoming: DenomBreakdown,
        outgoing: DenomBreakdown,
    },
    Flat(DenomBreakdown),
}

/// One safe-level event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SafeCount {
    pub user: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: SafeCountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub count: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub difference: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub denom_breakdown: Option<SafeDenomBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub direction: Option<ExchangeDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub keycard_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub keycard_difference: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub shift_id: Option<String>,
}

impl SafeCount {
    pub fn new(user: impl Into<String>, timestamp: impl Into<String>, kind: SafeCountType) -> Self {
        SafeCount {
            user: user.into(),
            timestamp: timestamp.into(),
            kind,
            count: None,
            difference: None,
            amount: None,
            denom_breakdown: None,
            direction: None,
            keycard_count: None,
            keycard_difference: None,
            shift_id: None,
        }
    }
}

// =============================================================================
// Till Shift
// =============================================================================

/// One shift lifecycle record, stored at `tillShifts/<shiftId>`.
///
/// ## Lifecycle
/// ```text
///   open ──(close / reconcile, exactly once)──► closed
/// ```
/// The opening half is written at creation. The closing half (`closed*`,
/// `closeDifference`, `closeType`) is written by a single partial update.
/// `closeDifference = closingCash − expected`: negative is short, positive is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TillShift {
    pub shift_id: String,
    pub status: ShiftStatus,
    pub opened_at: String,
    pub opened_by: String,
    pub opening_cash: Amount,
    pub opening_keycards: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub closed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub closed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub closing_cash: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub closing_keycards: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub close_difference: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub close_type: Option<CloseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub variance_signoff_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub signed_off_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub signed_off_by_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub signed_off_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub variance_note: Option<String>,
}

impl TillShift {
    /// Creates the opening half of a shift.
    pub fn opened(
        shift_id: impl Into<String>,
        opened_at: impl Into<String>,
        opened_by: impl Into<String>,
        opening_cash: Amount,
        opening_keycards: u32,
    ) -> Self {
        TillShift {
            shift_id: shift_id.into(),
            status: ShiftStatus::Open,
            opened_at: opened_at.into(),
            opened_by: opened_by.into(),
            opening_cash,
            opening_keycards,
            closed_at: None,
            closed_by: None,
            closing_cash: None,
            closing_keycards: None,
            close_difference: None,
            close_type: None,
            variance_signoff_required: None,
            signed_off_by: None,
            signed_off_by_uid: None,
            signed_off_at: None,
            variance_note: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }
}

/// Manager sign-off attached to a shift close with a large variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VarianceSignoff {
    pub signed_off_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub signed_off_by_uid: Option<String>,
    pub signed_off_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub variance_note: Option<String>,
}

/// The closing half of a shift, written as one partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShiftClosePatch {
    pub status: ShiftStatus,
    pub closed_at: String,
    pub closed_by: String,
    pub closing_cash: Amount,
    pub closing_keycards: u32,
    pub close_difference: Amount,
    pub close_type: CloseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub variance_signoff_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub signed_off_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub signed_off_by_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub signed_off_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub variance_note: Option<String>,
}

impl ShiftClosePatch {
    /// Applies the patch to an open shift, producing the closed record.
    pub fn apply_to(&self, shift: &TillShift) -> TillShift {
        TillShift {
            status: self.status,
            closed_at: Some(self.closed_at.clone()),
            closed_by: Some(self.closed_by.clone()),
            closing_cash: Some(self.closing_cash),
            closing_keycards: Some(self.closing_keycards),
            close_difference: Some(self.close_difference),
            close_type: Some(self.close_type),
            variance_signoff_required: self.variance_signoff_required,
            signed_off_by: self.signed_off_by.clone(),
            signed_off_by_uid: self.signed_off_by_uid.clone(),
            signed_off_at: self.signed_off_at.clone(),
            variance_note: self.variance_note.clone(),
            ..shift.clone()
        }
    }
}

// =============================================================================
// Manual Reconciliation Inputs
// =============================================================================

/// A PMS total keyed in by reception staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ManualPmsPosting {
    pub amount: Amount,
    pub method: PaymentMethod,
    pub created_at: String,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub note: Option<String>,
}

/// A card-terminal batch total keyed in by reception staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ManualTerminalBatch {
    pub amount: Amount,
    pub created_at: String,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub note: Option<String>,
}

/// A till sale as recorded by the POS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PosTransaction {
    pub method: PaymentMethod,
    pub amount: Amount,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub user: Option<String>,
}

// =============================================================================
// End of Day
// =============================================================================

/// Confirmation that a business day (Italy date) has been closed.
///
/// Stored at `eodClosures/<YYYY-MM-DD>`; confirming again overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EodClosure {
    pub date: String,
    pub timestamp: String,
    pub confirmed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub uid: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cash_count_wire_format() {
        let mut count = CashCount::new("anna", "2024-01-01T08:00:00.000+00:00", CashCountType::TenderRemoval);
        count.amount = Some(Amount::new(50.0));
        count.shift_id = Some("shift-1".to_string());

        let value = serde_json::to_value(&count).unwrap();
        assert_eq!(
            value,
            json!({
                "user": "anna",
                "timestamp": "2024-01-01T08:00:00.000+00:00",
                "type": "tenderRemoval",
                "amount": 50.0,
                "shiftId": "shift-1"
            })
        );
    }

    #[test]
    fn test_safe_breakdown_shapes() {
        let flat: SafeDenomBreakdown = serde_json::from_value(json!({"50": 2, "20": 1})).unwrap();
        assert!(matches!(flat, SafeDenomBreakdown::Flat(_)));

        let exchange: SafeDenomBreakdown = serde_json::from_value(json!({
            "incoming": {"10": 5},
            "outgoing": {"50": 1}
        }))
        .unwrap();
        assert!(matches!(exchange, SafeDenomBreakdown::Exchange { .. }));
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(serde_json::to_value(PaymentMethod::Cash).unwrap(), json!("CASH"));
        assert_eq!(serde_json::to_value(PaymentMethod::Cc).unwrap(), json!("CC"));
    }

    #[test]
    fn test_safe_type_names_match_wire() {
        for kind in [
            SafeCountType::BankDeposit,
            SafeCountType::PettyWithdrawal,
            SafeCountType::SafeReconcile,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }

    #[test]
    fn test_close_patch_applies_to_open_shift() {
        let shift = TillShift::opened("s1", "2024-01-01T08:00:00.000+00:00", "anna", Amount::new(100.0), 5);
        let patch = ShiftClosePatch {
            status: ShiftStatus::Closed,
            closed_at: "2024-01-01T16:00:00.000+00:00".to_string(),
            closed_by: "anna".to_string(),
            closing_cash: Amount::new(98.0),
            closing_keycards: 5,
            close_difference: Amount::new(-2.0),
            close_type: CloseType::Close,
            variance_signoff_required: None,
            signed_off_by: None,
            signed_off_by_uid: None,
            signed_off_at: None,
            variance_note: None,
        };

        let closed = patch.apply_to(&shift);
        assert_eq!(closed.status, ShiftStatus::Closed);
        assert_eq!(closed.opened_by, "anna");
        assert_eq!(closed.close_difference, Some(Amount::new(-2.0)));
    }
}
