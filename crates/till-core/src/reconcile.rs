//! # Reconciliation Aggregator
//!
//! Combines the four independent money sources of a business day into one
//! comparison table with per-source deltas.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  POS transactions ──► Σ by method ──► posCash, posCc                   │
//! │  Cash counts ───────► last.count ───► drawer                           │
//! │  PMS postings ──────► Σ by method ──► pmsCash, pmsCc                   │
//! │  Terminal batches ──► Σ ────────────► terminal                         │
//! │                             │                                           │
//! │                             ▼                                           │
//! │              finite & ≥ 0 ?  no ──► 0 + InvalidData warning             │
//! │                             │                                           │
//! │                             ▼                                           │
//! │   Drawer Cash Δ = drawer   − posCash                                   │
//! │   PMS Cash Δ    = pmsCash  − posCash                                   │
//! │   PMS CC Δ      = pmsCc    − posCc                                     │
//! │   Terminal CC Δ = terminal − posCc                                     │
//! │                             │                                           │
//! │                             ▼                                           │
//! │           |Δ| < 0.01 → Balanced, otherwise Discrepant                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The report is always complete: four rows, every cell filled, even when
//! inputs are empty or nonsensical.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Amount;
use crate::types::{CashCount, ManualPmsPosting, ManualTerminalBatch, PaymentMethod, PosTransaction};

// =============================================================================
// Inputs
// =============================================================================

/// Everything the aggregator reads. Lists are the current ledger views.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationInputs<'a> {
    pub transactions: &'a [PosTransaction],
    /// Sorted ascending; the last element is the drawer as of now.
    pub cash_counts: &'a [CashCount],
    pub pms_postings: &'a [ManualPmsPosting],
    pub terminal_batches: &'a [ManualTerminalBatch],
    pub pms_loading: bool,
    pub terminal_loading: bool,
}

// =============================================================================
// Output Types
// =============================================================================

/// Outcome of comparing one delta against the epsilon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum DeltaStatus {
    Balanced,
    Discrepant,
}

impl DeltaStatus {
    /// Balanced iff `|delta| < 0.01`.
    pub fn classify(delta: Amount) -> Self {
        if delta.is_negligible() {
            DeltaStatus::Balanced
        } else {
            DeltaStatus::Discrepant
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Delta {
    pub amount: Amount,
    pub status: DeltaStatus,
}

impl Delta {
    pub fn between(actual: Amount, expected: Amount) -> Self {
        let amount = actual - expected;
        Delta {
            amount,
            status: DeltaStatus::classify(amount),
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.status == DeltaStatus::Balanced
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ReconciliationSource {
    Pos,
    CashDrawer,
    Pms,
    Terminal,
}

impl ReconciliationSource {
    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationSource::Pos => "POS Totals",
            ReconciliationSource::CashDrawer => "Cash Drawer",
            ReconciliationSource::Pms => "PMS Postings",
            ReconciliationSource::Terminal => "Terminal Batch",
        }
    }
}

/// One table row. `None` cells render as `-`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReconciliationRow {
    pub source: ReconciliationSource,
    pub cash: Option<Amount>,
    pub cc: Option<Amount>,
    pub cash_delta: Option<Delta>,
    pub cc_delta: Option<Delta>,
}

/// Non-blocking problems shown above the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ReconciliationWarning {
    /// At least one aggregate was negative or not a number and shows as 0.
    InvalidData,
    MissingPmsPostings,
    MissingTerminalBatch,
}

impl ReconciliationWarning {
    pub fn message(&self) -> &'static str {
        match self {
            ReconciliationWarning::InvalidData => "Some values could not be parsed.",
            ReconciliationWarning::MissingPmsPostings => {
                "No PMS postings entered for today. Add entries below."
            }
            ReconciliationWarning::MissingTerminalBatch => {
                "No terminal batch entered for today. Add an entry below."
            }
        }
    }
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The six sanitised aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SourceTotals {
    pub pos_cash: Amount,
    pub pos_cc: Amount,
    pub drawer: Amount,
    pub pms_cash: Amount,
    pub pms_cc: Amount,
    pub terminal: Amount,
}

/// Full reconciliation table for one recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReconciliationReport {
    pub totals: SourceTotals,
    pub rows: Vec<ReconciliationRow>,
    pub warnings: Vec<ReconciliationWarning>,
}

impl ReconciliationReport {
    pub fn has_invalid_data(&self) -> bool {
        self.warnings.contains(&ReconciliationWarning::InvalidData)
    }

    pub fn row(&self, source: ReconciliationSource) -> Option<&ReconciliationRow> {
        self.rows.iter().find(|row| row.source == source)
    }

    /// Every delta in table order.
    pub fn deltas(&self) -> impl Iterator<Item = &Delta> {
        self.rows
            .iter()
            .flat_map(|row| row.cash_delta.iter().chain(row.cc_delta.iter()))
    }

    pub fn is_fully_balanced(&self) -> bool {
        self.deltas().all(Delta::is_balanced)
    }
}

impl Default for ReconciliationReport {
    fn default() -> Self {
        reconcile(&ReconciliationInputs {
            pms_loading: true,
            terminal_loading: true,
            ..ReconciliationInputs::default()
        })
    }
}

// =============================================================================
// Aggregation
// =============================================================================

fn sum_by_method(items: impl Iterator<Item = (PaymentMethod, Amount)>) -> (Amount, Amount) {
    items.fold((Amount::zero(), Amount::zero()), |(cash, cc), (method, amount)| match method {
        PaymentMethod::Cash => (cash + amount, cc),
        PaymentMethod::Cc => (cash, cc + amount),
    })
}

/// Substitutes 0 for an aggregate that is negative or not a number.
fn sanitise(total: Amount, invalid: &mut bool) -> Amount {
    if total.is_valid_total() {
        total
    } else {
        *invalid = true;
        Amount::zero()
    }
}

/// Raw totals before sanitising.
pub fn raw_totals(inputs: &ReconciliationInputs<'_>) -> SourceTotals {
    let (pos_cash, pos_cc) = sum_by_method(inputs.transactions.iter().map(|t| (t.method, t.amount)));
    let drawer = inputs
        .cash_counts
        .last()
        .and_then(|count| count.count)
        .unwrap_or_default();
    let (pms_cash, pms_cc) = sum_by_method(inputs.pms_postings.iter().map(|p| (p.method, p.amount)));
    let terminal: Amount = inputs.terminal_batches.iter().map(|b| b.amount).sum();

    SourceTotals {
        pos_cash,
        pos_cc,
        drawer,
        pms_cash,
        pms_cc,
        terminal,
    }
}

/// Computes the reconciliation table.
///
/// ## Example
/// ```rust
/// use till_core::reconcile::{reconcile, ReconciliationInputs, ReconciliationSource};
///
/// let report = reconcile(&ReconciliationInputs::default());
/// assert_eq!(report.rows.len(), 4);
/// assert!(report.row(ReconciliationSource::CashDrawer).unwrap().cash_delta.unwrap().is_balanced());
/// ```
pub fn reconcile(inputs: &ReconciliationInputs<'_>) -> ReconciliationReport {
    let raw = raw_totals(inputs);

    let mut invalid = false;
    let totals = SourceTotals {
        pos_cash: sanitise(raw.pos_cash, &mut invalid),
        pos_cc: sanitise(raw.pos_cc, &mut invalid),
        drawer: sanitise(raw.drawer, &mut invalid),
        pms_cash: sanitise(raw.pms_cash, &mut invalid),
        pms_cc: sanitise(raw.pms_cc, &mut invalid),
        terminal: sanitise(raw.terminal, &mut invalid),
    };

    let rows = vec![
        ReconciliationRow {
            source: ReconciliationSource::Pos,
            cash: Some(totals.pos_cash),
            cc: Some(totals.pos_cc),
            cash_delta: None,
            cc_delta: None,
        },
        ReconciliationRow {
            source: ReconciliationSource::CashDrawer,
            cash: Some(totals.drawer),
            cc: None,
            cash_delta: Some(Delta::between(totals.drawer, totals.pos_cash)),
            cc_delta: None,
        },
        ReconciliationRow {
            source: ReconciliationSource::Pms,
            cash: Some(totals.pms_cash),
            cc: Some(totals.pms_cc),
            cash_delta: Some(Delta::between(totals.pms_cash, totals.pos_cash)),
            cc_delta: Some(Delta::between(totals.pms_cc, totals.pos_cc)),
        },
        ReconciliationRow {
            source: ReconciliationSource::Terminal,
            cash: None,
            cc: Some(totals.terminal),
            cash_delta: None,
            cc_delta: Some(Delta::between(totals.terminal, totals.pos_cc)),
        },
    ];

    let mut warnings = Vec::new();
    if invalid {
        warnings.push(ReconciliationWarning::InvalidData);
    }
    if !inputs.pms_loading && inputs.pms_postings.is_empty() {
        warnings.push(ReconciliationWarning::MissingPmsPostings);
    }
    if !inputs.terminal_loading && inputs.terminal_batches.is_empty() {
        warnings.push(ReconciliationWarning::MissingTerminalBatch);
    }

    ReconciliationReport {
        totals,
        rows,
        warnings,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
