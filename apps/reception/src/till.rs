//! # Till Workflow
//!
//! Opening and closing the drawer. Each step is a cash count plus the
//! matching shift record, written as separate ledger calls.
//!
//! ```text
//!   open  ── till already open? ──► refuse
//!         ├─ cashCounts  opening  (difference vs last close)
//!         └─ tillShifts  create   shift-<uuid>
//!
//!   close ── sign-off required and missing? ──► refuse
//!         ├─ till not open? ───────────────────► refuse
//!         ├─ expected = opening + floats − removals + POS cash
//!         ├─ cashCounts  close | reconcile  (difference vs expected)
//!         ├─ tillShifts  update  closing half
//!         └─ reconcile only:
//!              ├─ cashCounts  opening  (difference 0, same count)
//!              └─ tillShifts  create   new shift
//! ```

use tracing::{info, warn};
use uuid::Uuid;

use till_core::shift::{calculate_discrepancy, expected_drawer_cash, find_open_shift, last_close};
use till_core::{Amount, CashCount, CashCountType, CloseType, DenomBreakdown, PosTransaction, VarianceSignoff};

use crate::error::MutationResult;
use crate::mutations::{CashCountDraft, MutationService, ShiftClose};

pub const TILL_ALREADY_OPEN: &str =
    "You already have an open till record in the database. Please close it first.";
pub const TILL_OPEN_BY_OTHER: &str = "The till is currently open under another user. That user must close it before anyone else can open it.";
pub const TILL_NOT_OPEN: &str = "Cannot close the till because it is not currently open.";

/// Counted drawer at opening.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTill {
    pub counted: Amount,
    pub keycards: u32,
    pub denom_breakdown: Option<DenomBreakdown>,
}

/// Counted drawer at close or reconcile.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseTill {
    pub action: CloseType,
    pub counted: Amount,
    pub keycards: u32,
    pub denom_breakdown: Option<DenomBreakdown>,
    pub signoff_required: bool,
    pub signoff: Option<VarianceSignoff>,
}

/// What a close wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTill {
    pub expected: Amount,
    pub difference: Amount,
    /// Shift opened by a reconcile.
    pub next_shift_id: Option<String>,
}

pub fn new_shift_id() -> String {
    format!("shift-{}", Uuid::new_v4())
}

#[derive(Clone)]
pub struct TillWorkflow {
    mutations: MutationService,
}

impl TillWorkflow {
    pub fn new(mutations: MutationService) -> Self {
        TillWorkflow { mutations }
    }

    /// Opens the till and returns the new shift id.
    ///
    /// `cash_counts` is the current sorted drawer view.
    pub async fn open(
        &self,
        cash_counts: &[CashCount],
        input: OpenTill,
    ) -> MutationResult<Option<String>> {
        let user = self.mutations.require_user()?;

        if let Some(open) = find_open_shift(cash_counts) {
            let message = if open.user == user.user_name {
                TILL_ALREADY_OPEN
            } else {
                TILL_OPEN_BY_OTHER
            };
            return Err(self.mutations.reject(message));
        }

        let previous = last_close(cash_counts)
            .and_then(|close| close.count)
            .unwrap_or_default();
        let difference = calculate_discrepancy(input.counted, previous);

        let shift_id = new_shift_id();
        let opened = self
            .open_shift(&shift_id, input.counted, difference, input.keycards, input.denom_breakdown)
            .await?;
        if opened {
            info!(shift_id = %shift_id, user = %user.user_name, "Till opened");
            self.mutations.notifier().success("Till opened.");
            Ok(Some(shift_id))
        } else {
            Ok(None)
        }
    }

    /// Closes (or reconciles) the open till.
    pub async fn close(
        &self,
        cash_counts: &[CashCount],
        transactions: &[PosTransaction],
        input: CloseTill,
    ) -> MutationResult<Option<ClosedTill>> {
        let user = self.mutations.require_user()?;
        self.mutations
            .require_signoff(input.signoff_required, input.signoff.as_ref())?;

        let Some(opening) = find_open_shift(cash_counts) else {
            return Err(self.mutations.reject(TILL_NOT_OPEN));
        };
        let expected = expected_drawer_cash(opening, cash_counts, transactions);
        let difference = calculate_discrepancy(input.counted, expected);

        let kind = match input.action {
            CloseType::Close => CashCountType::Close,
            CloseType::Reconcile => CashCountType::Reconcile,
        };
        let written = self
            .mutations
            .add_cash_count(
                kind,
                CashCountDraft {
                    count: Some(input.counted),
                    difference: Some(difference),
                    denom_breakdown: input.denom_breakdown.clone(),
                    keycard_count: Some(input.keycards),
                    shift_id: opening.shift_id.clone(),
                    ..CashCountDraft::default()
                },
            )
            .await?;
        if written.is_none() {
            return Ok(None);
        }

        match opening.shift_id.as_deref() {
            Some(shift_id) => {
                let close = ShiftClose {
                    closing_cash: input.counted,
                    closing_keycards: input.keycards,
                    close_difference: difference,
                    close_type: input.action,
                    signoff_required: input.signoff_required,
                    signoff: input.signoff,
                };
                let closed = self.mutations.write_shift_close(&user, shift_id, close).await?;
                if closed.is_none() {
                    return Ok(None);
                }
            }
            None => warn!(
                user = %user.user_name,
                opened_at = %opening.timestamp,
                "Opening count has no shift id, no shift record to close"
            ),
        }

        let mut next_shift_id = None;
        if input.action == CloseType::Reconcile {
            let shift_id = new_shift_id();
            let reopened = self
                .open_shift(&shift_id, input.counted, Amount::zero(), input.keycards, input.denom_breakdown)
                .await?;
            if !reopened {
                return Ok(None);
            }
            next_shift_id = Some(shift_id);
        }

        info!(
            user = %user.user_name,
            expected = %expected,
            difference = %difference,
            action = ?input.action,
            "Till closed"
        );
        self.mutations.notifier().success(match input.action {
            CloseType::Close => "Till closed.",
            CloseType::Reconcile => "Till reconciled.",
        });

        Ok(Some(ClosedTill {
            expected,
            difference,
            next_shift_id,
        }))
    }

    /// Opening count plus shift record. `false` when either write failed.
    async fn open_shift(
        &self,
        shift_id: &str,
        counted: Amount,
        difference: Amount,
        keycards: u32,
        denom_breakdown: Option<DenomBreakdown>,
    ) -> MutationResult<bool> {
        let count = self
            .mutations
            .add_cash_count(
                CashCountType::Opening,
                CashCountDraft {
                    count: Some(counted),
                    difference: Some(difference),
                    denom_breakdown,
                    keycard_count: Some(keycards),
                    shift_id: Some(shift_id.to_string()),
                    ..CashCountDraft::default()
                },
            )
            .await?;
        if count.is_none() {
            return Ok(false);
        }
        let shift = self
            .mutations
            .record_shift_open(shift_id, counted, keycards)
            .await?;
        Ok(shift.is_some())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
