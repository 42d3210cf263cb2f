//! # Ledger Mutations
//!
//! Every write the reception console makes goes through [`MutationService`].
//!
//! ## One Contract For Every Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. session.current()  ── none ──► toast + Err(Unauthenticated)         │
//! │          │                                                              │
//! │  2. build record with clock.timestamp() (Italy local, +00:00)           │
//! │          │                                                              │
//! │  3. record.validate()  ── issues ──► toast + Err(Invalid)               │
//! │          │                                                              │
//! │  4. ONE transport call                                                  │
//! │     ├── append        cashCounts, safeCounts, pmsPostings,              │
//! │     │                 terminalBatches                                   │
//! │     ├── create        tillShifts/<shiftId>  (open)                      │
//! │     ├── update        tillShifts/<shiftId>  (close patch)               │
//! │     └── overwrite     eodClosures/<date>    (last writer wins)          │
//! │          │                                                              │
//! │  5. failure ──► error! + generic toast + Ok(None)                       │
//! │     success ──► Ok(Some(key))                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No retries and no batching: a caller that needs two writes makes two
//! calls and decides what to do when the second one fails.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use till_core::time::date_key;
use till_core::validation::{parse_record, LedgerRecord};
use till_core::{
    Amount, CashCount, CashCountType, CloseType, DenomBreakdown, EodClosure, ExchangeDirection,
    ManualPmsPosting, ManualTerminalBatch, PaymentMethod, SafeCount, SafeCountType,
    SafeDenomBreakdown, ShiftClosePatch, ShiftStatus, TillShift, ValidationError,
    ValidationErrors, VarianceSignoff,
};
use till_db::LedgerTransport;

use crate::auth::{Session, User};
use crate::clock::Clock;
use crate::error::{MutationError, MutationResult, NOT_AUTHORIZED};
use crate::notify::Notifier;

pub const AMOUNT_MUST_BE_POSITIVE: &str = "Amount must be greater than zero";
pub const SIGNOFF_REQUIRED: &str = "Manager sign-off is required before closing this shift.";

// =============================================================================
// Inputs
// =============================================================================

/// Caller-supplied part of a cash count; user and timestamp are filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashCountDraft {
    pub count: Option<Amount>,
    pub difference: Option<Amount>,
    pub amount: Option<Amount>,
    pub denom_breakdown: Option<DenomBreakdown>,
    pub keycard_count: Option<u32>,
    pub shift_id: Option<String>,
}

/// Caller-supplied part of a safe count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafeCountDraft {
    pub count: Option<Amount>,
    pub difference: Option<Amount>,
    pub amount: Option<Amount>,
    pub denom_breakdown: Option<SafeDenomBreakdown>,
    pub direction: Option<ExchangeDirection>,
    pub keycard_count: Option<u32>,
    pub keycard_difference: Option<i32>,
    pub shift_id: Option<String>,
}

/// Closing half of a shift.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftClose {
    pub closing_cash: Amount,
    pub closing_keycards: u32,
    pub close_difference: Amount,
    pub close_type: CloseType,
    pub signoff_required: bool,
    pub signoff: Option<VarianceSignoff>,
}

/// Keyed write target.
enum Write<'a> {
    Append,
    Create(&'a str),
    Overwrite(&'a str),
}

// =============================================================================
// Service
// =============================================================================

/// Validated ledger writes.
///
/// Cloning is cheap; clones share the transport, session and notifier.
#[derive(Clone)]
pub struct MutationService {
    transport: Arc<dyn LedgerTransport>,
    session: Arc<Session>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl MutationService {
    pub fn new(
        transport: Arc<dyn LedgerTransport>,
        session: Arc<Session>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        MutationService {
            transport,
            session,
            notifier,
            clock,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn transport(&self) -> &dyn LedgerTransport {
        self.transport.as_ref()
    }

    // =========================================================================
    // Cash drawer
    // =========================================================================

    /// Appends a drawer event.
    pub async fn add_cash_count(
        &self,
        kind: CashCountType,
        draft: CashCountDraft,
    ) -> MutationResult<Option<String>> {
        let user = self.require_user()?;
        let record = CashCount {
            count: draft.count,
            difference: draft.difference,
            amount: draft.amount,
            denom_breakdown: draft.denom_breakdown,
            keycard_count: draft.keycard_count,
            shift_id: draft.shift_id,
            ..CashCount::new(&user.user_name, self.clock.timestamp(), kind)
        };
        self.write(record, Write::Append).await
    }

    /// Cash added to the drawer during a shift.
    pub async fn record_float_entry(
        &self,
        amount: Amount,
        shift_id: Option<String>,
    ) -> MutationResult<Option<String>> {
        self.require_user()?;
        self.require_positive(amount)?;
        self.add_cash_count(
            CashCountType::Float,
            CashCountDraft {
                amount: Some(amount),
                shift_id,
                ..CashCountDraft::default()
            },
        )
        .await
    }

    /// Cash taken out of the drawer during a shift.
    pub async fn record_tender_removal(
        &self,
        amount: Amount,
        shift_id: Option<String>,
    ) -> MutationResult<Option<String>> {
        self.require_user()?;
        self.require_positive(amount)?;
        self.add_cash_count(
            CashCountType::TenderRemoval,
            CashCountDraft {
                amount: Some(amount),
                shift_id,
                ..CashCountDraft::default()
            },
        )
        .await
    }

    // =========================================================================
    // Safe
    // =========================================================================

    /// Appends a safe event.
    pub async fn add_safe_count(
        &self,
        kind: SafeCountType,
        draft: SafeCountDraft,
    ) -> MutationResult<Option<String>> {
        let user = self.require_user()?;
        let record = SafeCount {
            count: draft.count,
            difference: draft.difference,
            amount: draft.amount,
            denom_breakdown: draft.denom_breakdown,
            direction: draft.direction,
            keycard_count: draft.keycard_count,
            keycard_difference: draft.keycard_difference,
            shift_id: draft.shift_id,
            ..SafeCount::new(&user.user_name, self.clock.timestamp(), kind)
        };
        self.write(record, Write::Append).await
    }

    /// Swaps denominations between drawer and safe. Balance-neutral.
    pub async fn record_safe_exchange(
        &self,
        incoming: DenomBreakdown,
        outgoing: DenomBreakdown,
        direction: ExchangeDirection,
        amount: Amount,
    ) -> MutationResult<Option<String>> {
        self.add_safe_count(
            SafeCountType::Exchange,
            SafeCountDraft {
                amount: Some(amount),
                denom_breakdown: Some(SafeDenomBreakdown::Exchange { incoming, outgoing }),
                direction: Some(direction),
                ..SafeCountDraft::default()
            },
        )
        .await
    }

    // =========================================================================
    // Till shifts
    // =========================================================================

    /// Creates `tillShifts/<shift_id>` in the open state.
    pub async fn record_shift_open(
        &self,
        shift_id: &str,
        opening_cash: Amount,
        opening_keycards: u32,
    ) -> MutationResult<Option<String>> {
        let user = self.require_user()?;
        let record = TillShift::opened(
            shift_id,
            self.clock.timestamp(),
            &user.user_name,
            opening_cash,
            opening_keycards,
        );
        self.write(record, Write::Create(shift_id)).await
    }

    /// Writes the closing half of an open shift as one partial update.
    ///
    /// The patch is validated against the stored shift: the result must be
    /// a complete closed record, and a shift closes exactly once.
    pub async fn record_shift_close(
        &self,
        shift_id: &str,
        close: ShiftClose,
    ) -> MutationResult<Option<String>> {
        let user = self.require_user()?;
        self.require_signoff(close.signoff_required, close.signoff.as_ref())?;
        self.write_shift_close(&user, shift_id, close).await
    }

    /// [`Self::record_shift_close`] for callers that already checked the
    /// sign-off.
    pub(crate) async fn write_shift_close(
        &self,
        user: &User,
        shift_id: &str,
        close: ShiftClose,
    ) -> MutationResult<Option<String>> {
        let existing = match self.transport.fetch(TillShift::COLLECTION, shift_id).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                return Err(self.reject(format!("Till shift {shift_id} was not found.")));
            }
            Err(err) => {
                error!(shift_id, error = %err, "Failed to read till shift");
                self.notifier.error("Failed to close shift.");
                return Ok(None);
            }
        };
        let shift: TillShift = parse_record(shift_id, &existing)
            .map_err(|issues| self.invalid(TillShift::LABEL, issues))?;
        if !shift.is_open() {
            return Err(self.reject(format!("Till shift {shift_id} is already closed.")));
        }

        let signoff = close.signoff;
        let patch = ShiftClosePatch {
            status: ShiftStatus::Closed,
            closed_at: self.clock.timestamp(),
            closed_by: user.user_name.clone(),
            closing_cash: close.closing_cash,
            closing_keycards: close.closing_keycards,
            close_difference: close.close_difference,
            close_type: close.close_type,
            variance_signoff_required: close.signoff_required.then_some(true),
            signed_off_by: signoff.as_ref().map(|s| s.signed_off_by.clone()),
            signed_off_by_uid: signoff.as_ref().and_then(|s| s.signed_off_by_uid.clone()),
            signed_off_at: signoff.as_ref().map(|s| s.signed_off_at.clone()),
            variance_note: signoff.and_then(|s| s.variance_note),
        };

        patch
            .apply_to(&shift)
            .check()
            .map_err(|issues| self.invalid(TillShift::LABEL, issues))?;

        let Some(value) = self.to_value(&patch, TillShift::LABEL) else {
            return Ok(None);
        };
        match self.transport.update(TillShift::COLLECTION, shift_id, value).await {
            Ok(()) => {
                debug!(shift_id, close_type = ?patch.close_type, "Till shift closed");
                Ok(Some(shift_id.to_string()))
            }
            Err(err) => {
                error!(shift_id, error = %err, "Failed to close till shift");
                self.notifier.error("Failed to close shift.");
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Manual reconciliation inputs
    // =========================================================================

    /// Appends a PMS posting keyed in by staff.
    pub async fn add_pms_posting(
        &self,
        amount: Amount,
        method: PaymentMethod,
        note: Option<String>,
    ) -> MutationResult<Option<String>> {
        let user = self.require_user()?;
        self.require_positive(amount)?;
        let record = ManualPmsPosting {
            amount,
            method,
            created_at: self.clock.timestamp(),
            created_by: user.user_name,
            note: note.filter(|n| !n.trim().is_empty()),
        };
        self.write(record, Write::Append).await
    }

    /// Appends a terminal batch total keyed in by staff.
    pub async fn add_terminal_batch(
        &self,
        amount: Amount,
        note: Option<String>,
    ) -> MutationResult<Option<String>> {
        let user = self.require_user()?;
        self.require_positive(amount)?;
        let record = ManualTerminalBatch {
            amount,
            created_at: self.clock.timestamp(),
            created_by: user.user_name,
            note: note.filter(|n| !n.trim().is_empty()),
        };
        self.write(record, Write::Append).await
    }

    // =========================================================================
    // End of day
    // =========================================================================

    /// Writes `eodClosures/<date>`; a second confirmation overwrites the first.
    ///
    /// `date` defaults to today's Italy business date.
    pub async fn confirm_day_closed(
        &self,
        date: Option<NaiveDate>,
    ) -> MutationResult<Option<String>> {
        let user = self.require_user()?;
        let date = date_key(date.unwrap_or_else(|| self.clock.today()));
        let record = EodClosure {
            date: date.clone(),
            timestamp: self.clock.timestamp(),
            confirmed_by: user.user_name,
            uid: Some(user.uid),
        };
        self.write(record, Write::Overwrite(&date)).await
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    pub(crate) fn require_user(&self) -> MutationResult<User> {
        self.session.current().ok_or_else(|| {
            self.notifier.error(NOT_AUTHORIZED);
            MutationError::Unauthenticated
        })
    }

    /// Manual entry rule: amounts are strictly positive.
    pub(crate) fn require_positive(&self, amount: Amount) -> MutationResult<()> {
        if amount.is_finite() && amount.value() > 0.0 {
            return Ok(());
        }
        self.notifier.error(AMOUNT_MUST_BE_POSITIVE);
        Err(MutationError::Invalid {
            label: "amount",
            issues: ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into(),
        })
    }

    /// A variance that needs sign-off cannot close without one.
    pub(crate) fn require_signoff(
        &self,
        required: bool,
        signoff: Option<&VarianceSignoff>,
    ) -> MutationResult<()> {
        if required && signoff.is_none() {
            return Err(self.reject(SIGNOFF_REQUIRED));
        }
        Ok(())
    }

    pub(crate) fn reject(&self, message: impl Into<String>) -> MutationError {
        let message = message.into();
        self.notifier.error(&message);
        MutationError::Rejected(message)
    }

    fn invalid(&self, label: &'static str, issues: ValidationErrors) -> MutationError {
        let err = MutationError::Invalid { label, issues };
        self.notifier.error(&err.to_string());
        err
    }

    fn to_value<S: Serialize>(&self, record: &S, label: &str) -> Option<Value> {
        match serde_json::to_value(record) {
            Ok(value) => Some(value),
            Err(err) => {
                error!(label, error = %err, "Failed to encode record");
                self.notifier.error(&format!("Failed to save {label}."));
                None
            }
        }
    }

    async fn write<T: LedgerRecord>(&self, record: T, target: Write<'_>) -> MutationResult<Option<String>> {
        record
            .check()
            .map_err(|issues| self.invalid(T::LABEL, issues))?;

        let Some(value) = self.to_value(&record, T::LABEL) else {
            return Ok(None);
        };

        let result = match target {
            Write::Append => self.transport.append(T::COLLECTION, value).await,
            Write::Create(key) => self
                .transport
                .create(T::COLLECTION, key, value)
                .await
                .map(|()| key.to_string()),
            Write::Overwrite(key) => self
                .transport
                .overwrite(T::COLLECTION, key, value)
                .await
                .map(|()| key.to_string()),
        };

        match result {
            Ok(key) => {
                debug!(collection = T::COLLECTION, key = %key, "Ledger write");
                Ok(Some(key))
            }
            Err(err) => {
                error!(collection = T::COLLECTION, error = %err, "Ledger write failed");
                self.notifier.error(&format!("Failed to save {}.", T::LABEL));
                Ok(None)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
