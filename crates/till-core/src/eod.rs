//! # End-of-Day Checklist
//!
//! Before a manager confirms the business day closed, two things must be
//! true: the till is not left open and the safe has been reconciled today.
//!
//! ```text
//!   tillShifts (today) ── none open? ──────────► till done
//!   safeCounts         ── safeReconcile today? ► safe done
//!   eodClosures/<date> ── present? ────────────► day closed
//!
//!   can confirm = till done AND safe done AND NOT day closed
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::safe::safe_reconciled_on;
use crate::time::date_key;
use crate::types::{EodClosure, SafeCount, TillShift};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EodChecklist {
    pub date: String,
    pub till_done: bool,
    pub safe_done: bool,
    /// Existing confirmation for `date`, if any.
    pub closure: Option<EodClosure>,
}

impl EodChecklist {
    /// Evaluates the checklist for `today`.
    ///
    /// `shifts` is the shift view for today's window; a closure for another
    /// date is ignored.
    pub fn evaluate(
        today: NaiveDate,
        shifts: &[TillShift],
        safe_counts: &[SafeCount],
        closure: Option<&EodClosure>,
    ) -> Self {
        let date = date_key(today);
        EodChecklist {
            till_done: !shifts.iter().any(TillShift::is_open),
            safe_done: safe_reconciled_on(safe_counts, today),
            closure: closure.filter(|c| c.date == date).cloned(),
            date,
        }
    }

    pub fn all_done(&self) -> bool {
        self.till_done && self.safe_done
    }

    pub fn is_day_closed(&self) -> bool {
        self.closure.is_some()
    }

    /// Whether the "confirm day closed" action is offered.
    pub fn can_confirm(&self) -> bool {
        self.all_done() && !self.is_day_closed()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Amount;
    use crate::types::{SafeCountType, ShiftStatus};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
    }

    fn shift(id: &str, status: ShiftStatus) -> TillShift {
        let mut s = TillShift::opened(id, "2026-02-28T07:00:00.000+00:00", "anna", Amount::new(100.0), 4);
        s.status = status;
        s
    }

    fn safe(kind: SafeCountType, timestamp: &str) -> SafeCount {
        SafeCount::new("anna", timestamp, kind)
    }

    fn closure(date: &str) -> EodClosure {
        EodClosure {
            date: date.to_string(),
            timestamp: format!("{date}T21:00:00.000+00:00"),
            confirmed_by: "marco".to_string(),
            uid: None,
        }
    }

    #[test]
    fn test_all_done_offers_confirm() {
        let checklist = EodChecklist::evaluate(
            today(),
            &[shift("s1", ShiftStatus::Closed)],
            &[safe(SafeCountType::SafeReconcile, "2026-02-28T20:00:00.000+00:00")],
            None,
        );
        assert!(checklist.till_done);
        assert!(checklist.safe_done);
        assert!(checklist.can_confirm());
    }

    #[test]
    fn test_open_shift_blocks_till() {
        let checklist = EodChecklist::evaluate(
            today(),
            &[shift("s1", ShiftStatus::Closed), shift("s2", ShiftStatus::Open)],
            &[safe(SafeCountType::SafeReconcile, "2026-02-28T20:00:00.000+00:00")],
            None,
        );
        assert!(!checklist.till_done);
        assert!(!checklist.can_confirm());
    }

    #[test]
    fn test_safe_needs_reconcile_today() {
        let deposit_only = EodChecklist::evaluate(
            today(),
            &[],
            &[safe(SafeCountType::Deposit, "2026-02-28T10:00:00.000+00:00")],
            None,
        );
        assert!(!deposit_only.safe_done);

        let yesterday = EodChecklist::evaluate(
            today(),
            &[],
            &[safe(SafeCountType::SafeReconcile, "2026-02-27T20:00:00.000+00:00")],
            None,
        );
        assert!(!yesterday.safe_done);
    }

    #[test]
    fn test_existing_closure_hides_confirm() {
        let existing = closure("2026-02-28");
        let checklist = EodChecklist::evaluate(
            today(),
            &[],
            &[safe(SafeCountType::SafeReconcile, "2026-02-28T20:00:00.000+00:00")],
            Some(&existing),
        );
        assert!(checklist.all_done());
        assert!(checklist.is_day_closed());
        assert!(!checklist.can_confirm());
    }

    #[test]
    fn test_closure_for_other_date_is_ignored() {
        let stale = closure("2026-02-27");
        let checklist = EodChecklist::evaluate(today(), &[], &[], Some(&stale));
        assert!(!checklist.is_day_closed());
        assert_eq!(checklist.date, "2026-02-28");
    }
}
