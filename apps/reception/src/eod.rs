//! # End-of-Day View
//!
//! Loads today's checklist, builds the end-of-day report and gates the
//! "confirm day closed" action.
//!
//! ```text
//!   management user? ── no ──► no checklist, confirm refused
//!        │
//!        ▼
//!   tillShifts  openedAt ∈ today ─┐
//!   safeCounts  timestamp ∈ today ├──► EodChecklist::evaluate
//!   eodClosures/<today> ──────────┘          │
//!                                            ▼
//!                             can_confirm ──► eodClosures/<today>
//!
//!   posTransactions, cashCounts  timestamp ∈ date ─┐
//!   safeCounts  timestamp ≤ end of date ───────────┴──► EodReport
//! ```

use tracing::{error, info};

use chrono::NaiveDate;
use till_core::eod::EodChecklist;
use till_core::eod_report::{build_eod_report, EodReport};
use till_core::time::{date_key, end_of_day_iso, ReportWindow};
use till_core::validation::{parse_record, LedgerRecord};
use till_core::{CashCount, EodClosure, PosTransaction, SafeCount, TillShift};
use till_db::LedgerQuery;

use crate::error::MutationResult;
use crate::mutations::MutationService;
use crate::subscription::LedgerError;
use crate::workbench::{load_once, window_query};

pub const MANAGEMENT_ONLY: &str = "Only managers can confirm the day closed.";
pub const DAY_NOT_READY: &str = "Close the till and reconcile the safe before closing the day.";
pub const DAY_ALREADY_CLOSED: &str = "The day has already been confirmed closed.";

#[derive(Clone)]
pub struct EodView {
    mutations: MutationService,
}

impl EodView {
    pub fn new(mutations: MutationService) -> Self {
        EodView { mutations }
    }

    /// Today's checklist, or `None` for users without management access.
    pub async fn checklist(&self) -> Result<Option<EodChecklist>, LedgerError> {
        match self.mutations.session().current() {
            Some(user) if user.is_management() => self.evaluate().await.map(Some),
            _ => Ok(None),
        }
    }

    /// End-of-day report for `date`, or `None` for users without management
    /// access.
    pub async fn report(&self, date: NaiveDate) -> Result<Option<EodReport>, LedgerError> {
        match self.mutations.session().current() {
            Some(user) if user.is_management() => self.build_report(date).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Confirms today closed once the checklist allows it.
    pub async fn confirm(&self) -> MutationResult<Option<String>> {
        let user = self.mutations.require_user()?;
        if !user.is_management() {
            return Err(self.mutations.reject(MANAGEMENT_ONLY));
        }

        let checklist = match self.evaluate().await {
            Ok(checklist) => checklist,
            Err(err) => {
                error!(error = %err, "Failed to load end-of-day checklist");
                self.mutations.notifier().error(&err.to_string());
                return Ok(None);
            }
        };
        if checklist.is_day_closed() {
            return Err(self.mutations.reject(DAY_ALREADY_CLOSED));
        }
        if !checklist.all_done() {
            return Err(self.mutations.reject(DAY_NOT_READY));
        }

        let key = self.mutations.confirm_day_closed(None).await?;
        if key.is_some() {
            info!(date = %checklist.date, user = %user.user_name, "Day confirmed closed");
            self.mutations.notifier().success("Day closed.");
        }
        Ok(key)
    }

    async fn build_report(&self, date: NaiveDate) -> Result<EodReport, LedgerError> {
        let window = ReportWindow::day(date);
        let transport = self.mutations.transport();

        let transactions: Vec<PosTransaction> =
            load_once(transport, window_query("timestamp", &window)).await?;
        let cash_counts: Vec<CashCount> =
            load_once(transport, window_query("timestamp", &window)).await?;
        // Full history up to the day, for the beginning balance.
        let safe_counts: Vec<SafeCount> = load_once(
            transport,
            LedgerQuery::ordered_by("timestamp").end_at(end_of_day_iso(date)),
        )
        .await?;

        Ok(build_eod_report(date, &transactions, &cash_counts, &safe_counts))
    }

    async fn evaluate(&self) -> Result<EodChecklist, LedgerError> {
        let today = self.mutations.clock().today();
        let window = ReportWindow::day(today);
        let transport = self.mutations.transport();

        let shifts: Vec<TillShift> = load_once(transport, window_query("openedAt", &window)).await?;
        let safe_counts: Vec<SafeCount> =
            load_once(transport, window_query("timestamp", &window)).await?;

        let key = date_key(today);
        let closure = match transport.fetch(EodClosure::COLLECTION, &key).await {
            Ok(Some(value)) => Some(parse_record::<EodClosure>(&key, &value).map_err(|issues| {
                LedgerError::Invalid {
                    label: EodClosure::LABEL,
                    issues,
                }
            })?),
            Ok(None) => None,
            Err(err) => return Err(LedgerError::Transport(err.to_string())),
        };

        Ok(EodChecklist::evaluate(
            today,
            &shifts,
            &safe_counts,
            closure.as_ref(),
        ))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use crate::error::MutationError;
    use crate::mutations::tests::service;
    use crate::mutations::{CashCountDraft, SafeCountDraft};
    use crate::notify::ToastKind;
    use std::sync::Arc;
    use till_core::{Amount, CashCountType, SafeCountType};
    use till_db::{Database, DbConfig};

    fn manager() -> Option<User> {
        Some(User::new("uid-giulia", "giulia").with_role("manager"))
    }

    #[tokio::test]
    async fn test_staff_do_not_see_checklist() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let (mutations, _) = service(db.clone(), Some(User::new("uid-anna", "anna")));
        let view = EodView::new(mutations);

        assert_eq!(view.checklist().await.unwrap(), None);
        assert_eq!(
            view.confirm().await,
            Err(MutationError::Rejected(MANAGEMENT_ONLY.to_string()))
        );
    }

    #[tokio::test]
    async fn test_report_for_managers_only() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let (mutations, _) = service(db.clone(), manager());
        mutations
            .add_cash_count(
                CashCountType::Opening,
                CashCountDraft {
                    count: Some(Amount::new(100.0)),
                    keycard_count: Some(4),
                    ..CashCountDraft::default()
                },
            )
            .await
            .unwrap();
        mutations.record_float_entry(Amount::new(20.0), None).await.unwrap();
        mutations
            .add_safe_count(
                SafeCountType::SafeReconcile,
                SafeCountDraft {
                    count: Some(Amount::new(500.0)),
                    difference: Some(Amount::zero()),
                    ..SafeCountDraft::default()
                },
            )
            .await
            .unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();

        let report = EodView::new(mutations).report(today).await.unwrap().unwrap();
        assert_eq!(report.opening_cash, Amount::new(100.0));
        assert_eq!(report.float_total, Amount::new(20.0));
        assert_eq!(report.expected_cash, Amount::new(120.0));
        assert_eq!(report.cash_variance, Amount::new(-120.0));
        assert_eq!(report.opening_keycards, 4);
        assert_eq!(report.beginning_safe_balance, Amount::new(500.0));
        assert_eq!(report.ending_safe_balance, Amount::new(500.0));
        assert!(!report.safe_variance_mismatch);

        let (staff, _) = service(db, Some(User::new("uid-anna", "anna")));
        assert_eq!(EodView::new(staff).report(today).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_till_blocks_confirmation() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let (mutations, _) = service(db.clone(), manager());
        mutations
            .record_shift_open("shift-1", Amount::new(100.0), 4)
            .await
            .unwrap();
        let view = EodView::new(mutations);

        let checklist = view.checklist().await.unwrap().unwrap();
        assert!(!checklist.till_done);
        assert!(!checklist.safe_done);
        assert!(!checklist.can_confirm());

        assert_eq!(
            view.confirm().await,
            Err(MutationError::Rejected(DAY_NOT_READY.to_string()))
        );
        assert_eq!(db.ledger().count("eodClosures").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_confirm_once_checks_pass() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let (mutations, toasts) = service(db.clone(), manager());
        mutations
            .add_safe_count(
                SafeCountType::SafeReconcile,
                SafeCountDraft {
                    count: Some(Amount::new(500.0)),
                    difference: Some(Amount::zero()),
                    ..SafeCountDraft::default()
                },
            )
            .await
            .unwrap();
        let view = EodView::new(mutations);

        assert!(view.checklist().await.unwrap().unwrap().can_confirm());
        let key = view.confirm().await.unwrap();
        assert_eq!(key.as_deref(), Some("2026-02-28"));
        assert_eq!(toasts.last().unwrap().kind, ToastKind::Success);

        let checklist = view.checklist().await.unwrap().unwrap();
        assert!(checklist.is_day_closed());
        assert_eq!(
            checklist.closure.map(|c| c.confirmed_by),
            Some("giulia".to_string())
        );
        assert_eq!(
            view.confirm().await,
            Err(MutationError::Rejected(DAY_ALREADY_CLOSED.to_string()))
        );
    }
}
