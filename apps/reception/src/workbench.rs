//! # Reconciliation Workbench
//!
//! Live reconciliation table plus the windowed variance reports.
//!
//! ## Feed Topology
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   transactions ──┐                                                      │
//! │   cashCounts ────┤   any watch      ┌───────────┐    watch::Sender      │
//! │   pmsPostings ───┼── changed() ────►│ reconcile │──► ReconciliationReport│
//! │   terminalBatches┘                  └───────────┘   (whole table)       │
//! │                                                                         │
//! │   InvalidData appears ──► one "Invalid reconciliation data" toast       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The report is recomputed from all four views on every change and
//! published in one send, so readers never see a half-updated table.
//!
//! A feed started with `follow_today` also polls its clock. When the
//! business date changes it drops the four views and restarts them on the
//! new day, so a console left open overnight shows the new day's till.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use till_core::heatmap::{build_heatmap, VarianceHeatmap};
use till_core::reconcile::{reconcile, ReconciliationInputs, ReconciliationReport};
use till_core::shift_history::{build_shift_history, ShiftHistory};
use till_core::time::ReportWindow;
use till_core::validation::{parse_snapshot, LedgerRecord};
use till_core::{CashCount, ManualPmsPosting, ManualTerminalBatch, PosTransaction, TillShift};
use till_db::{LedgerQuery, LedgerTransport};

use crate::clock::Clock;
use crate::notify::Notifier;
use crate::subscription::{LedgerError, LedgerState, LedgerSubscription};

pub const INVALID_RECONCILIATION_DATA: &str = "Invalid reconciliation data";

/// `orderByChild(child).startAt(window.start).endAt(window.end)`.
pub fn window_query(child: &str, window: &ReportWindow) -> LedgerQuery {
    LedgerQuery::ordered_by(child)
        .start_at(window.start.clone())
        .end_at(window.end.clone())
}

// =============================================================================
// Live Feed
// =============================================================================

/// How often a feed following today checks the clock for a new date.
pub const DAY_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Live reconciliation table over one report window.
pub struct ReconciliationFeed {
    report: watch::Receiver<ReconciliationReport>,
    task: JoinHandle<()>,
}

/// The four live views behind one window.
struct Sources {
    _subscriptions: (
        LedgerSubscription<PosTransaction>,
        LedgerSubscription<CashCount>,
        LedgerSubscription<ManualPmsPosting>,
        LedgerSubscription<ManualTerminalBatch>,
    ),
    sales: watch::Receiver<LedgerState<PosTransaction>>,
    drawer: watch::Receiver<LedgerState<CashCount>>,
    pms: watch::Receiver<LedgerState<ManualPmsPosting>>,
    terminal: watch::Receiver<LedgerState<ManualTerminalBatch>>,
}

impl Sources {
    fn start(
        transport: &dyn LedgerTransport,
        window: &ReportWindow,
        notifier: &Arc<dyn Notifier>,
    ) -> Self {
        let transactions = LedgerSubscription::<PosTransaction>::start(
            transport,
            window_query("timestamp", window),
            notifier.clone(),
        );
        let cash_counts = LedgerSubscription::<CashCount>::start(
            transport,
            window_query("timestamp", window),
            notifier.clone(),
        );
        let pms_postings = LedgerSubscription::<ManualPmsPosting>::start(
            transport,
            window_query("createdAt", window),
            notifier.clone(),
        );
        let terminal_batches = LedgerSubscription::<ManualTerminalBatch>::start(
            transport,
            window_query("createdAt", window),
            notifier.clone(),
        );

        Sources {
            sales: transactions.watch(),
            drawer: cash_counts.watch(),
            pms: pms_postings.watch(),
            terminal: terminal_batches.watch(),
            _subscriptions: (transactions, cash_counts, pms_postings, terminal_batches),
        }
    }

    fn compute(&mut self) -> ReconciliationReport {
        compute(
            &self.sales.borrow_and_update(),
            &self.drawer.borrow_and_update(),
            &self.pms.borrow_and_update(),
            &self.terminal.borrow_and_update(),
        )
    }

    async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        tokio::select! {
            r = self.sales.changed() => r,
            r = self.drawer.changed() => r,
            r = self.pms.changed() => r,
            r = self.terminal.changed() => r,
        }
    }
}

/// Re-resolves the window when the business date moves on.
struct DayRollover {
    transport: Arc<dyn LedgerTransport>,
    clock: Arc<dyn Clock>,
    day: NaiveDate,
    ticker: Interval,
}

impl DayRollover {
    /// Waits for the next check and returns the new date, if it changed.
    async fn next_day(&mut self) -> Option<NaiveDate> {
        self.ticker.tick().await;
        let today = self.clock.today();
        (today != self.day).then(|| {
            self.day = today;
            today
        })
    }
}

enum Wake {
    Changed,
    Closed,
    NewDay(NaiveDate),
    SameDay,
}

impl ReconciliationFeed {
    /// Feed over a fixed window.
    pub fn start(
        transport: &dyn LedgerTransport,
        window: &ReportWindow,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let sources = Sources::start(transport, window, &notifier);
        Self::spawn(sources, None, notifier)
    }

    /// Feed over the clock's business date, checked every `check_every`.
    /// After midnight the four views are restarted on the new day.
    pub fn follow_today(
        transport: Arc<dyn LedgerTransport>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        check_every: Duration,
    ) -> Self {
        let day = clock.today();
        let sources = Sources::start(transport.as_ref(), &ReportWindow::day(day), &notifier);
        let mut ticker = tokio::time::interval(check_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let rollover = DayRollover {
            transport,
            clock,
            day,
            ticker,
        };
        Self::spawn(sources, Some(rollover), notifier)
    }

    fn spawn(
        mut sources: Sources,
        mut rollover: Option<DayRollover>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (tx, rx) = watch::channel(ReconciliationReport::default());

        let task = tokio::spawn(async move {
            let mut flagged = false;

            loop {
                let report = sources.compute();

                let invalid = report.has_invalid_data();
                if invalid && !flagged {
                    warn!("Reconciliation inputs failed the sanity check, totals zeroed");
                    notifier.error(INVALID_RECONCILIATION_DATA);
                }
                flagged = invalid;

                debug!(balanced = report.is_fully_balanced(), "Reconciliation recomputed");
                tx.send_replace(report);

                loop {
                    let wake = tokio::select! {
                        r = sources.changed() => match r {
                            Ok(()) => Wake::Changed,
                            Err(_) => Wake::Closed,
                        },
                        day = next_day(rollover.as_mut()) => match day {
                            Some(day) => Wake::NewDay(day),
                            None => Wake::SameDay,
                        },
                    };

                    match wake {
                        Wake::Changed => break,
                        Wake::Closed => return,
                        Wake::SameDay => continue,
                        Wake::NewDay(day) => {
                            if let Some(rollover) = &rollover {
                                info!(%day, "Business date changed, reconciliation feed moves on");
                                sources = Sources::start(
                                    rollover.transport.as_ref(),
                                    &ReportWindow::day(day),
                                    &notifier,
                                );
                            }
                            break;
                        }
                    }
                }
            }
        });

        ReconciliationFeed { report: rx, task }
    }

    pub fn report(&self) -> ReconciliationReport {
        self.report.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ReconciliationReport> {
        self.report.clone()
    }
}

impl Drop for ReconciliationFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A fixed-window feed never rolls over.
async fn next_day(rollover: Option<&mut DayRollover>) -> Option<NaiveDate> {
    match rollover {
        Some(rollover) => rollover.next_day().await,
        None => std::future::pending().await,
    }
}

fn compute(
    sales: &LedgerState<PosTransaction>,
    drawer: &LedgerState<CashCount>,
    pms: &LedgerState<ManualPmsPosting>,
    terminal: &LedgerState<ManualTerminalBatch>,
) -> ReconciliationReport {
    reconcile(&ReconciliationInputs {
        transactions: &sales.records,
        cash_counts: &drawer.records,
        pms_postings: &pms.records,
        terminal_batches: &terminal.records,
        pms_loading: pms.loading,
        terminal_loading: terminal.loading,
    })
}

// =============================================================================
// One-shot Reports
// =============================================================================

/// First snapshot of `T`'s collection, validated and sorted.
pub async fn load_once<T: LedgerRecord>(
    transport: &dyn LedgerTransport,
    query: LedgerQuery,
) -> Result<Vec<T>, LedgerError> {
    let order_by = query.order_by_child.clone();
    let mut stream = transport.subscribe(T::COLLECTION, query);
    match stream.recv().await {
        Some(Ok(snapshot)) => parse_snapshot(&snapshot, order_by.as_deref()).map_err(|issues| {
            LedgerError::Invalid {
                label: T::LABEL,
                issues,
            }
        }),
        Some(Err(err)) => Err(LedgerError::Transport(err.to_string())),
        None => Err(LedgerError::Transport(format!(
            "{} subscription closed before its first snapshot",
            T::COLLECTION
        ))),
    }
}

/// Reconciliation table from one read of each source.
pub async fn reconciliation_report(
    transport: &dyn LedgerTransport,
    window: &ReportWindow,
) -> Result<ReconciliationReport, LedgerError> {
    let transactions: Vec<PosTransaction> =
        load_once(transport, window_query("timestamp", window)).await?;
    let cash_counts: Vec<CashCount> = load_once(transport, window_query("timestamp", window)).await?;
    let pms_postings: Vec<ManualPmsPosting> =
        load_once(transport, window_query("createdAt", window)).await?;
    let terminal_batches: Vec<ManualTerminalBatch> =
        load_once(transport, window_query("createdAt", window)).await?;

    Ok(reconcile(&ReconciliationInputs {
        transactions: &transactions,
        cash_counts: &cash_counts,
        pms_postings: &pms_postings,
        terminal_batches: &terminal_batches,
        pms_loading: false,
        terminal_loading: false,
    }))
}

/// Variance heat-map over close/reconcile counts in `window`.
pub async fn heatmap_report(
    transport: &dyn LedgerTransport,
    window: &ReportWindow,
) -> Result<VarianceHeatmap, LedgerError> {
    let counts: Vec<CashCount> = load_once(transport, window_query("timestamp", window)).await?;
    Ok(build_heatmap(&counts))
}

/// Shift history for shifts closed in `window`, filtered by staff name.
pub async fn shift_history_report(
    transport: &dyn LedgerTransport,
    window: &ReportWindow,
    staff_filter: &str,
) -> Result<ShiftHistory, LedgerError> {
    let shifts: Vec<TillShift> = load_once(transport, window_query("closedAt", window)).await?;
    let counts: Vec<CashCount> = load_once(transport, window_query("timestamp", window)).await?;
    Ok(build_shift_history(&shifts, &counts, staff_filter))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastLog;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use till_core::reconcile::{ReconciliationSource, ReconciliationWarning};
    use till_core::Amount;
    use till_db::{Database, DbConfig};
    use tokio::time::timeout;

    fn day() -> ReportWindow {
        ReportWindow::day(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap())
    }

    async fn wait_for(
        feed: &ReconciliationFeed,
        f: impl FnMut(&ReconciliationReport) -> bool,
    ) -> ReconciliationReport {
        let mut rx = feed.watch();
        let Ok(Ok(report)) = timeout(Duration::from_secs(5), rx.wait_for(f)).await else {
            panic!("report never reached the expected state");
        };
        report.clone()
    }

    #[tokio::test]
    async fn test_feed_recomputes_on_every_source() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let toasts = Arc::new(ToastLog::new());
        let feed = ReconciliationFeed::start(&db, &day(), toasts.clone());

        db.append(
            "transactions",
            json!({"method": "CASH", "amount": 50.0, "timestamp": "2026-02-28T10:00:00.000+00:00"}),
        )
        .await
        .unwrap();
        db.append(
            "cashCounts",
            json!({"user": "anna", "timestamp": "2026-02-28T18:00:00.000+00:00", "type": "close", "count": 50.0, "difference": 0.0}),
        )
        .await
        .unwrap();
        db.append(
            "pmsPostings",
            json!({"amount": 50.0, "method": "CASH", "createdAt": "2026-02-28T18:05:00.000+00:00", "createdBy": "anna"}),
        )
        .await
        .unwrap();

        let report = wait_for(&feed, |r| {
            r.totals.pos_cash == Amount::new(50.0)
                && r.totals.drawer == Amount::new(50.0)
                && r.totals.pms_cash == Amount::new(50.0)
                && r.warnings.contains(&ReconciliationWarning::MissingTerminalBatch)
        })
        .await;
        let drawer = report.row(ReconciliationSource::CashDrawer).unwrap();
        assert!(drawer.cash_delta.as_ref().unwrap().is_balanced());
        assert!(!report.has_invalid_data());
        assert!(toasts.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_followed_feed_moves_to_the_new_day() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap()));
        db.append(
            "transactions",
            json!({"method": "CASH", "amount": 40.0, "timestamp": "2026-02-28T22:30:00.000+00:00"}),
        )
        .await
        .unwrap();
        db.append(
            "transactions",
            json!({"method": "CASH", "amount": 25.0, "timestamp": "2026-03-01T00:45:00.000+00:00"}),
        )
        .await
        .unwrap();

        let toasts = Arc::new(ToastLog::new());
        let pinned = ReconciliationFeed::start(db.as_ref(), &day(), toasts.clone());
        let followed = ReconciliationFeed::follow_today(
            db.clone(),
            clock.clone(),
            toasts.clone(),
            Duration::from_millis(20),
        );
        wait_for(&followed, |r| r.totals.pos_cash == Amount::new(40.0)).await;
        wait_for(&pinned, |r| r.totals.pos_cash == Amount::new(40.0)).await;

        // 01:00 in Italy on the 1st.
        clock.advance(chrono::Duration::hours(12));
        let report = wait_for(&followed, |r| r.totals.pos_cash == Amount::new(25.0)).await;

        assert!(!report.has_invalid_data());
        assert_eq!(pinned.report().totals.pos_cash, Amount::new(40.0));
        assert!(toasts.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_window_excludes_other_days() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.append(
            "transactions",
            json!({"method": "CC", "amount": 30.0, "timestamp": "2026-02-27T10:00:00.000+00:00"}),
        )
        .await
        .unwrap();
        db.append(
            "terminalBatches",
            json!({"amount": 30.0, "createdAt": "2026-02-28T09:00:00.000+00:00", "createdBy": "anna"}),
        )
        .await
        .unwrap();

        let feed = ReconciliationFeed::start(&db, &day(), Arc::new(ToastLog::new()));
        let report = wait_for(&feed, |r| {
            r.totals.terminal == Amount::new(30.0)
                && r.warnings.contains(&ReconciliationWarning::MissingPmsPostings)
        })
        .await;

        assert_eq!(report.totals.pos_cc, Amount::zero());
        assert!(!report.is_fully_balanced());
    }

    #[tokio::test]
    async fn test_one_shot_report_flags_missing_sources() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.append(
            "transactions",
            json!({"method": "CC", "amount": 12.5, "timestamp": "2026-02-28T10:00:00.000+00:00"}),
        )
        .await
        .unwrap();

        let report = reconciliation_report(&db, &day()).await.unwrap();

        assert_eq!(report.totals.pos_cc, Amount::new(12.5));
        assert_eq!(
            report.warnings,
            vec![
                ReconciliationWarning::MissingPmsPostings,
                ReconciliationWarning::MissingTerminalBatch,
            ]
        );
    }

    #[tokio::test]
    async fn test_heatmap_report_reads_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (ts, diff) in [
            ("2024-01-02T18:00:00.000+00:00", 2.0),
            ("2024-01-01T18:00:00.000+00:00", -1.0),
            ("2023-12-01T18:00:00.000+00:00", 9.0),
        ] {
            db.append(
                "cashCounts",
                json!({"user": "anna", "timestamp": ts, "type": "close", "count": 100.0, "difference": diff}),
            )
            .await
            .unwrap();
        }
        let window = ReportWindow::between(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );

        let heatmap = heatmap_report(&db, &window).await.unwrap();

        assert_eq!(heatmap.columns.len(), 2);
        assert!(heatmap.columns[0].timestamp.starts_with("2024-01-01"));
        let row = heatmap.row("anna").unwrap();
        assert_eq!(row.cells[0].as_ref().unwrap().label, "-1.00");
    }

    #[tokio::test]
    async fn test_invalid_collection_fails_report() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.append(
            "tillShifts",
            json!({"shiftId": "s1", "status": "open", "closedAt": "2024-01-05T10:00:00.000+00:00"}),
        )
        .await
        .unwrap();
        let window = ReportWindow::day(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());

        let result = shift_history_report(&db, &window, "").await;

        assert!(matches!(result, Err(LedgerError::Invalid { label: "till shift", .. })));
    }

    #[tokio::test]
    async fn test_empty_window_has_message() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let history = shift_history_report(&db, &day(), "anna").await.unwrap();
        assert!(history.rows.is_empty());
        assert_eq!(
            history.empty_message.as_deref(),
            Some(till_core::shift_history::NO_SHIFTS_IN_RANGE)
        );
    }
}
