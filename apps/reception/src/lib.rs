//! # Reception Console Backend
//!
//! Orchestration for the reception till: live ledger views, validated
//! writes, the reconciliation workbench and end-of-day confirmation.
//!
//! ## Module Organization
//! ```text
//! reception/
//! ├── lib.rs           ◄─── You are here (Reception context, tracing)
//! ├── config.rs        ◄─── Environment configuration
//! ├── auth.rs          ◄─── Signed-in user and roles
//! ├── clock.rs         ◄─── Injected clock (Italy-local timestamps)
//! ├── notify.rs        ◄─── Toast side channel
//! ├── error.rs         ◄─── MutationError + frontend payload
//! ├── subscription.rs  ◄─── Live, validated, sorted ledger views
//! ├── mutations.rs     ◄─── One validated write per call
//! ├── till.rs          ◄─── Open / close / reconcile the drawer
//! ├── safe.rs          ◄─── Drawer ⇄ safe movements with rollback
//! ├── workbench.rs     ◄─── Reconciliation feed and variance reports
//! ├── eod.rs           ◄─── End-of-day checklist and confirmation
//! └── cms_api.rs       ◄─── CMS REST client
//! ```
//!
//! ## Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Reception                                      │
//! │                                                                         │
//! │  Arc<dyn LedgerTransport> ─┬─► MutationService ─┬─► TillWorkflow        │
//! │  Arc<Session>             ─┤                    ├─► SafeWorkflow        │
//! │  Arc<dyn Notifier>        ─┤                    └─► EodView             │
//! │  Arc<dyn Clock>           ─┘                                            │
//! │                            └─► LedgerSubscription / ReconciliationFeed  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod clock;
pub mod cms_api;
pub mod config;
pub mod eod;
pub mod error;
pub mod mutations;
pub mod notify;
pub mod safe;
pub mod subscription;
pub mod till;
pub mod workbench;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use till_core::time::ReportWindow;
use till_core::validation::LedgerRecord;
use till_db::{LedgerQuery, LedgerTransport};

pub use auth::{Session, User};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorCode, ErrorPayload, MutationError, MutationResult};
pub use mutations::MutationService;
pub use notify::{Notifier, Toast, ToastKind, ToastLog, TracingNotifier};
pub use subscription::{LedgerError, LedgerState, LedgerSubscription};

/// Everything a reception screen needs, built once per signed-in console.
#[derive(Clone)]
pub struct Reception {
    transport: Arc<dyn LedgerTransport>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    mutations: MutationService,
}

impl Reception {
    pub fn new(
        transport: Arc<dyn LedgerTransport>,
        session: Arc<Session>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mutations =
            MutationService::new(transport.clone(), session, notifier.clone(), clock.clone());
        Reception {
            transport,
            notifier,
            clock,
            mutations,
        }
    }

    pub fn transport(&self) -> &dyn LedgerTransport {
        self.transport.as_ref()
    }

    pub fn mutations(&self) -> &MutationService {
        &self.mutations
    }

    pub fn till(&self) -> till::TillWorkflow {
        till::TillWorkflow::new(self.mutations.clone())
    }

    pub fn safe(&self) -> safe::SafeWorkflow {
        safe::SafeWorkflow::new(self.mutations.clone())
    }

    pub fn eod(&self) -> eod::EodView {
        eod::EodView::new(self.mutations.clone())
    }

    /// Live view of `T`'s collection.
    pub fn subscribe<T: LedgerRecord>(&self, query: LedgerQuery) -> LedgerSubscription<T> {
        LedgerSubscription::start(self.transport.as_ref(), query, self.notifier.clone())
    }

    /// Live reconciliation table for today. Moves to the next business
    /// date on its own when the console stays open past midnight.
    pub fn reconciliation_feed(&self) -> workbench::ReconciliationFeed {
        workbench::ReconciliationFeed::follow_today(
            self.transport.clone(),
            self.clock.clone(),
            self.notifier.clone(),
            workbench::DAY_CHECK_INTERVAL,
        )
    }

    /// Default 30-day report window ending today.
    pub fn default_window(&self) -> ReportWindow {
        ReportWindow::default_for(self.clock.now())
    }
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reception=debug,till_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::tests::clock;
    use std::time::Duration;
    use till_core::{Amount, CashCount};
    use till_db::{Database, DbConfig};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_open_till_shows_up_in_live_view() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let reception = Reception::new(
            db,
            Arc::new(Session::signed_in(User::new("uid-anna", "anna"))),
            Arc::new(ToastLog::new()),
            clock(),
        );
        let counts = reception.subscribe::<CashCount>(LedgerQuery::ordered_by("timestamp"));

        reception
            .till()
            .open(
                &[],
                till::OpenTill {
                    counted: Amount::new(120.0),
                    keycards: 3,
                    denom_breakdown: None,
                },
            )
            .await
            .unwrap();

        let mut rx = counts.watch();
        let Ok(Ok(state)) =
            timeout(Duration::from_secs(5), rx.wait_for(|s| s.records.len() == 1)).await
        else {
            panic!("opening count never reached the view");
        };
        assert_eq!(state.records[0].count, Some(Amount::new(120.0)));
        assert_eq!(reception.default_window().end, "2026-02-28T23:59:59.999+00:00");
    }
}
