//! # Ledger Subscriptions
//!
//! A live, validated, sorted view of one ledger collection.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   loading ──snapshot ok──────► ready(records)                           │
//! │      │                            │                                     │
//! │      │                            ├── snapshot ok ──► ready(new records)│
//! │      │                            │                                     │
//! │      │                            ├── snapshot invalid ──► ready(SAME   │
//! │      │                            │       records) + error + toast      │
//! │      │                            │                                     │
//! │      └──transport error───────────┴── transport error ──► SAME records  │
//! │                                          + error, loading = false       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition is one `watch` publish, so readers never observe a
//! half-applied snapshot. Dropping the [`LedgerSubscription`] aborts its task.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use till_core::validation::{parse_snapshot, LedgerRecord};
use till_core::ValidationErrors;
use till_db::{DbError, LedgerQuery, LedgerTransport, Snapshot};

use crate::notify::Notifier;

// =============================================================================
// View State
// =============================================================================

/// Why the current view may be stale.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Invalid {label} data: {issues}")]
    Invalid {
        label: &'static str,
        issues: ValidationErrors,
    },

    #[error("{0}")]
    Transport(String),
}

/// What a subscriber sees.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerState<T> {
    /// Last accepted snapshot, sorted ascending.
    pub records: Vec<T>,
    pub loading: bool,
    pub error: Option<LedgerError>,
}

impl<T> Default for LedgerState<T> {
    fn default() -> Self {
        LedgerState {
            records: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

impl<T: LedgerRecord> LedgerState<T> {
    /// Replaces the view with `snapshot`, or keeps it and records the issues.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &Snapshot,
        order_by: Option<&str>,
    ) -> Result<(), ValidationErrors> {
        self.loading = false;
        match parse_snapshot::<T>(snapshot, order_by) {
            Ok(records) => {
                self.records = records;
                self.error = None;
                Ok(())
            }
            Err(issues) => {
                self.error = Some(LedgerError::Invalid {
                    label: T::LABEL,
                    issues: issues.clone(),
                });
                Err(issues)
            }
        }
    }

    /// Keeps the view and exposes the transport failure.
    pub fn apply_transport_error(&mut self, err: &DbError) {
        self.loading = false;
        self.error = Some(LedgerError::Transport(err.to_string()));
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Handle on one live collection view.
#[derive(Debug)]
pub struct LedgerSubscription<T> {
    state: watch::Receiver<LedgerState<T>>,
    task: JoinHandle<()>,
}

impl<T: LedgerRecord> LedgerSubscription<T> {
    /// Subscribes to `T`'s collection.
    pub fn start(
        transport: &dyn LedgerTransport,
        query: LedgerQuery,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let order_by = query.order_by_child.clone();
        let mut stream = transport.subscribe(T::COLLECTION, query);
        let (tx, rx) = watch::channel(LedgerState::<T>::default());

        let task = tokio::spawn(async move {
            debug!(collection = T::COLLECTION, "Subscription started");

            while let Some(result) = stream.recv().await {
                match result {
                    Ok(snapshot) => {
                        let mut outcome = Ok(());
                        tx.send_modify(|state| {
                            outcome = state.apply_snapshot(&snapshot, order_by.as_deref());
                        });
                        match outcome {
                            Ok(()) => debug!(
                                collection = T::COLLECTION,
                                records = snapshot.len(),
                                "Snapshot applied"
                            ),
                            Err(issues) => {
                                warn!(
                                    collection = T::COLLECTION,
                                    issues = issues.len(),
                                    "Rejected invalid snapshot, keeping previous view"
                                );
                                notifier.error(&format!("Invalid {} data: {}", T::LABEL, issues));
                            }
                        }
                    }
                    Err(err) => {
                        error!(collection = T::COLLECTION, error = %err, "Subscription read failed");
                        tx.send_modify(|state| state.apply_transport_error(&err));
                    }
                }
            }

            debug!(collection = T::COLLECTION, "Subscription ended");
        });

        LedgerSubscription { state: rx, task }
    }
}

impl<T: Clone> LedgerSubscription<T> {
    /// A copy of the current state.
    pub fn current(&self) -> LedgerState<T> {
        self.state.borrow().clone()
    }

    /// A copy of the current records.
    pub fn records(&self) -> Vec<T> {
        self.state.borrow().records.clone()
    }

    /// A receiver for code that awaits changes itself.
    pub fn watch(&self) -> watch::Receiver<LedgerState<T>> {
        self.state.clone()
    }

    /// Waits until the view has loaded (or failed to).
    pub async fn loaded(&mut self) -> LedgerState<T> {
        if let Ok(state) = self.state.wait_for(|state| !state.loading).await {
            return state.clone();
        }
        self.state.borrow().clone()
    }
}

impl<T> Drop for LedgerSubscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
