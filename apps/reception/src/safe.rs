//! # Safe Workflow
//!
//! Moving cash between the drawer and the safe touches two ledgers, so each
//! action is a short sequence of writes. When a later write fails, the
//! earlier ones are undone by writing their opposite movement.
//!
//! ```text
//!   deposit     safe  deposit     ⇄ undo: safe withdrawal
//!               drawer removal    ⇄ undo: drawer float
//!
//!   withdrawal  safe  withdrawal  ⇄ undo: safe deposit
//!               drawer float      ⇄ undo: drawer removal
//!
//!   exchange    safe  exchange    ⇄ undo: swapped exchange
//!               drawer removal | float, by direction
//! ```
//!
//! The ledgers stay append-only: an undo is a new record, never a delete.

use tracing::{info, warn};

use till_core::shift::find_open_shift;
use till_core::{
    Amount, CashCount, DenomBreakdown, ExchangeDirection, SafeCountType, SafeDenomBreakdown,
};

use crate::error::MutationResult;
use crate::mutations::{MutationService, SafeCountDraft};

/// One reversible ledger write.
#[derive(Debug, Clone, PartialEq)]
enum Movement {
    SafeDeposit {
        amount: Amount,
        breakdown: DenomBreakdown,
        keycard_count: Option<u32>,
        keycard_difference: Option<i32>,
    },
    SafeWithdrawal {
        amount: Amount,
        breakdown: DenomBreakdown,
    },
    SafeExchange {
        incoming: DenomBreakdown,
        outgoing: DenomBreakdown,
        direction: ExchangeDirection,
        amount: Amount,
    },
    DrawerRemoval(Amount),
    DrawerFloat(Amount),
}

impl Movement {
    fn inverse(&self) -> Movement {
        match self {
            Movement::SafeDeposit {
                amount, breakdown, ..
            } => Movement::SafeWithdrawal {
                amount: *amount,
                breakdown: breakdown.clone(),
            },
            Movement::SafeWithdrawal { amount, breakdown } => Movement::SafeDeposit {
                amount: *amount,
                breakdown: breakdown.clone(),
                keycard_count: None,
                keycard_difference: None,
            },
            Movement::SafeExchange {
                incoming,
                outgoing,
                direction,
                amount,
            } => Movement::SafeExchange {
                incoming: outgoing.clone(),
                outgoing: incoming.clone(),
                direction: match direction {
                    ExchangeDirection::DrawerToSafe => ExchangeDirection::SafeToDrawer,
                    ExchangeDirection::SafeToDrawer => ExchangeDirection::DrawerToSafe,
                },
                amount: *amount,
            },
            Movement::DrawerRemoval(amount) => Movement::DrawerFloat(*amount),
            Movement::DrawerFloat(amount) => Movement::DrawerRemoval(*amount),
        }
    }
}

#[derive(Clone)]
pub struct SafeWorkflow {
    mutations: MutationService,
}

impl SafeWorkflow {
    pub fn new(mutations: MutationService) -> Self {
        SafeWorkflow { mutations }
    }

    /// Drawer → safe. Returns whether every write landed.
    pub async fn deposit(
        &self,
        cash_counts: &[CashCount],
        amount: Amount,
        breakdown: DenomBreakdown,
        keycard_count: Option<u32>,
        keycard_difference: Option<i32>,
    ) -> MutationResult<bool> {
        self.mutations.require_user()?;
        self.mutations.require_positive(amount)?;
        let steps = [
            Movement::SafeDeposit {
                amount,
                breakdown,
                keycard_count,
                keycard_difference,
            },
            Movement::DrawerRemoval(amount),
        ];
        self.run_all("deposit", drawer_shift(cash_counts), &steps).await
    }

    /// Safe → drawer.
    pub async fn withdraw(
        &self,
        cash_counts: &[CashCount],
        amount: Amount,
        breakdown: DenomBreakdown,
    ) -> MutationResult<bool> {
        self.mutations.require_user()?;
        self.mutations.require_positive(amount)?;
        let steps = [
            Movement::SafeWithdrawal { amount, breakdown },
            Movement::DrawerFloat(amount),
        ];
        self.run_all("withdrawal", drawer_shift(cash_counts), &steps).await
    }

    /// Swaps denominations; `amount` of cash changes side in `direction`.
    pub async fn exchange(
        &self,
        cash_counts: &[CashCount],
        incoming: DenomBreakdown,
        outgoing: DenomBreakdown,
        direction: ExchangeDirection,
        amount: Amount,
    ) -> MutationResult<bool> {
        self.mutations.require_user()?;
        self.mutations.require_positive(amount)?;
        let drawer = match direction {
            ExchangeDirection::DrawerToSafe => Movement::DrawerRemoval(amount),
            ExchangeDirection::SafeToDrawer => Movement::DrawerFloat(amount),
        };
        let steps = [
            Movement::SafeExchange {
                incoming,
                outgoing,
                direction,
                amount,
            },
            drawer,
        ];
        self.run_all("exchange", drawer_shift(cash_counts), &steps).await
    }

    /// Runs `steps` in order; on the first failure undoes the completed
    /// ones newest first.
    async fn run_all(
        &self,
        action: &str,
        shift_id: Option<String>,
        steps: &[Movement],
    ) -> MutationResult<bool> {
        let mut done: Vec<&Movement> = Vec::with_capacity(steps.len());

        for step in steps {
            let written = match self.apply(step, shift_id.clone()).await {
                Ok(written) => written,
                Err(err) => {
                    self.undo(action, &done, shift_id.clone()).await;
                    return Err(err);
                }
            };
            if !written {
                self.undo(action, &done, shift_id).await;
                self.mutations
                    .notifier()
                    .error(&format!("Failed to record {action}."));
                return Ok(false);
            }
            done.push(step);
        }

        info!(action, steps = steps.len(), "Safe movement recorded");
        Ok(true)
    }

    async fn undo(&self, action: &str, done: &[&Movement], shift_id: Option<String>) {
        for step in done.iter().rev() {
            let inverse = step.inverse();
            match self.apply(&inverse, shift_id.clone()).await {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    warn!(action, step = ?inverse, "Rollback write failed, ledgers need a manual fix");
                }
            }
        }
    }

    async fn apply(&self, step: &Movement, shift_id: Option<String>) -> MutationResult<bool> {
        let key = match step.clone() {
            Movement::SafeDeposit {
                amount,
                breakdown,
                keycard_count,
                keycard_difference,
            } => {
                self.mutations
                    .add_safe_count(
                        SafeCountType::Deposit,
                        SafeCountDraft {
                            amount: Some(amount),
                            denom_breakdown: Some(SafeDenomBreakdown::Flat(breakdown)),
                            keycard_count,
                            keycard_difference,
                            ..SafeCountDraft::default()
                        },
                    )
                    .await?
            }
            Movement::SafeWithdrawal { amount, breakdown } => {
                self.mutations
                    .add_safe_count(
                        SafeCountType::Withdrawal,
                        SafeCountDraft {
                            amount: Some(amount),
                            denom_breakdown: Some(SafeDenomBreakdown::Flat(breakdown)),
                            ..SafeCountDraft::default()
                        },
                    )
                    .await?
            }
            Movement::SafeExchange {
                incoming,
                outgoing,
                direction,
                amount,
            } => {
                self.mutations
                    .record_safe_exchange(incoming, outgoing, direction, amount)
                    .await?
            }
            Movement::DrawerRemoval(amount) => {
                self.mutations.record_tender_removal(amount, shift_id).await?
            }
            Movement::DrawerFloat(amount) => {
                self.mutations.record_float_entry(amount, shift_id).await?
            }
        };
        Ok(key.is_some())
    }
}

fn drawer_shift(cash_counts: &[CashCount]) -> Option<String> {
    find_open_shift(cash_counts).and_then(|opening| opening.shift_id.clone())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use crate::error::MutationError;
    use crate::mutations::tests::{service, RecordingTransport};
    use std::sync::Arc;
    use till_core::safe::safe_balance;
    use till_core::validation::parse_snapshot;
    use till_core::{CashCountType, SafeCount};
    use till_db::{Database, DbConfig, LedgerQuery};

    fn anna() -> Option<User> {
        Some(User::new("uid-anna", "anna"))
    }

    fn notes(label: &str, n: u32) -> DenomBreakdown {
        DenomBreakdown::from([(label.to_string(), n)])
    }

    fn open_drawer() -> Vec<CashCount> {
        let mut opening = CashCount::new("anna", "2026-02-28T08:00:00.000+00:00", CashCountType::Opening);
        opening.count = Some(Amount::new(200.0));
        opening.shift_id = Some("shift-1".to_string());
        vec![opening]
    }

    #[tokio::test]
    async fn test_deposit_writes_safe_then_drawer() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let (mutations, _) = service(db.clone(), anna());
        let safe = SafeWorkflow::new(mutations);

        let ok = safe
            .deposit(&open_drawer(), Amount::new(100.0), notes("50", 2), None, None)
            .await
            .unwrap();
        assert!(ok);

        let snapshot = db.ledger().list("safeCounts", &LedgerQuery::all()).await.unwrap();
        let safe_counts: Vec<SafeCount> = parse_snapshot(&snapshot, None).unwrap();
        assert_eq!(safe_balance(&safe_counts), Amount::new(100.0));

        let snapshot = db.ledger().list("cashCounts", &LedgerQuery::all()).await.unwrap();
        let drawer: Vec<CashCount> = parse_snapshot(&snapshot, None).unwrap();
        assert_eq!(drawer.len(), 1);
        assert_eq!(drawer[0].kind, CashCountType::TenderRemoval);
        assert_eq!(drawer[0].shift_id.as_deref(), Some("shift-1"));
    }

    #[tokio::test]
    async fn test_failed_drawer_write_rolls_back_safe() {
        let transport = Arc::new(RecordingTransport::failing_on(1));
        let (mutations, toasts) = service(transport.clone(), anna());
        let safe = SafeWorkflow::new(mutations);

        let ok = safe
            .deposit(&open_drawer(), Amount::new(100.0), notes("50", 2), None, None)
            .await
            .unwrap();
        assert!(!ok);

        let writes = transport.writes();
        let kinds: Vec<(&str, &str)> = writes
            .iter()
            .map(|(_, path, _, value)| (path.as_str(), value["type"].as_str().unwrap_or("")))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("safeCounts", "deposit"),
                ("cashCounts", "tenderRemoval"),
                ("safeCounts", "withdrawal"),
            ]
        );
        assert_eq!(toasts.last().unwrap().message, "Failed to record deposit.");
    }

    #[tokio::test]
    async fn test_withdrawal_adds_float() {
        let transport = Arc::new(RecordingTransport::default());
        let (mutations, _) = service(transport.clone(), anna());
        let safe = SafeWorkflow::new(mutations);

        assert!(safe.withdraw(&[], Amount::new(40.0), notes("20", 2)).await.unwrap());

        let writes = transport.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].3["type"], "withdrawal");
        assert_eq!(writes[1].3["type"], "float");
        assert!(writes[1].3.get("shiftId").is_none());
    }

    #[tokio::test]
    async fn test_exchange_rollback_swaps_sides() {
        let transport = Arc::new(RecordingTransport::failing_on(1));
        let (mutations, toasts) = service(transport.clone(), anna());
        let safe = SafeWorkflow::new(mutations);

        let ok = safe
            .exchange(
                &[],
                notes("50", 1),
                notes("10", 5),
                ExchangeDirection::SafeToDrawer,
                Amount::new(50.0),
            )
            .await
            .unwrap();
        assert!(!ok);

        let writes = transport.writes();
        assert_eq!(writes.len(), 3);
        let undo = &writes[2].3;
        assert_eq!(undo["direction"], "drawerToSafe");
        assert_eq!(undo["denomBreakdown"]["incoming"]["10"], 5);
        assert_eq!(undo["denomBreakdown"]["outgoing"]["50"], 1);
        assert_eq!(toasts.last().unwrap().message, "Failed to record exchange.");
    }

    #[tokio::test]
    async fn test_refuses_before_any_write() {
        let transport = Arc::new(RecordingTransport::default());
        let (mutations, _) = service(transport.clone(), None);
        let safe = SafeWorkflow::new(mutations.clone());

        let result = safe.deposit(&[], Amount::new(10.0), notes("10", 1), None, None).await;
        assert_eq!(result, Err(MutationError::Unauthenticated));

        let (mutations, _) = service(transport.clone(), anna());
        let safe = SafeWorkflow::new(mutations);
        let result = safe.withdraw(&[], Amount::zero(), DenomBreakdown::new()).await;
        assert!(matches!(result, Err(MutationError::Invalid { .. })));

        assert!(transport.writes().is_empty());
    }
}
