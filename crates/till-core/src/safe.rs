//! # Safe Balance
//!
//! Running balance over the safe ledger.
//!
//! | Type                                          | Effect            |
//! |-----------------------------------------------|-------------------|
//! | `opening`, `safeReset`, `safeReconcile`       | balance = `count` |
//! | `deposit`, `bankWithdrawal`                   | balance += amount |
//! | `withdrawal`, `bankDeposit`, `pettyWithdrawal`| balance −= amount |
//! | `exchange`                                    | unchanged         |

use crate::money::Amount;
use crate::time::is_on_date;
use crate::types::{SafeCount, SafeCountType};
use chrono::NaiveDate;

/// Applies one safe event to a running balance.
pub fn apply_safe_event(balance: Amount, event: &SafeCount) -> Amount {
    let amount = event.amount.unwrap_or_default();
    match event.kind {
        SafeCountType::Opening | SafeCountType::SafeReset | SafeCountType::SafeReconcile => {
            event.count.unwrap_or(balance)
        }
        SafeCountType::Deposit | SafeCountType::BankWithdrawal => balance + amount,
        SafeCountType::Withdrawal | SafeCountType::BankDeposit | SafeCountType::PettyWithdrawal => {
            balance - amount
        }
        SafeCountType::Exchange => balance,
    }
}

/// Balance after every event in `safe_counts` (sorted ascending).
pub fn safe_balance(safe_counts: &[SafeCount]) -> Amount {
    safe_counts
        .iter()
        .fold(Amount::zero(), apply_safe_event)
        .round_cents()
}

/// Whether the safe was reconciled on the given business date.
pub fn safe_reconciled_on(safe_counts: &[SafeCount], date: NaiveDate) -> bool {
    safe_counts
        .iter()
        .any(|count| count.kind == SafeCountType::SafeReconcile && is_on_date(&count.timestamp, date))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: SafeCountType, count: Option<f64>, amount: Option<f64>) -> SafeCount {
        let mut e = SafeCount::new("anna", "2024-01-01T10:00:00.000+00:00", kind);
        e.count = count.map(Amount::new);
        e.amount = amount.map(Amount::new);
        e
    }

    #[test]
    fn test_running_balance() {
        let events = vec![
            event(SafeCountType::Opening, Some(1000.0), None),
            event(SafeCountType::Deposit, None, Some(200.0)),
            event(SafeCountType::BankDeposit, None, Some(500.0)),
            event(SafeCountType::PettyWithdrawal, None, Some(12.5)),
            event(SafeCountType::Exchange, None, Some(50.0)),
            event(SafeCountType::BankWithdrawal, None, Some(100.0)),
            event(SafeCountType::Withdrawal, None, Some(40.0)),
        ];
        assert_eq!(safe_balance(&events), Amount::new(747.5));
    }

    #[test]
    fn test_reconcile_resets_balance() {
        let events = vec![
            event(SafeCountType::Opening, Some(1000.0), None),
            event(SafeCountType::Deposit, None, Some(200.0)),
            event(SafeCountType::SafeReconcile, Some(1190.0), None),
        ];
        assert_eq!(safe_balance(&events), Amount::new(1190.0));
    }

    #[test]
    fn test_reset_without_count_keeps_balance() {
        let events = vec![
            event(SafeCountType::Opening, Some(300.0), None),
            event(SafeCountType::SafeReset, None, None),
        ];
        assert_eq!(safe_balance(&events), Amount::new(300.0));
    }

    #[test]
    fn test_reconciled_on_date() {
        let events = vec![event(SafeCountType::SafeReconcile, Some(10.0), None)];
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(safe_reconciled_on(&events, day));
        assert!(!safe_reconciled_on(&events, next));
    }
}
