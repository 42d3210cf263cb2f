//! # Drawer Shift Helpers
//!
//! Reads the cash-count ledger to answer "is the till open?", "what did the
//! last shift close with?" and "how much cash should be in the drawer?".
//!
//! ```text
//!   cashCounts (sorted)
//!   ───────────────────────────────────────────────────────────────────
//!   opening 100 ─ float +20 ─ tenderRemoval −50 ─ [POS cash +35]  ─ close
//!   │                                                               │
//!   └── expected at close = 100 + 20 − 50 + 35 = 105 ───────────────┘
//! ```

use crate::money::Amount;
use crate::types::{CashCount, CashCountType, PaymentMethod, PosTransaction};

/// The `opening` that has not been followed by a close or reconcile.
///
/// A reconcile is immediately followed by a fresh opening, so it never
/// leaves the till open on its own.
pub fn find_open_shift(cash_counts: &[CashCount]) -> Option<&CashCount> {
    cash_counts
        .iter()
        .rev()
        .find(|count| count.kind == CashCountType::Opening || count.kind.ends_shift())
        .filter(|count| count.kind == CashCountType::Opening)
}

/// Most recent close or reconcile count.
pub fn last_close(cash_counts: &[CashCount]) -> Option<&CashCount> {
    cash_counts.iter().rev().find(|count| count.kind.ends_shift())
}

/// `counted − expected`, rounded to cents. Negative means the drawer is short.
///
/// ## Example
/// ```rust
/// use till_core::money::Amount;
/// use till_core::shift::calculate_discrepancy;
///
/// let diff = calculate_discrepancy(Amount::new(99.9), Amount::new(100.0));
/// assert_eq!(diff, Amount::new(-0.1));
/// ```
pub fn calculate_discrepancy(counted: Amount, expected: Amount) -> Amount {
    (counted - expected).round_cents()
}

/// Cash the drawer should hold for the shift opened by `opening`.
///
/// Opening count, plus floats added, minus tender removed, plus POS cash
/// sales, all from the opening timestamp onwards.
pub fn expected_drawer_cash(
    opening: &CashCount,
    cash_counts: &[CashCount],
    transactions: &[PosTransaction],
) -> Amount {
    let since = opening.timestamp.as_str();
    let start = opening.count.unwrap_or_default();

    let movements: Amount = cash_counts
        .iter()
        .filter(|count| count.timestamp.as_str() >= since)
        .map(|count| match count.kind {
            CashCountType::Float => count.amount.unwrap_or_default(),
            CashCountType::TenderRemoval => -count.amount.unwrap_or_default(),
            _ => Amount::zero(),
        })
        .sum();

    let sales: Amount = transactions
        .iter()
        .filter(|t| t.method == PaymentMethod::Cash && t.timestamp.as_str() >= since)
        .map(|t| t.amount)
        .sum();

    (start + movements + sales).round_cents()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: CashCountType, timestamp: &str) -> CashCount {
        CashCount::new("anna", timestamp, kind)
    }

    #[test]
    fn test_open_shift_detection() {
        let mut counts = vec![event(CashCountType::Opening, "2024-01-01T08:00")];
        assert!(find_open_shift(&counts).is_some());

        counts.push(event(CashCountType::Float, "2024-01-01T09:00"));
        assert!(find_open_shift(&counts).is_some());

        counts.push(event(CashCountType::Close, "2024-01-01T16:00"));
        assert!(find_open_shift(&counts).is_none());

        counts.push(event(CashCountType::Opening, "2024-01-02T08:00"));
        counts.push(event(CashCountType::Reconcile, "2024-01-02T12:00"));
        assert!(find_open_shift(&counts).is_none());
        counts.push(event(CashCountType::Opening, "2024-01-02T12:00"));
        assert_eq!(find_open_shift(&counts).unwrap().timestamp, "2024-01-02T12:00");
    }

    #[test]
    fn test_no_counts_means_closed() {
        assert!(find_open_shift(&[]).is_none());
        assert!(last_close(&[]).is_none());
    }

    #[test]
    fn test_last_close() {
        let mut close = event(CashCountType::Close, "2024-01-01T16:00");
        close.count = Some(Amount::new(250.0));
        let counts = vec![
            event(CashCountType::Reconcile, "2024-01-01T12:00"),
            close,
            event(CashCountType::Opening, "2024-01-02T08:00"),
        ];
        assert_eq!(last_close(&counts).unwrap().count, Some(Amount::new(250.0)));
    }

    #[test]
    fn test_expected_drawer_cash() {
        let mut opening = event(CashCountType::Opening, "2024-01-01T08:00");
        opening.count = Some(Amount::new(100.0));
        let mut float = event(CashCountType::Float, "2024-01-01T09:00");
        float.amount = Some(Amount::new(20.0));
        let mut removal = event(CashCountType::TenderRemoval, "2024-01-01T10:00");
        removal.amount = Some(Amount::new(50.0));
        let mut earlier = event(CashCountType::Float, "2023-12-31T09:00");
        earlier.amount = Some(Amount::new(999.0));

        let counts = vec![earlier, opening.clone(), float, removal];
        let transactions = vec![
            PosTransaction {
                method: PaymentMethod::Cash,
                amount: Amount::new(35.0),
                timestamp: "2024-01-01T11:00".to_string(),
                user: None,
            },
            PosTransaction {
                method: PaymentMethod::Cc,
                amount: Amount::new(80.0),
                timestamp: "2024-01-01T11:30".to_string(),
                user: None,
            },
        ];

        assert_eq!(expected_drawer_cash(&opening, &counts, &transactions), Amount::new(105.0));
    }
}
