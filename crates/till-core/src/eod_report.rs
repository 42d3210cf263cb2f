//! # End-of-Day Report
//!
//! The figures a manager reviews before confirming the day closed: sales by
//! method, every safe movement by kind, and three variances.
//!
//! ```text
//!   cash      expected = opening + POS cash + floats − tender removals
//!             variance = closing − expected
//!
//!   keycards  expected = opening + safe in − safe out + reconcile adjustment
//!             variance = closing − expected
//!
//!   safe      variance = ending balance − beginning balance
//!             expected = deposits + bank withdrawals
//!                        − withdrawals − bank deposits − petty cash
//! ```
//!
//! Exchanges move cash through the drawer as a float or tender removal, so
//! they reach the cash variance through those entries. The report lists them
//! on their own and checks that drawer → safe cash (deposits plus exchanges)
//! matches the tender removed from the drawer.
//!
//! Every input slice is a ledger view sorted ascending by timestamp. Sales
//! and cash counts may cover any range; only `date` is used. Safe counts
//! must include the history before `date` for the beginning balance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Amount;
use crate::reconcile::{reconcile, ReconciliationInputs};
use crate::safe::apply_safe_event;
use crate::time::{date_key, end_of_day_iso, is_on_date, start_of_day_iso};
use crate::types::{
    CashCount, CashCountType, ExchangeDirection, PosTransaction, SafeCount, SafeCountType,
};

// =============================================================================
// Report Types
// =============================================================================

/// POS sales on the day, by method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DayTotals {
    pub cash: Amount,
    pub cc: Amount,
}

/// One kind of safe movement with its total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SafeTable {
    pub rows: Vec<SafeCount>,
    pub total: Amount,
}

impl SafeTable {
    fn push(&mut self, count: &SafeCount) {
        self.total += count.amount.unwrap_or_default();
        self.rows.push(count.clone());
    }

    fn keycards(&self) -> i32 {
        self.rows.iter().map(|c| keycards(c.keycard_count)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EodReport {
    pub date: String,
    pub totals: DayTotals,

    pub bank_deposits: SafeTable,
    pub bank_withdrawals: SafeTable,
    pub deposits: SafeTable,
    pub withdrawals: SafeTable,
    pub petty_withdrawals: SafeTable,
    pub drawer_to_safe_exchanges: SafeTable,
    pub safe_to_drawer_exchanges: SafeTable,
    pub safe_reconciles: Vec<SafeCount>,
    pub safe_resets: Vec<SafeCount>,
    /// Sum of the `difference` recorded by today's safe reconciles.
    pub reconciles_total: Amount,

    pub opening_cash: Amount,
    pub closing_cash: Amount,
    pub float_total: Amount,
    pub tender_removal_total: Amount,
    pub expected_cash: Amount,
    pub cash_variance: Amount,

    pub opening_keycards: i32,
    pub safe_keycard_inflows: i32,
    pub safe_keycard_outflows: i32,
    pub keycard_reconcile_adjustment: i32,
    pub expected_keycards: i32,
    pub closing_keycards: i32,
    pub keycard_variance: i32,

    pub beginning_safe_balance: Amount,
    pub ending_safe_balance: Amount,
    pub expected_safe_variance: Amount,
    pub safe_variance: Amount,
    pub safe_variance_mismatch: bool,
    /// Deposits plus drawer → safe exchanges differ from tender removals.
    pub safe_inflows_mismatch: bool,
}

impl EodReport {
    pub fn is_cash_balanced(&self) -> bool {
        self.cash_variance.is_negligible()
    }

    pub fn is_keycard_balanced(&self) -> bool {
        self.keycard_variance == 0
    }

    /// No variance and no mismatch anywhere.
    pub fn is_clean(&self) -> bool {
        self.is_cash_balanced()
            && self.is_keycard_balanced()
            && !self.safe_variance_mismatch
            && !self.safe_inflows_mismatch
    }
}

fn keycards(count: Option<u32>) -> i32 {
    count.map_or(0, |n| i32::try_from(n).unwrap_or(i32::MAX))
}

fn is_safe_anchor(kind: SafeCountType) -> bool {
    matches!(
        kind,
        SafeCountType::Opening | SafeCountType::SafeReset | SafeCountType::SafeReconcile
    )
}

// =============================================================================
// Drawer
// =============================================================================

#[derive(Default)]
struct DrawerDay {
    opening_cash: Option<Amount>,
    closing_cash: Option<Amount>,
    float_total: Amount,
    tender_removal_total: Amount,
    opening_keycards: Option<u32>,
    closing_keycards: Option<u32>,
}

fn drawer_day<'a>(counts: impl Iterator<Item = &'a CashCount>) -> DrawerDay {
    let mut day = DrawerDay::default();
    for count in counts {
        match count.kind {
            CashCountType::Opening => {
                if day.opening_cash.is_none() {
                    day.opening_cash = count.count;
                }
                if day.opening_keycards.is_none() {
                    day.opening_keycards = count.keycard_count;
                }
            }
            CashCountType::Close => {
                day.closing_cash = count.count.or(day.closing_cash);
                day.closing_keycards = count.keycard_count.or(day.closing_keycards);
            }
            CashCountType::Float => day.float_total += count.amount.unwrap_or_default(),
            CashCountType::TenderRemoval => {
                day.tender_removal_total += count.amount.unwrap_or_default()
            }
            CashCountType::Reconcile => {}
        }
    }
    day
}

// =============================================================================
// Safe
// =============================================================================

#[derive(Default)]
struct SafeDay {
    bank_deposits: SafeTable,
    bank_withdrawals: SafeTable,
    deposits: SafeTable,
    withdrawals: SafeTable,
    petty_withdrawals: SafeTable,
    drawer_to_safe: SafeTable,
    safe_to_drawer: SafeTable,
    reconciles: Vec<SafeCount>,
    resets: Vec<SafeCount>,
    opening_keycards: Option<u32>,
    closing_keycards: Option<u32>,
}

fn safe_day<'a>(counts: impl Iterator<Item = &'a SafeCount>) -> SafeDay {
    let mut day = SafeDay::default();
    for count in counts {
        if is_safe_anchor(count.kind) && count.keycard_count.is_some() {
            if day.opening_keycards.is_none() {
                day.opening_keycards = count.keycard_count;
            }
            day.closing_keycards = count.keycard_count;
        }
        match count.kind {
            SafeCountType::BankDeposit => day.bank_deposits.push(count),
            SafeCountType::BankWithdrawal => day.bank_withdrawals.push(count),
            SafeCountType::Deposit => day.deposits.push(count),
            SafeCountType::Withdrawal => day.withdrawals.push(count),
            SafeCountType::PettyWithdrawal => day.petty_withdrawals.push(count),
            SafeCountType::Exchange => match count.direction {
                Some(ExchangeDirection::DrawerToSafe) => day.drawer_to_safe.push(count),
                Some(ExchangeDirection::SafeToDrawer) => day.safe_to_drawer.push(count),
                None => {}
            },
            SafeCountType::SafeReconcile => day.reconciles.push(count.clone()),
            SafeCountType::SafeReset => day.resets.push(count.clone()),
            SafeCountType::Opening => {}
        }
    }
    day
}

/// Balance at the start of `date`.
///
/// Events before the day decide it. Without any history the first counted
/// anchor of the day (opening, reset or reconcile) stands in.
fn beginning_balance(safe_counts: &[SafeCount], date: NaiveDate) -> Amount {
    let start = start_of_day_iso(date);
    let mut prior = safe_counts
        .iter()
        .filter(|c| c.timestamp.as_str() < start.as_str())
        .peekable();
    if prior.peek().is_some() {
        return prior.fold(Amount::zero(), apply_safe_event).round_cents();
    }
    safe_counts
        .iter()
        .filter(|c| is_on_date(&c.timestamp, date) && is_safe_anchor(c.kind))
        .find_map(|c| c.count)
        .unwrap_or_default()
}

fn ending_balance(safe_counts: &[SafeCount], date: NaiveDate) -> Amount {
    let end = end_of_day_iso(date);
    safe_counts
        .iter()
        .filter(|c| c.timestamp.as_str() <= end.as_str())
        .fold(Amount::zero(), apply_safe_event)
        .round_cents()
}

// =============================================================================
// Build
// =============================================================================

/// Builds the report for `date`.
pub fn build_eod_report(
    date: NaiveDate,
    transactions: &[PosTransaction],
    cash_counts: &[CashCount],
    safe_counts: &[SafeCount],
) -> EodReport {
    let todays_sales: Vec<PosTransaction> = transactions
        .iter()
        .filter(|t| is_on_date(&t.timestamp, date))
        .cloned()
        .collect();
    let sales = reconcile(&ReconciliationInputs {
        transactions: &todays_sales,
        ..ReconciliationInputs::default()
    });
    let totals = DayTotals {
        cash: sales.totals.pos_cash,
        cc: sales.totals.pos_cc,
    };

    let drawer = drawer_day(cash_counts.iter().filter(|c| is_on_date(&c.timestamp, date)));
    let safe = safe_day(safe_counts.iter().filter(|c| is_on_date(&c.timestamp, date)));

    // Cash
    let opening_cash = drawer.opening_cash.unwrap_or_default();
    let closing_cash = drawer.closing_cash.unwrap_or_default();
    let expected_cash =
        (opening_cash + totals.cash + drawer.float_total - drawer.tender_removal_total).round_cents();
    let cash_variance = (closing_cash - expected_cash).round_cents();

    // Keycards
    let opening_keycards = keycards(drawer.opening_keycards) + keycards(safe.opening_keycards);
    let closing_keycards = keycards(drawer.closing_keycards) + keycards(safe.closing_keycards);
    let safe_keycard_inflows = safe.deposits.keycards() + safe.drawer_to_safe.keycards();
    let safe_keycard_outflows = safe.withdrawals.keycards() + safe.safe_to_drawer.keycards();
    let keycard_reconcile_adjustment: i32 = safe
        .reconciles
        .iter()
        .chain(&safe.resets)
        .map(|c| c.keycard_difference.unwrap_or(0))
        .sum();
    let expected_keycards =
        opening_keycards + safe_keycard_inflows - safe_keycard_outflows + keycard_reconcile_adjustment;

    // Safe
    let beginning_safe_balance = beginning_balance(safe_counts, date);
    let ending_safe_balance = ending_balance(safe_counts, date);
    let safe_variance = (ending_safe_balance - beginning_safe_balance).round_cents();
    let expected_safe_variance = (safe.deposits.total + safe.bank_withdrawals.total
        - safe.withdrawals.total
        - safe.bank_deposits.total
        - safe.petty_withdrawals.total)
        .round_cents();
    let drawer_inflows = safe.deposits.total + safe.drawer_to_safe.total;

    EodReport {
        date: date_key(date),
        totals,
        reconciles_total: safe
            .reconciles
            .iter()
            .map(|c| c.difference.unwrap_or_default())
            .sum::<Amount>()
            .round_cents(),
        bank_deposits: safe.bank_deposits,
        bank_withdrawals: safe.bank_withdrawals,
        deposits: safe.deposits,
        withdrawals: safe.withdrawals,
        petty_withdrawals: safe.petty_withdrawals,
        drawer_to_safe_exchanges: safe.drawer_to_safe,
        safe_to_drawer_exchanges: safe.safe_to_drawer,
        safe_reconciles: safe.reconciles,
        safe_resets: safe.resets,
        opening_cash,
        closing_cash,
        float_total: drawer.float_total.round_cents(),
        tender_removal_total: drawer.tender_removal_total.round_cents(),
        expected_cash,
        cash_variance,
        opening_keycards,
        safe_keycard_inflows,
        safe_keycard_outflows,
        keycard_reconcile_adjustment,
        expected_keycards,
        closing_keycards,
        keycard_variance: closing_keycards - expected_keycards,
        beginning_safe_balance,
        ending_safe_balance,
        expected_safe_variance,
        safe_variance,
        safe_variance_mismatch: !(safe_variance - expected_safe_variance).is_negligible(),
        safe_inflows_mismatch: !(drawer_inflows - drawer.tender_removal_total).is_negligible(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
    }

    fn at(time: &str) -> String {
        format!("2026-02-28T{time}:00.000+00:00")
    }

    fn sale(method: PaymentMethod, amount: f64, timestamp: String) -> PosTransaction {
        PosTransaction {
            method,
            amount: Amount::new(amount),
            timestamp,
            user: Some("anna".to_string()),
        }
    }

    fn drawer(kind: CashCountType, time: &str, count: Option<f64>, amount: Option<f64>) -> CashCount {
        let mut c = CashCount::new("anna", at(time), kind);
        c.count = count.map(Amount::new);
        c.amount = amount.map(Amount::new);
        c
    }

    fn safe(kind: SafeCountType, timestamp: String, count: Option<f64>, amount: Option<f64>) -> SafeCount {
        let mut s = SafeCount::new("anna", timestamp, kind);
        s.count = count.map(Amount::new);
        s.amount = amount.map(Amount::new);
        s
    }

    fn exchange(direction: ExchangeDirection, time: &str, amount: f64) -> SafeCount {
        let mut s = safe(SafeCountType::Exchange, at(time), None, Some(amount));
        s.direction = Some(direction);
        s
    }

    #[test]
    fn test_cash_variance() {
        let sales = vec![
            sale(PaymentMethod::Cash, 999.0, "2026-02-27T18:00:00.000+00:00".to_string()),
            sale(PaymentMethod::Cash, 50.0, at("10:00")),
            sale(PaymentMethod::Cc, 30.0, at("11:00")),
        ];
        let counts = vec![
            drawer(CashCountType::Opening, "08:00", Some(100.0), None),
            drawer(CashCountType::Float, "12:00", None, Some(20.0)),
            drawer(CashCountType::TenderRemoval, "15:00", None, Some(40.0)),
            drawer(CashCountType::Close, "20:00", Some(131.0), None),
        ];

        let report = build_eod_report(day(), &sales, &counts, &[]);
        assert_eq!(report.totals, DayTotals { cash: Amount::new(50.0), cc: Amount::new(30.0) });
        assert_eq!(report.opening_cash, Amount::new(100.0));
        assert_eq!(report.float_total, Amount::new(20.0));
        assert_eq!(report.tender_removal_total, Amount::new(40.0));
        assert_eq!(report.expected_cash, Amount::new(130.0));
        assert_eq!(report.cash_variance, Amount::new(1.0));
        assert!(!report.is_cash_balanced());
    }

    #[test]
    fn test_missing_close_counts_as_zero() {
        let counts = vec![drawer(CashCountType::Opening, "08:00", Some(80.0), None)];
        let report = build_eod_report(day(), &[], &counts, &[]);
        assert_eq!(report.closing_cash, Amount::zero());
        assert_eq!(report.cash_variance, Amount::new(-80.0));
    }

    #[test]
    fn test_exchanges_flow_through_drawer_entries() {
        let counts = vec![
            drawer(CashCountType::Opening, "08:00", Some(100.0), None),
            drawer(CashCountType::TenderRemoval, "12:00", None, Some(40.0)),
            drawer(CashCountType::TenderRemoval, "13:00", None, Some(25.0)),
            drawer(CashCountType::Float, "14:00", None, Some(10.0)),
            drawer(CashCountType::Close, "20:00", Some(45.0), None),
        ];
        let safe_counts = vec![
            safe(SafeCountType::Deposit, at("12:00"), None, Some(40.0)),
            exchange(ExchangeDirection::DrawerToSafe, "13:00", 25.0),
            exchange(ExchangeDirection::SafeToDrawer, "14:00", 10.0),
        ];

        let report = build_eod_report(day(), &[], &counts, &safe_counts);
        assert_eq!(report.drawer_to_safe_exchanges.total, Amount::new(25.0));
        assert_eq!(report.safe_to_drawer_exchanges.total, Amount::new(10.0));
        assert_eq!(report.expected_cash, Amount::new(45.0));
        assert!(report.is_cash_balanced());
        assert!(!report.safe_inflows_mismatch);

        let without_removal: Vec<CashCount> = counts
            .iter()
            .filter(|c| c.amount != Some(Amount::new(25.0)))
            .cloned()
            .collect();
        let report = build_eod_report(day(), &[], &without_removal, &safe_counts);
        assert!(report.safe_inflows_mismatch);
    }

    #[test]
    fn test_safe_variance() {
        let mut reconcile = safe(SafeCountType::SafeReconcile, at("21:00"), Some(695.0), None);
        reconcile.difference = Some(Amount::new(5.0));
        let safe_counts = vec![
            safe(SafeCountType::Opening, "2026-02-27T08:00:00.000+00:00".to_string(), Some(1000.0), None),
            safe(SafeCountType::Deposit, at("12:00"), None, Some(200.0)),
            safe(SafeCountType::BankDeposit, at("15:00"), None, Some(500.0)),
            safe(SafeCountType::PettyWithdrawal, at("16:00"), None, Some(10.0)),
            reconcile,
        ];

        let report = build_eod_report(day(), &[], &[], &safe_counts);
        assert_eq!(report.beginning_safe_balance, Amount::new(1000.0));
        assert_eq!(report.ending_safe_balance, Amount::new(695.0));
        assert_eq!(report.safe_variance, Amount::new(-305.0));
        assert_eq!(report.expected_safe_variance, Amount::new(-310.0));
        assert!(report.safe_variance_mismatch);
        assert_eq!(report.reconciles_total, Amount::new(5.0));
        assert_eq!(report.bank_deposits.rows.len(), 1);
        assert_eq!(report.petty_withdrawals.total, Amount::new(10.0));
    }

    #[test]
    fn test_safe_balanced_when_reconcile_matches_flows() {
        let safe_counts = vec![
            safe(SafeCountType::Opening, "2026-02-27T08:00:00.000+00:00".to_string(), Some(1000.0), None),
            safe(SafeCountType::BankWithdrawal, at("09:00"), None, Some(50.0)),
            safe(SafeCountType::Withdrawal, at("10:00"), None, Some(30.0)),
            safe(SafeCountType::SafeReconcile, at("21:00"), Some(1020.0), None),
            safe(SafeCountType::Deposit, "2026-03-01T08:00:00.000+00:00".to_string(), None, Some(99.0)),
        ];

        let report = build_eod_report(day(), &[], &[], &safe_counts);
        assert_eq!(report.ending_safe_balance, Amount::new(1020.0));
        assert_eq!(report.safe_variance, Amount::new(20.0));
        assert!(!report.safe_variance_mismatch);
    }

    #[test]
    fn test_first_day_begins_at_opening_count() {
        let safe_counts = vec![safe(SafeCountType::Opening, at("08:00"), Some(500.0), None)];
        let report = build_eod_report(day(), &[], &[], &safe_counts);
        assert_eq!(report.beginning_safe_balance, Amount::new(500.0));
        assert_eq!(report.safe_variance, Amount::zero());
        assert!(!report.safe_variance_mismatch);
    }

    #[test]
    fn test_keycard_variance() {
        let mut opening = drawer(CashCountType::Opening, "08:00", Some(100.0), None);
        opening.keycard_count = Some(4);
        let mut close = drawer(CashCountType::Close, "20:00", Some(100.0), None);
        close.keycard_count = Some(3);

        let mut safe_open = safe(SafeCountType::Opening, at("07:00"), Some(0.0), None);
        safe_open.keycard_count = Some(20);
        let mut deposit = safe(SafeCountType::Deposit, at("12:00"), None, Some(10.0));
        deposit.keycard_count = Some(2);
        let mut withdrawal = safe(SafeCountType::Withdrawal, at("13:00"), None, Some(10.0));
        withdrawal.keycard_count = Some(1);
        let mut reconcile = safe(SafeCountType::SafeReconcile, at("21:00"), Some(0.0), None);
        reconcile.keycard_count = Some(20);
        reconcile.keycard_difference = Some(-1);

        let report = build_eod_report(
            day(),
            &[],
            &[opening, close],
            &[safe_open, deposit, withdrawal, reconcile],
        );
        assert_eq!(report.opening_keycards, 24);
        assert_eq!(report.safe_keycard_inflows, 2);
        assert_eq!(report.safe_keycard_outflows, 1);
        assert_eq!(report.keycard_reconcile_adjustment, -1);
        assert_eq!(report.expected_keycards, 24);
        assert_eq!(report.closing_keycards, 23);
        assert_eq!(report.keycard_variance, -1);
        assert!(!report.is_keycard_balanced());
    }

    #[test]
    fn test_quiet_day_is_clean() {
        let report = build_eod_report(day(), &[], &[], &[]);
        assert_eq!(report.date, "2026-02-28");
        assert!(report.is_clean());
    }
}
