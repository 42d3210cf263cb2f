//! # Shift History
//!
//! The "Recent Shifts" report: closed and open shifts in a date window, with
//! a denomination drill-down for every shift that ended with a variance.
//!
//! ## Drill-down Rule
//! ```text
//!   closeDifference absent or exactly 0 ──► plain row, no detail
//!   closeDifference ≠ 0 ──► last close/reconcile cash count with the same
//!                           shiftId and a denomBreakdown
//!                             ├── found, some count > 0 ──► breakdown lines
//!                             └── otherwise ──► "No denomination data recorded."
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Amount;
use crate::types::{CashCount, DenomBreakdown, TillShift};

pub const NO_DENOMINATION_DATA: &str = "No denomination data recorded.";
pub const NO_MATCHING_SHIFTS: &str = "No shifts match the current filter.";
pub const NO_SHIFTS_IN_RANGE: &str = "No shift history in this date range.";

// =============================================================================
// Denominations
// =============================================================================

/// A euro note or coin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Denomination {
    pub label: &'static str,
    pub value: f64,
    /// Key used in `denomBreakdown` maps.
    pub key: &'static str,
}

/// Euro notes and coins, largest first.
pub const DENOMINATIONS: [Denomination; 15] = [
    Denomination { label: "€500", value: 500.0, key: "500" },
    Denomination { label: "€200", value: 200.0, key: "200" },
    Denomination { label: "€100", value: 100.0, key: "100" },
    Denomination { label: "€50", value: 50.0, key: "50" },
    Denomination { label: "€20", value: 20.0, key: "20" },
    Denomination { label: "€10", value: 10.0, key: "10" },
    Denomination { label: "€5", value: 5.0, key: "5" },
    Denomination { label: "€2", value: 2.0, key: "2" },
    Denomination { label: "€1", value: 1.0, key: "1" },
    Denomination { label: "50c", value: 0.5, key: "0.5" },
    Denomination { label: "20c", value: 0.2, key: "0.2" },
    Denomination { label: "10c", value: 0.1, key: "0.1" },
    Denomination { label: "5c", value: 0.05, key: "0.05" },
    Denomination { label: "2c", value: 0.02, key: "0.02" },
    Denomination { label: "1c", value: 0.01, key: "0.01" },
];

/// One non-empty line of a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DenominationLine {
    pub label: String,
    pub count: u32,
    pub total: Amount,
}

/// Lines for every catalogue denomination with a non-zero count.
pub fn breakdown_lines(breakdown: &DenomBreakdown) -> Vec<DenominationLine> {
    DENOMINATIONS
        .iter()
        .filter_map(|denom| {
            let count = breakdown.get(denom.key).copied().unwrap_or(0);
            (count > 0).then(|| DenominationLine {
                label: denom.label.to_string(),
                count,
                total: Amount::new(f64::from(count) * denom.value).round_cents(),
            })
        })
        .collect()
}

/// Cash value of a breakdown (catalogue denominations only).
pub fn breakdown_total(breakdown: &DenomBreakdown) -> Amount {
    breakdown_lines(breakdown).iter().map(|line| line.total).sum()
}

// =============================================================================
// Report
// =============================================================================

/// Drill-down content for a shift with a variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export)]
pub enum ShiftDetail {
    Breakdown { lines: Vec<DenominationLine> },
    NoData { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShiftHistoryRow {
    pub shift: TillShift,
    /// `+€2.00` / `€-1.00`, or `-` when the shift has not closed.
    pub variance_label: String,
    /// `None` means the row is not expandable.
    pub detail: Option<ShiftDetail>,
}

impl ShiftHistoryRow {
    pub fn is_expandable(&self) -> bool {
        self.detail.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShiftHistory {
    pub rows: Vec<ShiftHistoryRow>,
    /// Shown instead of the table when `rows` is empty.
    pub empty_message: Option<String>,
}

/// Case-insensitive substring match on opener or closer. Blank matches all.
pub fn matches_staff(shift: &TillShift, filter: &str) -> bool {
    let needle = filter.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    std::iter::once(shift.opened_by.as_str())
        .chain(shift.closed_by.as_deref())
        .any(|name| name.to_lowercase().contains(&needle))
}

/// Last close/reconcile count for `shift_id` that recorded denominations.
pub fn latest_denomination_count<'a>(
    cash_counts: &'a [CashCount],
    shift_id: &str,
) -> Option<&'a CashCount> {
    cash_counts
        .iter()
        .filter(|count| {
            count.shift_id.as_deref() == Some(shift_id)
                && count.kind.ends_shift()
                && count.denom_breakdown.is_some()
        })
        .last()
}

fn detail_for(shift: &TillShift, cash_counts: &[CashCount]) -> Option<ShiftDetail> {
    let difference = shift.close_difference?;
    if difference.is_zero() {
        return None;
    }

    let lines = latest_denomination_count(cash_counts, &shift.shift_id)
        .and_then(|count| count.denom_breakdown.as_ref())
        .map(breakdown_lines)
        .unwrap_or_default();

    Some(if lines.is_empty() {
        ShiftDetail::NoData {
            message: NO_DENOMINATION_DATA.to_string(),
        }
    } else {
        ShiftDetail::Breakdown { lines }
    })
}

/// Builds the report from the (already windowed, sorted) shift view.
pub fn build_shift_history(
    shifts: &[TillShift],
    cash_counts: &[CashCount],
    staff_filter: &str,
) -> ShiftHistory {
    let rows: Vec<ShiftHistoryRow> = shifts
        .iter()
        .filter(|shift| matches_staff(shift, staff_filter))
        .map(|shift| ShiftHistoryRow {
            variance_label: shift
                .close_difference
                .map(|difference| difference.signed_label())
                .unwrap_or_else(|| "-".to_string()),
            detail: detail_for(shift, cash_counts),
            shift: shift.clone(),
        })
        .collect();

    let empty_message = match (rows.is_empty(), shifts.is_empty()) {
        (false, _) => None,
        (true, false) => Some(NO_MATCHING_SHIFTS.to_string()),
        (true, true) => Some(NO_SHIFTS_IN_RANGE.to_string()),
    };

    ShiftHistory {
        rows,
        empty_message,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CashCountType, CloseType, ShiftStatus};
    use std::collections::BTreeMap;

    fn closed_shift(id: &str, opened_by: &str, closed_by: &str, difference: f64) -> TillShift {
        let mut shift = TillShift::opened(id, "2024-01-01T08:00", opened_by, Amount::new(100.0), 4);
        shift.status = ShiftStatus::Closed;
        shift.closed_at = Some("2024-01-01T16:00".to_string());
        shift.closed_by = Some(closed_by.to_string());
        shift.closing_cash = Some(Amount::new(100.0 + difference));
        shift.closing_keycards = Some(4);
        shift.close_difference = Some(Amount::new(difference));
        shift.close_type = Some(CloseType::Close);
        shift
    }

    fn close_count(shift_id: &str, timestamp: &str, breakdown: &[(&str, u32)]) -> CashCount {
        let mut count = CashCount::new("anna", timestamp, CashCountType::Close);
        count.shift_id = Some(shift_id.to_string());
        count.denom_breakdown = Some(
            breakdown
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        );
        count
    }

    #[test]
    fn test_zero_difference_is_not_expandable() {
        let history = build_shift_history(&[closed_shift("s1", "anna", "anna", 0.0)], &[], "");
        assert!(!history.rows[0].is_expandable());
        assert_eq!(history.rows[0].variance_label, "+€0.00");
    }

    #[test]
    fn test_open_shift_is_not_expandable() {
        let open = TillShift::opened("s1", "2024-01-01T08:00", "anna", Amount::new(100.0), 4);
        let history = build_shift_history(&[open], &[], "");
        assert!(!history.rows[0].is_expandable());
        assert_eq!(history.rows[0].variance_label, "-");
    }

    #[test]
    fn test_variance_uses_latest_matching_breakdown() {
        let shifts = [closed_shift("s1", "anna", "anna", -1.0)];
        let counts = [
            close_count("s1", "2024-01-01T15:00", &[("50", 1)]),
            close_count("s2", "2024-01-01T15:30", &[("500", 1)]),
            close_count("s1", "2024-01-01T16:00", &[("20", 2), ("0.5", 3), ("10", 0)]),
        ];

        let history = build_shift_history(&shifts, &counts, "");
        let row = &history.rows[0];
        assert_eq!(row.variance_label, "€-1.00");

        let Some(ShiftDetail::Breakdown { lines }) = &row.detail else {
            panic!("expected breakdown detail");
        };
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].label, "€20");
        assert_eq!(lines[0].total, Amount::new(40.0));
        assert_eq!(lines[1].label, "50c");
        assert_eq!(lines[1].total, Amount::new(1.5));
    }

    #[test]
    fn test_variance_without_breakdown_shows_message() {
        let shifts = [closed_shift("s1", "anna", "anna", 2.0)];
        let history = build_shift_history(&shifts, &[], "");
        assert_eq!(
            history.rows[0].detail,
            Some(ShiftDetail::NoData {
                message: NO_DENOMINATION_DATA.to_string()
            })
        );
    }

    #[test]
    fn test_staff_filter_is_case_insensitive() {
        let shifts = [
            closed_shift("s1", "Anna", "Marco", 0.0),
            closed_shift("s2", "Luca", "Luca", 0.0),
        ];
        let history = build_shift_history(&shifts, &[], "marc");
        assert_eq!(history.rows.len(), 1);
        assert_eq!(history.rows[0].shift.shift_id, "s1");
    }

    #[test]
    fn test_empty_messages() {
        let shifts = [closed_shift("s1", "anna", "anna", 0.0)];
        assert_eq!(
            build_shift_history(&shifts, &[], "zzz").empty_message.as_deref(),
            Some(NO_MATCHING_SHIFTS)
        );
        assert_eq!(
            build_shift_history(&[], &[], "").empty_message.as_deref(),
            Some(NO_SHIFTS_IN_RANGE)
        );
    }

    #[test]
    fn test_breakdown_total() {
        let breakdown: DenomBreakdown = [("50".to_string(), 2), ("0.2".to_string(), 5)].into_iter().collect();
        assert_eq!(breakdown_total(&breakdown), Amount::new(101.0));
    }
}
