//! # Variance Heat-map
//!
//! One row per user, one column per shift-end count, cells shaded by how far
//! the drawer was off.
//!
//! ```text
//!              2024-01-01   2024-01-02   2024-01-03
//!   anna         -1.00          ·          +0.40
//!   marco          ·          +7.20          ·
//!
//!   |d| < 1 → Low     |d| < 5 → Medium     otherwise → High
//! ```
//!
//! Columns are `close` and `reconcile` cash counts that carry a `difference`,
//! in chronological order. Rows follow the order users first appear.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Amount;
use crate::types::CashCount;

pub const LOW_VARIANCE_LIMIT: f64 = 1.0;
pub const MEDIUM_VARIANCE_LIMIT: f64 = 5.0;

/// Colour bucket for one variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Buckets the absolute variance: `< 1` low, `< 5` medium, else high.
    pub fn of(difference: Amount) -> Self {
        let magnitude = difference.abs().value();
        if magnitude < LOW_VARIANCE_LIMIT {
            Severity::Low
        } else if magnitude < MEDIUM_VARIANCE_LIMIT {
            Severity::Medium
        } else {
            Severity::High
        }
    }
}

/// A shift-end event shown as one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HeatmapColumn {
    pub timestamp: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HeatmapCell {
    pub difference: Amount,
    /// Two-decimal figure, e.g. `-1.00`.
    pub label: String,
    pub severity: Severity,
}

impl HeatmapCell {
    pub fn new(difference: Amount) -> Self {
        HeatmapCell {
            difference,
            label: difference.fixed(),
            severity: Severity::of(difference),
        }
    }
}

/// One user's row; `cells[i]` lines up with `columns[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HeatmapRow {
    pub user: String,
    pub cells: Vec<Option<HeatmapCell>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VarianceHeatmap {
    pub columns: Vec<HeatmapColumn>,
    pub rows: Vec<HeatmapRow>,
}

impl VarianceHeatmap {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn row(&self, user: &str) -> Option<&HeatmapRow> {
        self.rows.iter().find(|row| row.user == user)
    }
}

/// Builds the heat-map from cash counts in any order.
pub fn build_heatmap(cash_counts: &[CashCount]) -> VarianceHeatmap {
    let mut events: Vec<(&CashCount, Amount)> = cash_counts
        .iter()
        .filter(|count| count.kind.ends_shift())
        .filter_map(|count| count.difference.map(|difference| (count, difference)))
        .collect();
    events.sort_by(|(a, _), (b, _)| a.timestamp.cmp(&b.timestamp));

    let mut users: Vec<&str> = Vec::new();
    for (count, _) in &events {
        if !users.contains(&count.user.as_str()) {
            users.push(&count.user);
        }
    }

    let columns = events
        .iter()
        .map(|(count, _)| HeatmapColumn {
            timestamp: count.timestamp.clone(),
            user: count.user.clone(),
        })
        .collect();

    let rows = users
        .iter()
        .map(|user| HeatmapRow {
            user: user.to_string(),
            cells: events
                .iter()
                .map(|(count, difference)| {
                    (count.user == *user).then(|| HeatmapCell::new(*difference))
                })
                .collect(),
        })
        .collect();

    VarianceHeatmap { columns, rows }
}

// =============================================================================
// Unit Tests
// =============================================================================
