//! # Italy Time
//!
//! Ledger timestamps are Italy wall-clock time written with a literal
//! `+00:00` suffix, so lexical order equals chronological order for every
//! record written by the reception console.
//!
//! ```text
//!   now (UTC)               2026-02-28T12:00:00Z
//!   Italy wall clock        2026-02-28 13:00:00 (CET)
//!   ledger timestamp        2026-02-28T13:00:00.000+00:00
//!   business date           2026-02-28
//! ```
//!
//! Nothing here reads the clock; callers pass `now`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Europe::Rome;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Length of the default reporting window.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

const LEDGER_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f+00:00";

/// Italy-local ISO timestamp for a ledger record.
pub fn italy_iso_string(now: DateTime<Utc>) -> String {
    now.with_timezone(&Rome).format(LEDGER_FORMAT).to_string()
}

/// Italy business date of an instant.
pub fn italy_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Rome).date_naive()
}

/// `YYYY-MM-DD` for an Italy business date.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a `YYYY-MM-DD` business date.
pub fn parse_date_key(value: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| CoreError::InvalidDate(value.to_string()))
}

/// First instant of a business date in ledger form.
pub fn start_of_day_iso(date: NaiveDate) -> String {
    format!("{}T00:00:00.000+00:00", date_key(date))
}

/// Last instant of a business date in ledger form.
pub fn end_of_day_iso(date: NaiveDate) -> String {
    format!("{}T23:59:59.999+00:00", date_key(date))
}

/// True when a ledger timestamp falls on the given business date.
pub fn is_on_date(timestamp: &str, date: NaiveDate) -> bool {
    timestamp.starts_with(&date_key(date))
}

// =============================================================================
// Report Window
// =============================================================================

/// Inclusive `[start, end]` bounds used as `startAt` / `endAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReportWindow {
    pub start: String,
    pub end: String,
}

impl ReportWindow {
    /// Rolling window ending today: `[now − 30 days 00:00, now 23:59:59.999]`.
    pub fn default_for(now: DateTime<Utc>) -> Self {
        let start = italy_date(now - Duration::days(DEFAULT_WINDOW_DAYS));
        let end = italy_date(now);
        ReportWindow::between(start, end)
    }

    /// Whole business days from `start` to `end`.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        ReportWindow {
            start: start_of_day_iso(start),
            end: end_of_day_iso(end),
        }
    }

    /// A single business day.
    pub fn day(date: NaiveDate) -> Self {
        ReportWindow::between(date, date)
    }

    /// Explicit filter if given, default rolling window otherwise.
    ///
    /// Either bound may be omitted; the missing side comes from the default.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Self {
        let default = ReportWindow::default_for(now);
        ReportWindow {
            start: start.map(start_of_day_iso).unwrap_or(default.start),
            end: end.map(end_of_day_iso).unwrap_or(default.end),
        }
    }

    /// Lexical containment check on a ledger timestamp.
    pub fn contains(&self, timestamp: &str) -> bool {
        timestamp >= self.start.as_str() && timestamp <= self.end.as_str()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_default_window_bounds() {
        let window = ReportWindow::default_for(utc(2026, 2, 28, 12, 0));
        assert!(window.start.starts_with("2026-01-29T00:00:00"));
        assert!(window.end.starts_with("2026-02-28T23:59:59"));
    }

    #[test]
    fn test_italy_iso_string_uses_wall_clock() {
        // CET in winter, CEST in summer
        assert_eq!(italy_iso_string(utc(2026, 2, 28, 12, 0)), "2026-02-28T13:00:00.000+00:00");
        assert_eq!(italy_iso_string(utc(2026, 7, 1, 12, 0)), "2026-07-01T14:00:00.000+00:00");
    }

    #[test]
    fn test_italy_date_rolls_over_before_utc() {
        let late = utc(2026, 3, 1, 23, 30);
        assert_eq!(date_key(italy_date(late)), "2026-03-02");
    }

    #[test]
    fn test_explicit_window() {
        let start = parse_date_key("2024-01-01").unwrap();
        let end = parse_date_key("2024-01-31").unwrap();
        let window = ReportWindow::resolve(Some(start), Some(end), utc(2026, 2, 28, 12, 0));
        assert_eq!(window.start, "2024-01-01T00:00:00.000+00:00");
        assert_eq!(window.end, "2024-01-31T23:59:59.999+00:00");
    }

    #[test]
    fn test_window_contains() {
        let window = ReportWindow::day(parse_date_key("2024-01-02").unwrap());
        assert!(window.contains("2024-01-02T08:00:00.000+00:00"));
        assert!(!window.contains("2024-01-03T00:00:00.000+00:00"));
        assert!(!window.contains("2024-01-01T23:59:59.999+00:00"));
    }

    #[test]
    fn test_parse_date_key_rejects_garbage() {
        assert!(parse_date_key("yesterday").is_err());
    }
}
