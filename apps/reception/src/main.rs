//! # till-report
//!
//! Prints today's reconciliation table, the variance heat-map and the shift
//! history from the reception ledger store.
//!
//! ```text
//! till-report [--from YYYY-MM-DD] [--to YYYY-MM-DD] [--staff NAME]
//! ```
//!
//! Reads `RECEPTION_DB_PATH` and the rest of the reception environment;
//! invalid configuration exits with status 1.

use std::process::ExitCode;

use chrono::NaiveDate;
use tracing::{error, info};

use reception::config::ReceptionConfig;
use reception::workbench::{heatmap_report, reconciliation_report, shift_history_report};
use reception::{init_tracing, Clock, LedgerError, SystemClock};
use till_core::heatmap::VarianceHeatmap;
use till_core::reconcile::{Delta, ReconciliationReport};
use till_core::shift_history::{ShiftDetail, ShiftHistory};
use till_core::time::{parse_date_key, ReportWindow};
use till_core::Amount;
use till_db::{Database, DbConfig, LedgerTransport};

#[derive(Debug, Default)]
struct Args {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    staff: String,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(flag) = args.next() {
        let Some(value) = args.next() else {
            return Err(format!("{flag} needs a value"));
        };
        match flag.as_str() {
            "--from" => parsed.from = Some(parse_date_key(&value).map_err(|e| e.to_string())?),
            "--to" => parsed.to = Some(parse_date_key(&value).map_err(|e| e.to_string())?),
            "--staff" => parsed.staff = value,
            other => return Err(format!("unknown argument {other}")),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("usage: till-report [--from YYYY-MM-DD] [--to YYYY-MM-DD] [--staff NAME]");
            return ExitCode::from(2);
        }
    };

    // Issues are already logged one per line.
    let Ok(config) = ReceptionConfig::load() else {
        return ExitCode::FAILURE;
    };
    info!(db_path = ?config.database_path, env = ?config.node_env, "Configuration loaded");

    let db = match Database::new(DbConfig::new(config.database_path.clone())).await {
        Ok(db) => db,
        Err(err) => {
            error!(error = %err, "Failed to open ledger store");
            return ExitCode::FAILURE;
        }
    };

    let result = print_reports(&db, &args).await;
    db.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Report failed");
            ExitCode::FAILURE
        }
    }
}

async fn print_reports(transport: &dyn LedgerTransport, args: &Args) -> Result<(), LedgerError> {
    let clock = SystemClock;
    let today = clock.today();

    let report = reconciliation_report(transport, &ReportWindow::day(today)).await?;
    println!("Reconciliation for {today}");
    print_reconciliation(&report);

    let window = ReportWindow::resolve(args.from, args.to, clock.now());
    println!();
    println!("Variance heat-map {} .. {}", window.start, window.end);
    print_heatmap(&heatmap_report(transport, &window).await?);

    println!();
    println!("Shift history");
    print_history(&shift_history_report(transport, &window, &args.staff).await?);
    Ok(())
}

fn cell(amount: Option<Amount>) -> String {
    amount.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
}

fn delta(delta: Option<&Delta>) -> String {
    match delta {
        Some(d) if d.is_balanced() => format!("{} ok", d.amount),
        Some(d) => format!("{} !!", d.amount),
        None => "-".to_string(),
    }
}

fn print_reconciliation(report: &ReconciliationReport) {
    println!(
        "{:<16} {:>12} {:>12} {:>14} {:>14}",
        "Source", "Cash", "CC", "Cash Δ", "CC Δ"
    );
    for row in &report.rows {
        println!(
            "{:<16} {:>12} {:>12} {:>14} {:>14}",
            row.source.label(),
            cell(row.cash),
            cell(row.cc),
            delta(row.cash_delta.as_ref()),
            delta(row.cc_delta.as_ref()),
        );
    }
    for warning in &report.warnings {
        println!("! {warning}");
    }
}

fn print_heatmap(heatmap: &VarianceHeatmap) {
    if heatmap.is_empty() {
        println!("No close or reconcile counts in this range.");
        return;
    }
    let header: Vec<String> = heatmap
        .columns
        .iter()
        .map(|c| format!("{:>8}", c.timestamp.get(5..10).unwrap_or(&c.timestamp)))
        .collect();
    println!("{:<12} {}", "", header.join(" "));
    for row in &heatmap.rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|c| match c {
                Some(c) => format!("{:>8}", c.label),
                None => format!("{:>8}", ""),
            })
            .collect();
        println!("{:<12} {}", row.user, cells.join(" "));
    }
}

fn print_history(history: &ShiftHistory) {
    if let Some(message) = &history.empty_message {
        println!("{message}");
        return;
    }
    for row in &history.rows {
        let shift = &row.shift;
        println!(
            "{:<42} {:<12} {:<12} {:>10}",
            shift.shift_id,
            shift.opened_by,
            shift.closed_by.as_deref().unwrap_or("-"),
            row.variance_label
        );
        match &row.detail {
            Some(ShiftDetail::Breakdown { lines }) => {
                for line in lines {
                    println!("    {:>5} x {:<4} {:>10}", line.label, line.count, line.total.to_string());
                }
            }
            Some(ShiftDetail::NoData { message }) => println!("    {message}"),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["--from", "2026-02-01", "--staff", "anna"]).unwrap();
        assert_eq!(parsed.from, NaiveDate::from_ymd_opt(2026, 2, 1));
        assert_eq!(parsed.to, None);
        assert_eq!(parsed.staff, "anna");

        assert!(args(&["--from"]).is_err());
        assert!(args(&["--from", "yesterday"]).is_err());
        assert!(args(&["--verbose", "1"]).is_err());
    }
}
