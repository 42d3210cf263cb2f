//! # Seed Data Generator
//!
//! Populates the ledger store with demo till activity for development.
//!
//! ## Usage
//! ```bash
//! # Seed 7 days of activity (default)
//! cargo run -p till-db --bin seed
//!
//! # Seed a custom number of days
//! cargo run -p till-db --bin seed -- --days 30
//!
//! # Specify database path
//! cargo run -p till-db --bin seed -- --db ./data/reception.db
//! ```
//!
//! ## Generated Data
//! One shift per day per receptionist, rotating through the staff list:
//! - opening count, a few POS sales, a float top-up
//! - close count with a denomination breakdown and a small variance
//! - the matching closed `tillShifts` record
//! - a safe deposit and an end-of-day safe reconcile

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::env;
use till_core::shift_history::breakdown_total;
use till_core::time::{date_key, italy_date};
use till_core::{
    Amount, CashCount, CashCountType, CloseType, DenomBreakdown, EodClosure, PaymentMethod,
    PosTransaction, SafeCount, SafeCountType, ShiftStatus, TillShift,
};
use till_db::{Database, DbConfig, LedgerRepository};
use uuid::Uuid;

/// Receptionists the demo shifts rotate through
const STAFF: &[&str] = &["anna", "marco", "giulia", "luca"];

/// Variances applied to successive closes, in euros
const VARIANCES: &[f64] = &[0.0, -1.0, 0.4, 2.5, 0.0, -7.2, 0.0];

/// Cash and card sales rung up during each demo shift
const SALES: &[(PaymentMethod, f64)] = &[
    (PaymentMethod::Cash, 12.5),
    (PaymentMethod::Cc, 48.0),
    (PaymentMethod::Cash, 7.0),
    (PaymentMethod::Cc, 120.0),
    (PaymentMethod::Cash, 30.5),
];

const OPENING_FLOAT: f64 = 150.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut days: i64 = 7;
    let mut db_path = String::from("./reception_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--days" | "-n" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse().unwrap_or(7);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Reception Till Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --days <N>     Days of activity to generate (default: 7)");
                println!("  -d, --db <PATH>    Database file path (default: ./reception_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Reception Till Seed Data Generator");
    println!("=====================================");
    println!("Database: {}", db_path);
    println!("Days:     {}", days);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let ledger = db.ledger();
    let existing = ledger.count("cashCounts").await?;
    if existing > 0 {
        println!("⚠ Database already has {} cash counts", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let today = italy_date(Utc::now());
    let mut safe_balance = 2000.0;

    put(&ledger, "safeCounts", &opening_safe(today - Duration::days(days), safe_balance)).await?;

    for offset in (0..days).rev() {
        let date = today - Duration::days(offset);
        let seed = usize::try_from(days - offset).unwrap_or(0);
        let deposited = seed_day(&ledger, date, seed).await?;

        safe_balance += deposited;
        put(&ledger, "safeCounts", &safe_reconcile(date, safe_balance)).await?;

        if offset > 0 {
            let closure = EodClosure {
                date: date_key(date),
                timestamp: stamp(date, 23, 0),
                confirmed_by: STAFF[0].to_string(),
                uid: None,
            };
            ledger
                .upsert("eodClosures", &closure.date, &serde_json::to_value(&closure)?)
                .await?;
        }

        println!("  Seeded {}", date_key(date));
    }

    println!();
    println!("✓ Seed complete!");
    println!("  Cash counts: {}", ledger.count("cashCounts").await?);
    println!("  Shifts:      {}", ledger.count("tillShifts").await?);
    println!("  Sales:       {}", ledger.count("transactions").await?);
    println!("  Safe events: {}", ledger.count("safeCounts").await?);

    Ok(())
}

/// Writes one day of till activity and returns the amount moved to the safe.
async fn seed_day(
    ledger: &LedgerRepository,
    date: NaiveDate,
    seed: usize,
) -> Result<f64, Box<dyn std::error::Error>> {
    let user = STAFF[seed % STAFF.len()];
    let shift_id = format!("shift-{}", Uuid::new_v4());
    let variance = VARIANCES[seed % VARIANCES.len()];

    let opened_at = stamp(date, 7, 0);
    let mut opening = CashCount::new(user, &opened_at, CashCountType::Opening);
    opening.count = Some(Amount::new(OPENING_FLOAT));
    opening.shift_id = Some(shift_id.clone());
    put(ledger, "cashCounts", &opening).await?;

    let mut cash_sales = 0.0;
    for (n, (method, amount)) in SALES.iter().enumerate() {
        let hour = 9 + u32::try_from(n).unwrap_or(0);
        let sale = PosTransaction {
            method: *method,
            amount: Amount::new(*amount),
            timestamp: stamp(date, hour, 15),
            user: Some(user.to_string()),
        };
        if *method == PaymentMethod::Cash {
            cash_sales += amount;
        }
        put(ledger, "transactions", &sale).await?;
    }

    let mut float = CashCount::new(user, stamp(date, 12, 30), CashCountType::Float);
    float.amount = Some(Amount::new(20.0));
    float.shift_id = Some(shift_id.clone());
    put(ledger, "cashCounts", &float).await?;

    let expected = OPENING_FLOAT + 20.0 + cash_sales;
    let breakdown = breakdown_for(expected + variance);
    let counted = breakdown_total(&breakdown);
    let difference = (counted - Amount::new(expected)).round_cents();

    let closed_at = stamp(date, 15, 0);
    let mut close = CashCount::new(user, &closed_at, CashCountType::Close);
    close.count = Some(counted);
    close.difference = Some(difference);
    close.keycard_count = Some(4);
    close.denom_breakdown = Some(breakdown);
    close.shift_id = Some(shift_id.clone());
    put(ledger, "cashCounts", &close).await?;

    let mut shift = TillShift::opened(&shift_id, &opened_at, user, Amount::new(OPENING_FLOAT), 4);
    shift.status = ShiftStatus::Closed;
    shift.closed_at = Some(closed_at);
    shift.closed_by = Some(user.to_string());
    shift.closing_cash = Some(counted);
    shift.closing_keycards = Some(4);
    shift.close_difference = Some(difference);
    shift.close_type = Some(CloseType::Close);
    ledger
        .insert("tillShifts", &shift_id, &serde_json::to_value(&shift)?)
        .await?;

    let mut deposit = SafeCount::new(user, stamp(date, 15, 30), SafeCountType::Deposit);
    deposit.amount = Some(Amount::new(cash_sales));
    put(ledger, "safeCounts", &deposit).await?;

    Ok(cash_sales)
}

fn opening_safe(date: NaiveDate, balance: f64) -> SafeCount {
    let mut opening = SafeCount::new(STAFF[0], stamp(date, 6, 0), SafeCountType::Opening);
    opening.count = Some(Amount::new(balance));
    opening
}

fn safe_reconcile(date: NaiveDate, balance: f64) -> SafeCount {
    let mut reconcile = SafeCount::new(STAFF[0], stamp(date, 22, 0), SafeCountType::SafeReconcile);
    reconcile.count = Some(Amount::new(balance));
    reconcile
}

/// Greedy note/coin split of `total` into €20, €10, €5, €1 and 10c pieces.
fn breakdown_for(total: f64) -> DenomBreakdown {
    let mut cents = (total * 100.0).round().max(0.0) as u64;
    let mut breakdown = DenomBreakdown::new();
    for (key, value) in [("20", 2000), ("10", 1000), ("5", 500), ("1", 100), ("0.1", 10)] {
        let pieces = cents / value;
        if pieces > 0 {
            breakdown.insert(key.to_string(), u32::try_from(pieces).unwrap_or(u32::MAX));
            cents -= pieces * value;
        }
    }
    breakdown
}

/// Ledger timestamp for a wall-clock time on `date`.
fn stamp(date: NaiveDate, hour: u32, minute: u32) -> String {
    format!("{}T{:02}:{:02}:00.000+00:00", date_key(date), hour, minute)
}

async fn put<T: Serialize>(
    ledger: &LedgerRepository,
    path: &str,
    record: &T,
) -> Result<String, Box<dyn std::error::Error>> {
    let value: Value = serde_json::to_value(record)?;
    Ok(ledger.append(path, &value).await?)
}
