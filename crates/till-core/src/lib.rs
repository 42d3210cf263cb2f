//! # till-core: Pure Till & Safe Reconciliation Logic
//!
//! Ledger record types, the read/write validation boundary and every report
//! the reception console shows about cash. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Reception Till Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/reception (orchestration)                  │   │
//! │  │   subscriptions ──► mutations ──► workbench ──► till-report     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ validation│  │ reconcile │  │  heatmap  │  │   │
//! │  │   │ CashCount │  │ boundary  │  │ 4-row     │  │ shift     │  │   │
//! │  │   │ TillShift │  │ snapshots │  │ table     │  │ history   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CLOCK • NO DATABASE • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                till-db (realtime ledger store)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ledger records (CashCount, SafeCount, TillShift, ...)
//! - [`money`] - `Amount`, the euro figure with a one-cent epsilon
//! - [`validation`] - `LedgerRecord` and whole-snapshot parsing
//! - [`reconcile`] - POS / drawer / PMS / terminal comparison
//! - [`heatmap`], [`shift_history`] - variance reporting
//! - [`shift`], [`safe`], [`eod`] - drawer, safe and end-of-day helpers
//! - [`eod_report`] - end-of-day cash, keycard and safe variances
//! - [`time`] - Italy-local timestamps and report windows
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::Amount;
//! use till_core::reconcile::{reconcile, ReconciliationInputs, ReconciliationSource};
//! use till_core::types::{PaymentMethod, PosTransaction};
//!
//! let sales = vec![PosTransaction {
//!     method: PaymentMethod::Cash,
//!     amount: Amount::new(20.0),
//!     timestamp: "2026-02-28T10:00:00.000+00:00".to_string(),
//!     user: None,
//! }];
//! let report = reconcile(&ReconciliationInputs {
//!     transactions: &sales,
//!     ..Default::default()
//! });
//!
//! let pos = report.row(ReconciliationSource::Pos).unwrap();
//! assert_eq!(pos.cash.unwrap().to_string(), "€20.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod eod;
pub mod eod_report;
pub mod error;
pub mod heatmap;
pub mod money;
pub mod reconcile;
pub mod safe;
pub mod shift;
pub mod shift_history;
pub mod time;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError, ValidationErrors};
pub use money::Amount;
pub use types::*;
pub use validation::LedgerRecord;
