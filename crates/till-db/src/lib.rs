//! # till-db: Realtime Ledger Store
//!
//! SQLite storage for every reception ledger collection, with a change feed
//! that turns writes into fresh snapshots for live subscriptions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Reception Data Flow                              │
//! │                                                                         │
//! │  reception: LedgerSubscription / MutationService                       │
//! │       │                                                                 │
//! │       ▼  dyn LedgerTransport                                            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ LedgerRepo    │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ list / append │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │    │ upsert/merge  │    │ 001_ledger   │  │   │
//! │  │   │ ChangeFeed    │◄───│ announce      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (ledger_entries: path, key, payload JSON)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and the `Database` handle
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`feed`] - Broadcast change feed
//! - [`query`] - `LedgerQuery` (orderByChild / startAt / endAt / limit)
//! - [`repository`] - SQL for ledger collections
//! - [`transport`] - `LedgerTransport`, the app-facing realtime interface
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig, LedgerQuery, LedgerTransport};
//!
//! let db = Database::new(DbConfig::new("reception.db")).await?;
//! let mut counts = db.subscribe("cashCounts", LedgerQuery::ordered_by("timestamp"));
//! while let Some(snapshot) = counts.recv().await {
//!     println!("{} cash counts", snapshot?.len());
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod feed;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use feed::{ChangeFeed, ChangeKind, LedgerChange};
pub use pool::{Database, DbConfig, StoreLocation};
pub use query::{LedgerQuery, QueryLimit};
pub use repository::ledger::{LedgerRepository, Snapshot};
pub use transport::{LedgerTransport, SnapshotStream};
