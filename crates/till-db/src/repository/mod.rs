//! # Repository Module
//!
//! Database repository implementations for the ledger store.
//!
//! ```text
//!   LedgerTransport (transport.rs)
//!        │
//!        │  db.ledger().list("cashCounts", &query)
//!        ▼
//!   LedgerRepository
//!   ├── list / get / count
//!   ├── append / insert / upsert / merge
//!   └── announce ──► ChangeFeed
//!        │
//!        ▼
//!   SQLite (ledger_entries)
//! ```

pub mod ledger;
