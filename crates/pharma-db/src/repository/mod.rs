//! # Repository Module
//!
//! Database repositories for the pharmacy ledger.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GuardedLedger / host application                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MedicineRepository   add, update, restock, import, bulk ops            │
//! │  BillRepository       create, update, delete (stock-reconciling)        │
//! │  BackupRepository     snapshot export/restore, CSV                      │
//! │  CounterRepository    durable sequences (bill numbers)                  │
//! │       │                                                                 │
//! │       │  `*_in(&mut SqliteConnection, ..)` helpers let one repository   │
//! │       │  run inside another's transaction                               │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pricing, stock movement and audit rules live in `pharma_core`; the
//! repositories load, apply and persist.
//!
//! Every write opens its transaction with `BEGIN IMMEDIATE`. A deferred
//! transaction that reads stock and then writes cannot wait for another
//! writer; SQLite fails it with `SQLITE_BUSY` at once. Taking the write lock
//! up front lets overlapping checkouts queue on the busy timeout instead.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

pub mod backup;
pub mod bill;
pub mod counter;
pub mod medicine;

/// Starts a transaction that holds the database write lock.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
