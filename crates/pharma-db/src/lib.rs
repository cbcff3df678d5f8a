//! # pharma-db: Storage and Ledger for the Pharmacy POS
//!
//! SQLite persistence (via sqlx) for medicines, bills and counters, plus the
//! transactional bill ledger and the gated public API.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pharmacy POS Data Flow                           │
//! │                                                                         │
//! │  Host application (billing screen, inventory, backup)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    pharma-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   GuardedLedger ──► WriteGate (license / trial / allow-all)     │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   ┌─────────────┐   ┌───────────────┐   ┌───────────────────┐  │   │
//! │  │   │  Database   │   │ Repositories  │   │    Migrations     │  │   │
//! │  │   │  (pool.rs)  │◄──│ medicine/bill │   │  001_initial.sql  │  │   │
//! │  │   │ SqlitePool  │   │ backup/counter│   │    (embedded)     │  │   │
//! │  │   └─────────────┘   └───────┬───────┘   └───────────────────┘  │   │
//! │  │                             │                                   │   │
//! │  └─────────────────────────────┼───────────────────────────────────┘   │
//! │                                ▼                                        │
//! │              pharma-core (FEFO, stock plans, audit, snapshots)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML + environment configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Medicine, bill, backup and counter repositories
//! - [`ledger`] - Gated read/write facade
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharma_db::{Database, GuardedLedger, PharmaConfig};
//! use pharma_core::guard::AllowAll;
//!
//! let config = PharmaConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let ledger = GuardedLedger::new(&db, AllowAll);
//! let bill = ledger.create_bill(&lines, 0.0, customer).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, PharmaConfig};
pub use error::{DbError, DbResult};
pub use ledger::GuardedLedger;
pub use pool::{Database, DbConfig};

pub use repository::backup::{BackupRepository, RestoreReport};
pub use repository::bill::BillRepository;
pub use repository::counter::CounterRepository;
pub use repository::medicine::{ImportReport, MedicineImportRow, MedicineRepository, RestockInput};
