//! # pharma-core: Pure Business Logic for the Pharmacy Ledger
//!
//! This crate is the **heart** of the billing engine. It contains the stock,
//! pricing and bill rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pharma POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Billing / Inventory UI (external)                  │   │
//! │  │    Cart ──► Checkout ──► Edit Bill ──► Backup / Restore         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            pharma-db (GuardedLedger, repositories)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pharma-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌────────────┐ ┌─────────┐ ┌────────┐ ┌────────┐  │   │
//! │  │  │  stock  │ │ allocation │ │ billing │ │ audit  │ │ guard  │  │   │
//! │  │  │normalize│ │    FEFO    │ │ totals  │ │ append │ │  gate  │  │   │
//! │  │  └─────────┘ └────────────┘ └─────────┘ └────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Medicine, Batch, Bill, AuditEntry, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`stock`] - Stock Normalizer and batch mutations
//! - [`allocation`] - FEFO Allocator
//! - [`audit`] - Audit Trail
//! - [`billing`] - Bill totals, bill numbers, delta reconciliation
//! - [`guard`] - Write gate contract
//! - [`snapshot`] - Backup snapshot format and version migrations
//! - [`export`] - CSV export
//!
//! ## Example Usage
//!
//! ```rust
//! use pharma_core::allocation::allocate;
//! use pharma_core::money::Money;
//! use pharma_core::types::{Batch, Medicine};
//! use chrono::NaiveDate;
//!
//! let mut med = Medicine::new("Paracetamol 500", 10, Money::from_cents(1200));
//! med.batches = vec![
//!     Batch::new("B1", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 20, Money::from_cents(1000)),
//!     Batch::new("B2", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 100, Money::from_cents(1200)),
//! ];
//!
//! let alloc = allocate(&med, 25).unwrap();
//! assert_eq!(alloc.total_cost.cents(), 2600);
//! assert_eq!((alloc.strip_qty, alloc.loose_qty), (2, 5));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod audit;
pub mod billing;
pub mod error;
pub mod export;
pub mod guard;
pub mod money;
pub mod snapshot;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Prefix of every human-readable bill number (`BILL-0001`).
pub const BILL_NUMBER_PREFIX: &str = "BILL-";

/// Counter key under which the bill number sequence is stored.
pub const BILL_COUNTER_KEY: &str = "bill_number";

/// Highest snapshot schema version this build can restore.
pub const SNAPSHOT_VERSION: u32 = 3;

/// Label written into exported snapshots.
pub const SNAPSHOT_APP_LABEL: &str = "pharma-pos";

/// Maximum lines allowed in a single bill.
///
/// ## Business Reason
/// Prevents runaway carts; a pharmacy counter bill rarely exceeds a few dozen lines.
pub const MAX_BILL_LINES: usize = 200;
