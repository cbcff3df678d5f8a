//! # Write Gate
//!
//! The interception point consulted before every mutating ledger operation.
//!
//! ```text
//! caller ──► GuardedLedger::create_bill ──► gate.check(CreateBill)
//!                                               │
//!                              Ok ◄─────────────┴────────────► GuardRejected
//!                               │                                (nothing written)
//!                               ▼
//!                         ledger transaction
//! ```
//!
//! The gate is passed in explicitly. There is no process-wide license flag;
//! tests and tools use [`AllowAll`].

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Every mutating operation the ledger exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum WriteOperation {
    AddMedicine,
    UpdateMedicine,
    DeleteMedicine,
    BulkDelete,
    BulkUpdateLocation,
    Restock,
    RemoveBatch,
    ImportMedicines,
    CreateBill,
    UpdateBill,
    DeleteBill,
    RestoreSnapshot,
}

impl WriteOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOperation::AddMedicine => "add_medicine",
            WriteOperation::UpdateMedicine => "update_medicine",
            WriteOperation::DeleteMedicine => "delete_medicine",
            WriteOperation::BulkDelete => "bulk_delete",
            WriteOperation::BulkUpdateLocation => "bulk_update_location",
            WriteOperation::Restock => "restock",
            WriteOperation::RemoveBatch => "remove_batch",
            WriteOperation::ImportMedicines => "import_medicines",
            WriteOperation::CreateBill => "create_bill",
            WriteOperation::UpdateBill => "update_bill",
            WriteOperation::DeleteBill => "delete_bill",
            WriteOperation::RestoreSnapshot => "restore_snapshot",
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a write may proceed.
pub trait WriteGate: Send + Sync {
    /// Returns `GuardRejected` to block the operation.
    fn check(&self, operation: WriteOperation) -> CoreResult<()>;
}

/// Gate that permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl WriteGate for AllowAll {
    fn check(&self, _operation: WriteOperation) -> CoreResult<()> {
        Ok(())
    }
}

/// License state supplied by the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum LicenseStatus {
    Active,
    Trial {
        #[ts(as = "String")]
        expires_on: NaiveDate,
    },
    Expired,
    Suspended,
}

impl LicenseStatus {
    /// Evaluates the license on a given day.
    pub fn check_on(&self, operation: WriteOperation, today: NaiveDate) -> CoreResult<()> {
        let reason = match self {
            LicenseStatus::Active => return Ok(()),
            LicenseStatus::Trial { expires_on } if today <= *expires_on => return Ok(()),
            LicenseStatus::Trial { expires_on } => format!("trial ended on {}", expires_on),
            LicenseStatus::Expired => "license expired".to_string(),
            LicenseStatus::Suspended => "license suspended".to_string(),
        };

        Err(CoreError::GuardRejected {
            operation: operation.to_string(),
            reason,
        })
    }
}

impl WriteGate for LicenseStatus {
    fn check(&self, operation: WriteOperation) -> CoreResult<()> {
        self.check_on(operation, Utc::now().date_naive())
    }
}

impl<G: WriteGate + ?Sized> WriteGate for &G {
    fn check(&self, operation: WriteOperation) -> CoreResult<()> {
        (**self).check(operation)
    }
}
