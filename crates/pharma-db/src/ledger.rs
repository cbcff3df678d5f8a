//! # Guarded Ledger
//!
//! The public read/write API, with every write passed through a
//! [`WriteGate`] first.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ledger.create_bill(..)                                                 │
//! │       │                                                                 │
//! │       ├── gate.check(WriteOperation::CreateBill)                        │
//! │       │      └── Err(GuardRejected) ──► return, no transaction opened   │
//! │       ▼                                                                 │
//! │  db.bills().create(..)                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads never consult the gate. The repositories stay usable without a gate
//! for tools and tests.

use pharma_core::guard::{WriteGate, WriteOperation};
use pharma_core::snapshot::{RestoreOptions, Snapshot};
use pharma_core::{Bill, BillItem, BillLineInput, CustomerMeta, Medicine};
use tracing::warn;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::backup::RestoreReport;
use crate::repository::medicine::{ImportReport, MedicineImportRow, RestockInput};

/// Gated facade over the repositories.
///
/// ## Usage
/// ```rust,ignore
/// let license = LicenseStatus::Trial { expires_on };
/// let ledger = GuardedLedger::new(&db, &license);
/// let bill = ledger.create_bill(&lines, 5.0, customer).await?;
/// ```
#[derive(Debug, Clone)]
pub struct GuardedLedger<'a, G: WriteGate> {
    db: &'a Database,
    gate: G,
}

impl<'a, G: WriteGate> GuardedLedger<'a, G> {
    pub fn new(db: &'a Database, gate: G) -> Self {
        GuardedLedger { db, gate }
    }

    fn check(&self, operation: WriteOperation) -> DbResult<()> {
        self.gate.check(operation).map_err(|err| {
            warn!(operation = %operation, error = %err, "Write rejected by gate");
            err.into()
        })
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn list_medicines(&self) -> DbResult<Vec<Medicine>> {
        self.db.medicines().list().await
    }

    pub async fn get_medicine(&self, id: &str) -> DbResult<Option<Medicine>> {
        self.db.medicines().get(id).await
    }

    /// Newest first.
    pub async fn list_bills(&self) -> DbResult<Vec<Bill>> {
        self.db.bills().list().await
    }

    pub async fn get_bill(&self, id: &str) -> DbResult<Option<Bill>> {
        self.db.bills().get(id).await
    }

    pub async fn medicines_to_csv(&self) -> DbResult<String> {
        self.db.backup().medicines_csv().await
    }

    pub async fn bills_to_csv(&self) -> DbResult<String> {
        self.db.backup().bills_csv().await
    }

    pub async fn export_snapshot(&self) -> DbResult<Snapshot> {
        self.db.backup().export_snapshot().await
    }

    // -------------------------------------------------------------------------
    // Medicine writes
    // -------------------------------------------------------------------------

    pub async fn add_medicine(&self, medicine: Medicine) -> DbResult<Medicine> {
        self.check(WriteOperation::AddMedicine)?;
        self.db.medicines().add(medicine).await
    }

    pub async fn update_medicine(&self, medicine: Medicine) -> DbResult<Medicine> {
        self.check(WriteOperation::UpdateMedicine)?;
        self.db.medicines().update(medicine).await
    }

    pub async fn delete_medicine(&self, id: &str) -> DbResult<bool> {
        self.check(WriteOperation::DeleteMedicine)?;
        self.db.medicines().delete(id).await
    }

    pub async fn bulk_delete(&self, ids: &[String]) -> DbResult<u64> {
        self.check(WriteOperation::BulkDelete)?;
        self.db.medicines().bulk_delete(ids).await
    }

    pub async fn bulk_update_location(&self, ids: &[String], location: Option<String>) -> DbResult<u64> {
        self.check(WriteOperation::BulkUpdateLocation)?;
        self.db.medicines().bulk_update_location(ids, location).await
    }

    pub async fn restock(&self, medicine_id: &str, input: RestockInput) -> DbResult<Medicine> {
        self.check(WriteOperation::Restock)?;
        self.db.medicines().restock(medicine_id, input).await
    }

    pub async fn remove_batch(&self, medicine_id: &str, batch_id: &str) -> DbResult<Medicine> {
        self.check(WriteOperation::RemoveBatch)?;
        self.db.medicines().remove_batch(medicine_id, batch_id).await
    }

    pub async fn import_medicines(&self, rows: Vec<MedicineImportRow>) -> DbResult<ImportReport> {
        self.check(WriteOperation::ImportMedicines)?;
        self.db.medicines().import(rows).await
    }

    // -------------------------------------------------------------------------
    // Bill writes
    // -------------------------------------------------------------------------

    pub async fn create_bill(
        &self,
        lines: &[BillLineInput],
        discount_percent: f64,
        customer: CustomerMeta,
    ) -> DbResult<Bill> {
        self.check(WriteOperation::CreateBill)?;
        self.db.bills().create(lines, discount_percent, customer).await
    }

    pub async fn update_bill(
        &self,
        bill_id: &str,
        new_lines: &[BillLineInput],
        discount_percent: f64,
        original_items: &[BillItem],
        customer: CustomerMeta,
    ) -> DbResult<Bill> {
        self.check(WriteOperation::UpdateBill)?;
        self.db
            .bills()
            .update(bill_id, new_lines, discount_percent, original_items, customer)
            .await
    }

    /// Administrative delete; stock is not reversed.
    pub async fn delete_bill(&self, bill_id: &str) -> DbResult<bool> {
        self.check(WriteOperation::DeleteBill)?;
        self.db.bills().delete(bill_id).await
    }

    // -------------------------------------------------------------------------
    // Restore
    // -------------------------------------------------------------------------

    pub async fn restore_snapshot(&self, snapshot: Snapshot, options: RestoreOptions) -> DbResult<RestoreReport> {
        self.check(WriteOperation::RestoreSnapshot)?;
        self.db.backup().restore(snapshot, options).await
    }

    /// Parses and restores a JSON snapshot. The gate is checked before parsing.
    pub async fn restore_json(&self, json: &str, options: RestoreOptions) -> DbResult<RestoreReport> {
        self.check(WriteOperation::RestoreSnapshot)?;
        self.db.backup().restore_json(json, options).await
    }
}
