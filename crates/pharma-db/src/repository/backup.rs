//! # Backup Repository
//!
//! Snapshot export/restore and CSV exports.
//!
//! ## Restore Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Snapshot::parse(json)       validate + upgrade to current version      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  clear_existing?  ──yes──► DELETE bills, medicines   (one transaction)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  medicines, chunk by chunk   (one transaction per chunk)                │
//! │  bills, chunk by chunk         Skip: keep existing record               │
//! │                                Overwrite: replace it                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  counters = max(current, snapshot, highest restored bill number)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A crash mid-restore leaves every committed chunk intact; re-running with
//! `Skip` picks up where it stopped.

use pharma_core::billing::{parse_bill_number, totals_consistent};
use pharma_core::export::{bills_to_csv, medicines_to_csv};
use pharma_core::snapshot::{ConflictPolicy, RestoreOptions, Snapshot};
use pharma_core::stock::normalize;
use pharma_core::validation::validate_medicine;
use pharma_core::{Bill, Medicine, BILL_COUNTER_KEY};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::DbResult;
use crate::repository::{begin_write, bill, counter, medicine};

/// Outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub medicines_restored: usize,
    pub medicines_skipped: usize,
    pub bills_restored: usize,
    pub bills_skipped: usize,
    /// Records rejected by validation, `medicine <id>: reason`.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BackupRepository {
    pool: SqlitePool,
    restore_chunk_size: usize,
}

impl BackupRepository {
    pub fn new(pool: SqlitePool, restore_chunk_size: usize) -> Self {
        BackupRepository {
            pool,
            restore_chunk_size: restore_chunk_size.max(1),
        }
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// Full snapshot of medicines, bills and counters, read in one transaction.
    pub async fn export_snapshot(&self) -> DbResult<Snapshot> {
        let mut tx = self.pool.begin().await?;
        let medicines = medicine::list_in(&mut tx).await?;
        let bills = bill::list_in(&mut tx).await?;
        let counters = counter::all_in(&mut tx).await?;
        tx.commit().await?;

        info!(medicines = medicines.len(), bills = bills.len(), "Snapshot exported");
        Ok(Snapshot::new(medicines, bills, counters))
    }

    pub async fn export_json(&self) -> DbResult<String> {
        Ok(self.export_snapshot().await?.to_json()?)
    }

    pub async fn medicines_csv(&self) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        let medicines = medicine::list_in(&mut conn).await?;
        Ok(medicines_to_csv(&medicines)?)
    }

    pub async fn bills_csv(&self) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        let bills = bill::list_in(&mut conn).await?;
        Ok(bills_to_csv(&bills)?)
    }

    // -------------------------------------------------------------------------
    // Restore
    // -------------------------------------------------------------------------

    /// Parses a JSON snapshot (any supported version) and restores it.
    pub async fn restore_json(&self, json: &str, options: RestoreOptions) -> DbResult<RestoreReport> {
        let snapshot = Snapshot::parse(json)?;
        self.restore(snapshot, options).await
    }

    /// Restores a snapshot.
    ///
    /// Medicines are normalized and validated; invalid ones are skipped and
    /// reported. Bills conflict on id or bill number. Counters only move up.
    pub async fn restore(&self, snapshot: Snapshot, options: RestoreOptions) -> DbResult<RestoreReport> {
        info!(
            version = snapshot.version,
            exported_at = %snapshot.exported_at,
            medicines = snapshot.medicines.len(),
            bills = snapshot.bills.len(),
            clear_existing = options.clear_existing,
            conflict = ?options.conflict,
            "Restoring snapshot"
        );

        if options.clear_existing {
            let mut tx = begin_write(&self.pool).await?;
            sqlx::query("DELETE FROM bills").execute(&mut *tx).await?;
            sqlx::query("DELETE FROM medicines").execute(&mut *tx).await?;
            tx.commit().await?;
            warn!("Existing medicines and bills cleared");
        }

        let mut report = RestoreReport::default();

        for chunk in snapshot.medicines.chunks(self.restore_chunk_size) {
            let mut tx = begin_write(&self.pool).await?;
            for record in chunk {
                restore_medicine(&mut tx, record, options.conflict, &mut report).await?;
            }
            tx.commit().await?;
            debug!(size = chunk.len(), "Medicine chunk restored");
        }

        for chunk in snapshot.bills.chunks(self.restore_chunk_size) {
            let mut tx = begin_write(&self.pool).await?;
            for record in chunk {
                restore_bill(&mut tx, record, options.conflict, &mut report).await?;
            }
            tx.commit().await?;
            debug!(size = chunk.len(), "Bill chunk restored");
        }

        let highest_bill = snapshot
            .bills
            .iter()
            .filter_map(|b| parse_bill_number(&b.bill_number))
            .max()
            .unwrap_or(0);

        let mut tx = begin_write(&self.pool).await?;
        for (key, value) in &snapshot.counters {
            counter::raise_to_in(&mut tx, key, *value).await?;
        }
        counter::raise_to_in(&mut tx, BILL_COUNTER_KEY, highest_bill).await?;
        tx.commit().await?;

        info!(
            medicines_restored = report.medicines_restored,
            medicines_skipped = report.medicines_skipped,
            bills_restored = report.bills_restored,
            bills_skipped = report.bills_skipped,
            "Restore complete"
        );
        Ok(report)
    }
}

async fn restore_medicine(
    conn: &mut SqliteConnection,
    record: &Medicine,
    conflict: ConflictPolicy,
    report: &mut RestoreReport,
) -> DbResult<()> {
    let record = normalize(record.clone());
    if let Err(err) = validate_medicine(&record) {
        warn!(id = %record.id, error = %err, "Skipping invalid medicine in snapshot");
        report.medicines_skipped += 1;
        report.errors.push(format!("medicine {}: {}", record.id, err));
        return Ok(());
    }

    if medicine::exists_in(conn, &record.id).await? {
        match conflict {
            ConflictPolicy::Skip => {
                report.medicines_skipped += 1;
                return Ok(());
            }
            ConflictPolicy::Overwrite => {
                // Cascade drops the stored batches and history.
                medicine::delete_in(conn, &record.id).await?;
            }
        }
    }

    medicine::save_in(conn, &record).await?;
    report.medicines_restored += 1;
    Ok(())
}

async fn restore_bill(
    conn: &mut SqliteConnection,
    record: &Bill,
    conflict: ConflictPolicy,
    report: &mut RestoreReport,
) -> DbResult<()> {
    if !totals_consistent(record) {
        warn!(bill_number = %record.bill_number, "Restoring bill whose totals do not match its items");
    }

    let by_id = bill::get_in(conn, &record.id).await?.map(|b| b.id);
    let by_number = bill::id_for_number_in(conn, &record.bill_number).await?;

    if by_id.is_some() || by_number.is_some() {
        match conflict {
            ConflictPolicy::Skip => {
                report.bills_skipped += 1;
                return Ok(());
            }
            ConflictPolicy::Overwrite => {
                for id in by_id.iter().chain(by_number.iter()) {
                    bill::delete_in(conn, id).await?;
                }
            }
        }
    }

    bill::insert_in(conn, record).await?;
    report.bills_restored += 1;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::NaiveDate;
    use pharma_core::{Batch, BillLineInput, CoreError, CustomerMeta, Money};
    use crate::error::DbError;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_sale(db: &Database) -> (Medicine, Bill) {
        let mut med = Medicine::new("Pantoprazole", 10, Money::from_cents(1500));
        med.batches = vec![Batch::new(
            "PT-01",
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            50,
            Money::from_cents(1500),
        )];
        let med = db.medicines().add(med).await.unwrap();
        let bill = db
            .bills()
            .create(&[BillLineInput::new(&med.id, 12)], 0.0, CustomerMeta::default())
            .await
            .unwrap();
        (db.medicines().get(&med.id).await.unwrap().unwrap(), bill)
    }

    #[tokio::test]
    async fn test_export_then_restore_into_empty_store() {
        let source = setup().await;
        let (med, bill) = seed_sale(&source).await;
        let json = source.backup().export_json().await.unwrap();

        let target = setup().await;
        let report = target
            .backup()
            .restore_json(&json, RestoreOptions::default())
            .await
            .unwrap();
        assert_eq!(report.medicines_restored, 1);
        assert_eq!(report.bills_restored, 1);

        let restored = target.medicines().get(&med.id).await.unwrap().unwrap();
        assert_eq!(restored.quantity, 38);
        assert_eq!(restored.audit_history.len(), med.audit_history.len());
        let restored_bill = target.bills().get(&bill.id).await.unwrap().unwrap();
        assert_eq!(restored_bill.items, bill.items);

        // The next number continues after the restored bills
        let next = target
            .bills()
            .create(&[BillLineInput::new(&med.id, 1)], 0.0, CustomerMeta::default())
            .await
            .unwrap();
        assert_eq!(next.bill_number, "BILL-0002");
    }

    #[tokio::test]
    async fn test_restore_skip_keeps_existing_and_is_rerunnable() {
        let db = setup().await;
        let (med, _) = seed_sale(&db).await;
        let snapshot = db.backup().export_snapshot().await.unwrap();

        db.medicines()
            .bulk_update_location(&[med.id.clone()], Some("Rack 9".into()))
            .await
            .unwrap();

        let report = db.backup().restore(snapshot.clone(), RestoreOptions::default()).await.unwrap();
        assert_eq!(report.medicines_skipped, 1);
        assert_eq!(report.bills_skipped, 1);
        let kept = db.medicines().get(&med.id).await.unwrap().unwrap();
        assert_eq!(kept.location.as_deref(), Some("Rack 9"));

        let overwrite = RestoreOptions {
            clear_existing: false,
            conflict: ConflictPolicy::Overwrite,
        };
        let report = db.backup().restore(snapshot, overwrite).await.unwrap();
        assert_eq!(report.medicines_restored, 1);
        assert_eq!(report.bills_restored, 1);
        let replaced = db.medicines().get(&med.id).await.unwrap().unwrap();
        assert_eq!(replaced.location, None);
        assert_eq!(db.bills().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_existing_never_lowers_counter() {
        let db = setup().await;
        seed_sale(&db).await;
        seed_sale(&db).await;

        let empty = Snapshot::new(Vec::new(), Vec::new(), Default::default());
        let options = RestoreOptions {
            clear_existing: true,
            conflict: ConflictPolicy::Skip,
        };
        db.backup().restore(empty, options).await.unwrap();

        assert_eq!(db.medicines().count().await.unwrap(), 0);
        assert_eq!(db.bills().count().await.unwrap(), 0);
        assert_eq!(db.counters().get(BILL_COUNTER_KEY).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_restore_v1_snapshot() {
        let db = setup().await;
        let json = r#"{
            "version": 1,
            "exportedAt": "2023-11-02T09:00:00Z",
            "app": "pharma-pos",
            "medicines": [{
                "id": "3f0e5c7a-2a53-4d3e-9c55-1b9d6c1f0a11",
                "name": "Ibuprofen",
                "brand": null,
                "composition": null,
                "category": null,
                "location": null,
                "quantity": 40,
                "expiryDate": "2025-12-31",
                "batchNumber": "IB-9",
                "unitPrice": 2500,
                "createdAt": "2023-10-01T08:00:00Z",
                "updatedAt": "2023-10-01T08:00:00Z"
            }],
            "counters": { "bill_number": 17 }
        }"#;

        let report = db.backup().restore_json(json, RestoreOptions::default()).await.unwrap();
        assert_eq!(report.medicines_restored, 1);

        let med = db
            .medicines()
            .get("3f0e5c7a-2a53-4d3e-9c55-1b9d6c1f0a11")
            .await
            .unwrap()
            .unwrap();
        assert!(med.is_legacy());
        assert_eq!(med.tablets_per_strip, 1);
        assert_eq!(med.quantity, 40);
        assert_eq!(db.counters().get(BILL_COUNTER_KEY).await.unwrap(), 17);
    }

    #[tokio::test]
    async fn test_restore_rejects_newer_and_malformed() {
        let db = setup().await;

        let err = db
            .backup()
            .restore_json(r#"{"version": 99, "exportedAt": "x", "medicines": []}"#, RestoreOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UnsupportedSnapshotVersion { .. })));

        let err = db
            .backup()
            .restore_json(r#"{"version": 3, "exportedAt": "x", "medicines": {}}"#, RestoreOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::MalformedSnapshot(_))));
    }

    #[tokio::test]
    async fn test_csv_exports() {
        let db = setup().await;
        let empty = db.backup().medicines_csv().await.unwrap();
        assert_eq!(empty.lines().count(), 1);
        assert!(empty.starts_with("Name,"));
        assert_eq!(db.backup().bills_csv().await.unwrap().lines().count(), 1);

        seed_sale(&db).await;
        let csv = db.backup().medicines_csv().await.unwrap();
        assert!(csv.starts_with("Name,"));
        assert!(csv.contains("Pantoprazole"));

        let csv = db.backup().bills_csv().await.unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("BILL-0001"));
    }
}
