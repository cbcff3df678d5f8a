//! # Medicine Repository
//!
//! Database operations for medicines, their batches and audit history.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  medicines            one row, scalar fields (derived when batched)     │
//! │  medicine_batches     one row per batch, `position` = insertion order   │
//! │  medicine_audit       one row per entry, keyed (medicine_id, seq)       │
//! │                                                                         │
//! │  save_in(medicine)                                                      │
//! │    1. upsert the medicines row                                          │
//! │    2. replace the batch rows                                            │
//! │    3. insert audit entries with seq ≥ stored count (append-only)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutating method normalizes the medicine, appends exactly one audit
//! entry, and writes inside a single transaction.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use pharma_core::audit::{self, diff_fields, quantity_change};
use pharma_core::stock::{self, normalize};
use pharma_core::validation::{validate_batch, validate_medicine, validate_uuid};
use pharma_core::{
    AuditAction, AuditEntry, Batch, CoreError, FieldChange, Medicine, Money, ValidationError,
};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MedicineRow {
    id: String,
    name: String,
    brand: Option<String>,
    composition: Option<String>,
    category: Option<String>,
    location: Option<String>,
    tablets_per_strip: i64,
    quantity: i64,
    expiry_date: Option<NaiveDate>,
    batch_number: String,
    unit_price_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    id: String,
    medicine_id: String,
    batch_number: String,
    expiry_date: NaiveDate,
    quantity: i64,
    unit_price_cents: i64,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            id: row.id,
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    medicine_id: String,
    timestamp: DateTime<Utc>,
    action: AuditAction,
    changes: String,
    note: Option<String>,
}

impl AuditRow {
    fn into_entry(self) -> DbResult<AuditEntry> {
        Ok(AuditEntry {
            timestamp: self.timestamp,
            action: self.action,
            changes: serde_json::from_str(&self.changes)?,
            note: self.note,
        })
    }
}

impl MedicineRow {
    fn into_medicine(self, batches: Vec<Batch>, audit_history: Vec<AuditEntry>) -> Medicine {
        Medicine {
            id: self.id,
            name: self.name,
            brand: self.brand,
            composition: self.composition,
            category: self.category,
            location: self.location,
            tablets_per_strip: self.tablets_per_strip,
            quantity: self.quantity,
            expiry_date: self.expiry_date,
            batch_number: self.batch_number,
            unit_price: Money::from_cents(self.unit_price_cents),
            batches,
            audit_history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const MEDICINE_COLUMNS: &str = r#"
    id, name, brand, composition, category, location,
    tablets_per_strip, quantity, expiry_date, batch_number,
    unit_price_cents, created_at, updated_at
"#;

// =============================================================================
// Inputs & Reports
// =============================================================================

/// A stock receipt: either a new lot or a top-up of an existing one (same
/// batch number and expiry).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockInput {
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    /// Tablets received.
    pub quantity: i64,
    /// Price per strip for this lot.
    pub unit_price: Money,
}

/// One parsed row from an inventory import (spreadsheet, CSV).
///
/// Prices arrive as text and are parsed with [`Money::parse`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicineImportRow {
    /// Rows carrying an id that already exists are skipped, so a re-run
    /// import does not duplicate stock.
    pub id: Option<String>,
    pub name: String,
    pub brand: Option<String>,
    pub composition: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub tablets_per_strip: Option<i64>,
    pub quantity: i64,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub unit_price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    /// `row N: reason` for each rejected row (1-based).
    pub errors: Vec<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for medicine database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.medicines();
/// let med = repo.add(Medicine::new("Dolo 650", 15, Money::from_cents(3000))).await?;
/// let med = repo.restock(&med.id, input).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MedicineRepository {
    pool: SqlitePool,
    import_chunk_size: usize,
}

impl MedicineRepository {
    pub fn new(pool: SqlitePool, import_chunk_size: usize) -> Self {
        MedicineRepository {
            pool,
            import_chunk_size: import_chunk_size.max(1),
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// All medicines ordered by name, with batches and history.
    pub async fn list(&self) -> DbResult<Vec<Medicine>> {
        let mut conn = self.pool.acquire().await?;
        list_in(&mut conn).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Medicine>> {
        let mut conn = self.pool.acquire().await?;
        load_in(&mut conn, id).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Adds a medicine. Records a `created` audit entry.
    pub async fn add(&self, medicine: Medicine) -> DbResult<Medicine> {
        let mut medicine = normalize(medicine);
        validate_medicine(&medicine).map_err(CoreError::from)?;

        let now = Utc::now();
        medicine.created_at = now;
        medicine.audit_history.clear();
        audit::record(&mut medicine, AuditAction::Created, Vec::new(), None);

        debug!(id = %medicine.id, name = %medicine.name, "Adding medicine");

        let mut tx = begin_write(&self.pool).await?;
        if exists_in(&mut tx, &medicine.id).await? {
            return Err(DbError::UniqueViolation {
                field: "medicines.id".to_string(),
                value: medicine.id.clone(),
            });
        }
        save_in(&mut tx, &medicine).await?;
        tx.commit().await?;

        info!(id = %medicine.id, name = %medicine.name, quantity = medicine.quantity, "Medicine added");
        Ok(medicine)
    }

    /// Updates descriptive and pricing fields.
    ///
    /// Batches and history are taken from the stored record; stock moves go
    /// through [`restock`](Self::restock) and [`remove_batch`](Self::remove_batch).
    /// Legacy medicines may also change their scalar stock fields here, which
    /// is recorded as `quantity_changed` when the quantity is the only change.
    pub async fn update(&self, input: Medicine) -> DbResult<Medicine> {
        let mut tx = begin_write(&self.pool).await?;
        let existing = load_in(&mut tx, &input.id)
            .await?
            .ok_or_else(|| DbError::not_found("Medicine", &input.id))?;

        let mut updated = existing.clone();
        updated.name = input.name;
        updated.brand = input.brand;
        updated.composition = input.composition;
        updated.category = input.category;
        updated.location = input.location;
        updated.tablets_per_strip = input.tablets_per_strip;
        updated.unit_price = input.unit_price;
        if existing.is_legacy() {
            updated.quantity = input.quantity;
            updated.expiry_date = input.expiry_date;
            updated.batch_number = input.batch_number;
        }
        let mut updated = normalize(updated);
        validate_medicine(&updated).map_err(CoreError::from)?;

        let changes = diff_fields(&existing, &updated);
        if changes.is_empty() {
            debug!(id = %existing.id, "Medicine update with no changes");
            return Ok(existing);
        }

        let action = if changes.iter().all(|c| c.field == "quantity") {
            AuditAction::QuantityChanged
        } else {
            AuditAction::Updated
        };
        audit::record(&mut updated, action, changes, None);

        save_in(&mut tx, &updated).await?;
        tx.commit().await?;

        info!(id = %updated.id, action = action.as_str(), "Medicine updated");
        Ok(updated)
    }

    /// Deletes a medicine with its batches and history. Bills that sold it
    /// keep their line snapshots.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let deleted = delete_in(&mut conn, id).await?;
        if deleted {
            info!(id, "Medicine deleted");
        }
        Ok(deleted)
    }

    /// Deletes several medicines in one transaction. Returns how many existed.
    pub async fn bulk_delete(&self, ids: &[String]) -> DbResult<u64> {
        let mut tx = begin_write(&self.pool).await?;
        let mut deleted = 0;
        for id in ids {
            if delete_in(&mut tx, id).await? {
                deleted += 1;
            }
        }
        tx.commit().await?;

        info!(requested = ids.len(), deleted, "Bulk delete complete");
        Ok(deleted)
    }

    /// Moves several medicines to a new shelf location in one transaction.
    ///
    /// Unknown ids abort the whole update. Medicines already at `location`
    /// are left without an audit entry.
    pub async fn bulk_update_location(&self, ids: &[String], location: Option<String>) -> DbResult<u64> {
        let mut tx = begin_write(&self.pool).await?;
        let mut updated = 0;

        for id in ids {
            let mut medicine = load_in(&mut tx, id)
                .await?
                .ok_or_else(|| DbError::not_found("Medicine", id))?;
            if medicine.location == location {
                continue;
            }

            let change = FieldChange::new("location", medicine.location.clone(), location.clone());
            medicine.location = location.clone();
            audit::record(&mut medicine, AuditAction::Updated, vec![change], Some("bulk location update".to_string()));
            save_in(&mut tx, &medicine).await?;
            updated += 1;
        }

        tx.commit().await?;
        info!(requested = ids.len(), updated, location = ?location, "Bulk location update complete");
        Ok(updated)
    }

    /// Receives stock: adds a new batch or tops up the matching one.
    pub async fn restock(&self, medicine_id: &str, input: RestockInput) -> DbResult<Medicine> {
        if input.quantity <= 0 {
            return Err(CoreError::InvalidQuantity {
                quantity: input.quantity,
            }
            .into());
        }
        let batch = Batch::new(input.batch_number, input.expiry_date, input.quantity, input.unit_price);
        validate_batch(&batch).map_err(CoreError::from)?;

        let mut tx = begin_write(&self.pool).await?;
        let mut medicine = load_in(&mut tx, medicine_id)
            .await?
            .ok_or_else(|| DbError::not_found("Medicine", medicine_id))?;

        let before = medicine.quantity;
        let lot = batch.batch_number.clone();
        stock::receive_batch(&mut medicine, batch);
        let after = medicine.quantity;
        audit::record(
            &mut medicine,
            AuditAction::QuantityChanged,
            vec![quantity_change(before, after)],
            Some(format!("restock batch {}", lot)),
        );

        save_in(&mut tx, &medicine).await?;
        tx.commit().await?;

        info!(id = %medicine.id, batch = %lot, before, after, "Medicine restocked");
        Ok(medicine)
    }

    /// Removes a batch (expired, recalled, or entered by mistake).
    pub async fn remove_batch(&self, medicine_id: &str, batch_id: &str) -> DbResult<Medicine> {
        let mut tx = begin_write(&self.pool).await?;
        let mut medicine = load_in(&mut tx, medicine_id)
            .await?
            .ok_or_else(|| DbError::not_found("Medicine", medicine_id))?;

        let before = medicine.quantity;
        let removed = stock::remove_batch(&mut medicine, batch_id)?;
        let after = medicine.quantity;
        audit::record(
            &mut medicine,
            AuditAction::QuantityChanged,
            vec![quantity_change(before, after)],
            Some(format!("removed batch {}", removed.batch_number)),
        );

        save_in(&mut tx, &medicine).await?;
        tx.commit().await?;

        info!(id = %medicine.id, batch = %removed.batch_number, "Batch removed");
        Ok(medicine)
    }

    /// Imports parsed rows in chunks, one transaction per chunk.
    ///
    /// Invalid rows are skipped and reported; they never abort the import.
    pub async fn import(&self, rows: Vec<MedicineImportRow>) -> DbResult<ImportReport> {
        let mut report = ImportReport::default();
        let total = rows.len();

        for (chunk_idx, chunk) in rows.chunks(self.import_chunk_size).enumerate() {
            let mut tx = begin_write(&self.pool).await?;

            for (offset, row) in chunk.iter().enumerate() {
                let row_no = chunk_idx * self.import_chunk_size + offset + 1;

                if let Some(id) = &row.id {
                    if exists_in(&mut tx, id).await? {
                        debug!(row = row_no, id = %id, "Import row already present, skipping");
                        report.skipped += 1;
                        continue;
                    }
                }

                match medicine_from_import(row) {
                    Ok(medicine) => {
                        save_in(&mut tx, &medicine).await?;
                        report.imported += 1;
                    }
                    Err(err) => {
                        warn!(row = row_no, error = %err, "Skipping invalid import row");
                        report.skipped += 1;
                        report.errors.push(format!("row {}: {}", row_no, err));
                    }
                }
            }

            tx.commit().await?;
            debug!(chunk = chunk_idx, "Import chunk committed");
        }

        info!(total, imported = report.imported, skipped = report.skipped, "Import complete");
        Ok(report)
    }
}

fn medicine_from_import(row: &MedicineImportRow) -> Result<Medicine, ValidationError> {
    if let Some(id) = &row.id {
        validate_uuid(id)?;
    }
    let unit_price = Money::parse(&row.unit_price)?;
    let tablets_per_strip = row.tablets_per_strip.unwrap_or(1);

    let mut medicine = Medicine::new(row.name.trim(), tablets_per_strip, unit_price);
    if let Some(id) = &row.id {
        medicine.id = id.clone();
    }
    medicine.brand = row.brand.clone();
    medicine.composition = row.composition.clone();
    medicine.category = row.category.clone();
    medicine.location = row.location.clone();

    let lot = row.batch_number.as_deref().map(str::trim).unwrap_or("");
    match (row.expiry_date, lot.is_empty()) {
        (Some(expiry), false) if row.quantity > 0 => {
            medicine
                .batches
                .push(Batch::new(lot, expiry, row.quantity, unit_price));
        }
        _ => {
            medicine.quantity = row.quantity;
            medicine.expiry_date = row.expiry_date;
            medicine.batch_number = lot.to_string();
        }
    }

    let medicine = normalize(medicine);
    validate_medicine(&medicine)?;
    Ok(audit::append(
        medicine,
        AuditAction::Created,
        Vec::new(),
        Some("imported".to_string()),
    ))
}

// =============================================================================
// Connection-level helpers (shared with the bill ledger and backup)
// =============================================================================

pub(crate) async fn exists_in(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM medicines WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn load_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Medicine>> {
    let row: Option<MedicineRow> =
        sqlx::query_as(&format!("SELECT {} FROM medicines WHERE id = ?1", MEDICINE_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let batches: Vec<BatchRow> = sqlx::query_as(
        r#"
        SELECT id, medicine_id, batch_number, expiry_date, quantity, unit_price_cents
        FROM medicine_batches
        WHERE medicine_id = ?1
        ORDER BY position
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let audit: Vec<AuditRow> = sqlx::query_as(
        r#"
        SELECT medicine_id, timestamp, action, changes, note
        FROM medicine_audit
        WHERE medicine_id = ?1
        ORDER BY seq
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let audit = audit
        .into_iter()
        .map(AuditRow::into_entry)
        .collect::<DbResult<Vec<_>>>()?;

    Ok(Some(row.into_medicine(
        batches.into_iter().map(Batch::from).collect(),
        audit,
    )))
}

/// Loads the given medicines into a map. Missing ids are simply absent.
pub(crate) async fn load_map_in(
    conn: &mut SqliteConnection,
    ids: &[&str],
) -> DbResult<HashMap<String, Medicine>> {
    let mut map = HashMap::new();
    for &id in ids {
        if map.contains_key(id) {
            continue;
        }
        if let Some(medicine) = load_in(conn, id).await? {
            map.insert(medicine.id.clone(), medicine);
        }
    }
    Ok(map)
}

pub(crate) async fn list_in(conn: &mut SqliteConnection) -> DbResult<Vec<Medicine>> {
    let rows: Vec<MedicineRow> = sqlx::query_as(&format!(
        "SELECT {} FROM medicines ORDER BY name COLLATE NOCASE, id",
        MEDICINE_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    let batch_rows: Vec<BatchRow> = sqlx::query_as(
        r#"
        SELECT id, medicine_id, batch_number, expiry_date, quantity, unit_price_cents
        FROM medicine_batches
        ORDER BY medicine_id, position
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let audit_rows: Vec<AuditRow> = sqlx::query_as(
        r#"
        SELECT medicine_id, timestamp, action, changes, note
        FROM medicine_audit
        ORDER BY medicine_id, seq
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut batches: HashMap<String, Vec<Batch>> = HashMap::new();
    for row in batch_rows {
        batches.entry(row.medicine_id.clone()).or_default().push(row.into());
    }

    let mut history: HashMap<String, Vec<AuditEntry>> = HashMap::new();
    for row in audit_rows {
        let medicine_id = row.medicine_id.clone();
        history.entry(medicine_id).or_default().push(row.into_entry()?);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let b = batches.remove(&row.id).unwrap_or_default();
            let h = history.remove(&row.id).unwrap_or_default();
            row.into_medicine(b, h)
        })
        .collect())
}

/// Persists a medicine: upserts the row, replaces batches, appends new
/// audit entries.
pub(crate) async fn save_in(conn: &mut SqliteConnection, medicine: &Medicine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO medicines (
            id, name, brand, composition, category, location,
            tablets_per_strip, quantity, expiry_date, batch_number,
            unit_price_cents, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            brand = excluded.brand,
            composition = excluded.composition,
            category = excluded.category,
            location = excluded.location,
            tablets_per_strip = excluded.tablets_per_strip,
            quantity = excluded.quantity,
            expiry_date = excluded.expiry_date,
            batch_number = excluded.batch_number,
            unit_price_cents = excluded.unit_price_cents,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&medicine.id)
    .bind(&medicine.name)
    .bind(&medicine.brand)
    .bind(&medicine.composition)
    .bind(&medicine.category)
    .bind(&medicine.location)
    .bind(medicine.tablets_per_strip)
    .bind(medicine.quantity)
    .bind(medicine.expiry_date)
    .bind(&medicine.batch_number)
    .bind(medicine.unit_price.cents())
    .bind(medicine.created_at)
    .bind(medicine.updated_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM medicine_batches WHERE medicine_id = ?1")
        .bind(&medicine.id)
        .execute(&mut *conn)
        .await?;

    for (position, batch) in medicine.batches.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO medicine_batches (
                id, medicine_id, position, batch_number, expiry_date, quantity, unit_price_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&batch.id)
        .bind(&medicine.id)
        .bind(position as i64)
        .bind(&batch.batch_number)
        .bind(batch.expiry_date)
        .bind(batch.quantity)
        .bind(batch.unit_price.cents())
        .execute(&mut *conn)
        .await?;
    }

    let persisted: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicine_audit WHERE medicine_id = ?1")
        .bind(&medicine.id)
        .fetch_one(&mut *conn)
        .await?;

    for (seq, entry) in medicine
        .audit_history
        .iter()
        .enumerate()
        .skip(persisted.max(0) as usize)
    {
        sqlx::query(
            r#"
            INSERT INTO medicine_audit (medicine_id, seq, timestamp, action, changes, note)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&medicine.id)
        .bind(seq as i64)
        .bind(entry.timestamp)
        .bind(entry.action)
        .bind(serde_json::to_string(&entry.changes)?)
        .bind(&entry.note)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub(crate) async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM medicines WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Generates a new medicine ID.
pub fn generate_medicine_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
