//! # Bill Repository
//!
//! The transactional bill ledger: checkout, edit and administrative delete.
//!
//! ## Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       create(lines, discount, customer)                 │
//! │                                                                         │
//! │  BEGIN IMMEDIATE                                                        │
//! │   ├── load every medicine on the cart                                   │
//! │   ├── billing::plan_create   (all stock checks, then FEFO draws)        │
//! │   │      └── InsufficientStock ──► ROLLBACK, nothing written            │
//! │   ├── counters.bill_number += 1  ──► BILL-0042                          │
//! │   ├── one `sold` audit entry per medicine, save medicines               │
//! │   └── insert bill + items                                               │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter is advanced inside the same transaction, so a failed
//! checkout never burns a bill number.
//!
//! ## Edit
//! `update` applies the *net* per-medicine delta between the original and
//! the revised items (see [`pharma_core::billing::plan_update`]). Id, number
//! and creation time are preserved.
//!
//! ## Delete
//! Administrative only. Stock is **not** returned.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pharma_core::audit::{self, quantity_change};
use pharma_core::billing::{format_bill_number, plan_create, plan_update, resolve_discount, BillTotals, StockPlan};
use pharma_core::{AuditAction, Bill, BillItem, BillLineInput, CustomerMeta, Medicine, Money, BILL_COUNTER_KEY};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{begin_write, counter};
use crate::repository::medicine::{load_map_in, save_in as save_medicine_in};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    id: String,
    bill_number: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    doctor_name: Option<String>,
    subtotal_cents: i64,
    discount_percent: f64,
    discount_cents: i64,
    grand_total_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BillRow {
    fn into_bill(self, items: Vec<BillItem>) -> Bill {
        Bill {
            id: self.id,
            bill_number: self.bill_number,
            customer: CustomerMeta {
                customer_name: self.customer_name,
                customer_phone: self.customer_phone,
                doctor_name: self.doctor_name,
            },
            items,
            subtotal: Money::from_cents(self.subtotal_cents),
            discount_percent: self.discount_percent,
            discount_amount: Money::from_cents(self.discount_cents),
            grand_total: Money::from_cents(self.grand_total_cents),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillItemRow {
    bill_id: String,
    medicine_id: String,
    batch_id: Option<String>,
    medicine_name: String,
    tablets_per_strip: i64,
    quantity: i64,
    unit_price_cents: i64,
    strip_qty: i64,
    loose_qty: i64,
    total_cents: i64,
}

impl From<BillItemRow> for BillItem {
    fn from(row: BillItemRow) -> Self {
        BillItem {
            medicine_id: row.medicine_id,
            batch_id: row.batch_id,
            medicine_name: row.medicine_name,
            tablets_per_strip: row.tablets_per_strip,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
            strip_qty: row.strip_qty,
            loose_qty: row.loose_qty,
            total: Money::from_cents(row.total_cents),
        }
    }
}

const BILL_COLUMNS: &str = r#"
    id, bill_number, customer_name, customer_phone, doctor_name,
    subtotal_cents, discount_percent, discount_cents, grand_total_cents,
    created_at, updated_at
"#;

const ITEM_COLUMNS: &str = r#"
    bill_id, medicine_id, batch_id, medicine_name, tablets_per_strip,
    quantity, unit_price_cents, strip_qty, loose_qty, total_cents
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for bills.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    /// All bills, newest first.
    pub async fn list(&self) -> DbResult<Vec<Bill>> {
        let mut conn = self.pool.acquire().await?;
        list_in(&mut conn).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Bill>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Checks out a cart.
    ///
    /// ## Errors
    /// * `InvalidDiscount` - discount is NaN or infinite (out-of-range values clamp)
    /// * `InvalidQuantity`, `EmptyBill`, `BillTooLarge` - bad cart
    /// * `NotFound` - a line names an unknown medicine
    /// * `InsufficientStock` - any line exceeds stock; nothing is written
    pub async fn create(
        &self,
        lines: &[BillLineInput],
        discount_percent: f64,
        customer: CustomerMeta,
    ) -> DbResult<Bill> {
        let rate = resolve_discount(discount_percent)?;
        debug!(lines = lines.len(), discount_bps = rate.bps(), "Creating bill");

        let mut tx = begin_write(&self.pool).await?;

        let ids: Vec<&str> = lines.iter().map(|l| l.medicine_id.as_str()).collect();
        let mut working = load_map_in(&mut tx, &ids).await?;
        let plan = plan_create(lines, &mut working)?;

        let sequence = counter::next_in(&mut tx, BILL_COUNTER_KEY).await?;
        let bill_number = format_bill_number(sequence);

        apply_stock(&mut tx, &plan, &mut working, &format!("sold on {}", bill_number)).await?;

        let totals = BillTotals::compute(&plan.items, rate);
        let now = Utc::now();
        let bill = Bill {
            id: Uuid::new_v4().to_string(),
            bill_number,
            customer,
            items: plan.items,
            subtotal: totals.subtotal,
            discount_percent: totals.discount_percent,
            discount_amount: totals.discount_amount,
            grand_total: totals.grand_total,
            created_at: now,
            updated_at: now,
        };
        insert_in(&mut tx, &bill).await?;

        tx.commit().await?;

        info!(
            bill_number = %bill.bill_number,
            items = bill.items.len(),
            grand_total = %bill.grand_total,
            "Bill created"
        );
        Ok(bill)
    }

    /// Edits a bill already reflected in stock.
    ///
    /// `original_items` is the item list the caller loaded for editing;
    /// stock moves by the net difference between it and `new_lines`. Lines
    /// with quantity 0 are dropped from the bill but return their stock.
    pub async fn update(
        &self,
        bill_id: &str,
        new_lines: &[BillLineInput],
        discount_percent: f64,
        original_items: &[BillItem],
        customer: CustomerMeta,
    ) -> DbResult<Bill> {
        let rate = resolve_discount(discount_percent)?;
        debug!(bill_id, lines = new_lines.len(), "Updating bill");

        let mut tx = begin_write(&self.pool).await?;

        let existing = get_in(&mut tx, bill_id)
            .await?
            .ok_or_else(|| DbError::not_found("Bill", bill_id))?;

        let ids: Vec<&str> = original_items
            .iter()
            .map(|i| i.medicine_id.as_str())
            .chain(new_lines.iter().map(|l| l.medicine_id.as_str()))
            .collect();
        let mut working = load_map_in(&mut tx, &ids).await?;

        let plan = plan_update(original_items, new_lines, &mut working)?;
        apply_stock(
            &mut tx,
            &plan,
            &mut working,
            &format!("edit of {}", existing.bill_number),
        )
        .await?;

        let totals = BillTotals::compute(&plan.items, rate);
        let bill = Bill {
            id: existing.id,
            bill_number: existing.bill_number,
            customer,
            items: plan.items,
            subtotal: totals.subtotal,
            discount_percent: totals.discount_percent,
            discount_amount: totals.discount_amount,
            grand_total: totals.grand_total,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            UPDATE bills SET
                customer_name = ?2,
                customer_phone = ?3,
                doctor_name = ?4,
                subtotal_cents = ?5,
                discount_percent = ?6,
                discount_cents = ?7,
                grand_total_cents = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&bill.id)
        .bind(&bill.customer.customer_name)
        .bind(&bill.customer.customer_phone)
        .bind(&bill.customer.doctor_name)
        .bind(bill.subtotal.cents())
        .bind(bill.discount_percent)
        .bind(bill.discount_amount.cents())
        .bind(bill.grand_total.cents())
        .bind(bill.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM bill_items WHERE bill_id = ?1")
            .bind(&bill.id)
            .execute(&mut *tx)
            .await?;
        insert_items_in(&mut tx, &bill).await?;

        tx.commit().await?;

        info!(
            bill_number = %bill.bill_number,
            touched = plan.adjustments.len(),
            grand_total = %bill.grand_total,
            "Bill updated"
        );
        Ok(bill)
    }

    /// Deletes a bill record. Stock is left as it is.
    pub async fn delete(&self, bill_id: &str) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let deleted = delete_in(&mut conn, bill_id).await?;
        if deleted {
            info!(bill_id, "Bill deleted (stock not reversed)");
        }
        Ok(deleted)
    }
}

/// Writes the stock side of a plan: one `sold` entry per touched medicine.
async fn apply_stock(
    conn: &mut SqliteConnection,
    plan: &StockPlan,
    working: &mut HashMap<String, Medicine>,
    note: &str,
) -> DbResult<()> {
    for adjustment in &plan.adjustments {
        let medicine = working
            .get_mut(&adjustment.medicine_id)
            .ok_or_else(|| DbError::not_found("Medicine", &adjustment.medicine_id))?;

        audit::record(
            medicine,
            AuditAction::Sold,
            vec![quantity_change(adjustment.quantity_before, adjustment.quantity_after)],
            Some(note.to_string()),
        );
        save_medicine_in(conn, medicine).await?;

        debug!(
            medicine = %medicine.name,
            before = adjustment.quantity_before,
            after = adjustment.quantity_after,
            "Stock adjusted"
        );
    }
    Ok(())
}

// =============================================================================
// Connection-level helpers (shared with backup)
// =============================================================================

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Bill>> {
    let row: Option<BillRow> = sqlx::query_as(&format!("SELECT {} FROM bills WHERE id = ?1", BILL_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items: Vec<BillItemRow> = sqlx::query_as(&format!(
        "SELECT {} FROM bill_items WHERE bill_id = ?1 ORDER BY position",
        ITEM_COLUMNS
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_bill(items.into_iter().map(BillItem::from).collect())))
}

pub(crate) async fn list_in(conn: &mut SqliteConnection) -> DbResult<Vec<Bill>> {
    let rows: Vec<BillRow> = sqlx::query_as(&format!(
        "SELECT {} FROM bills ORDER BY created_at DESC, rowid DESC",
        BILL_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    let item_rows: Vec<BillItemRow> = sqlx::query_as(&format!(
        "SELECT {} FROM bill_items ORDER BY bill_id, position",
        ITEM_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<String, Vec<BillItem>> = HashMap::new();
    for row in item_rows {
        items.entry(row.bill_id.clone()).or_default().push(row.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let bill_items = items.remove(&row.id).unwrap_or_default();
            row.into_bill(bill_items)
        })
        .collect())
}

/// Id of the bill carrying `bill_number`, if any.
pub(crate) async fn id_for_number_in(conn: &mut SqliteConnection, bill_number: &str) -> DbResult<Option<String>> {
    let id: Option<String> = sqlx::query_scalar("SELECT id FROM bills WHERE bill_number = ?1")
        .bind(bill_number)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

pub(crate) async fn insert_in(conn: &mut SqliteConnection, bill: &Bill) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bills (
            id, bill_number, customer_name, customer_phone, doctor_name,
            subtotal_cents, discount_percent, discount_cents, grand_total_cents,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&bill.id)
    .bind(&bill.bill_number)
    .bind(&bill.customer.customer_name)
    .bind(&bill.customer.customer_phone)
    .bind(&bill.customer.doctor_name)
    .bind(bill.subtotal.cents())
    .bind(bill.discount_percent)
    .bind(bill.discount_amount.cents())
    .bind(bill.grand_total.cents())
    .bind(bill.created_at)
    .bind(bill.updated_at)
    .execute(&mut *conn)
    .await?;

    insert_items_in(conn, bill).await
}

async fn insert_items_in(conn: &mut SqliteConnection, bill: &Bill) -> DbResult<()> {
    for (position, item) in bill.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO bill_items (
                bill_id, position, medicine_id, batch_id, medicine_name, tablets_per_strip,
                quantity, unit_price_cents, strip_qty, loose_qty, total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&bill.id)
        .bind(position as i64)
        .bind(&item.medicine_id)
        .bind(&item.batch_id)
        .bind(&item.medicine_name)
        .bind(item.tablets_per_strip)
        .bind(item.quantity)
        .bind(item.unit_price.cents())
        .bind(item.strip_qty)
        .bind(item.loose_qty)
        .bind(item.total.cents())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM bills WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================
