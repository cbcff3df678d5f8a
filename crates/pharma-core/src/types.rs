//! # Domain Types
//!
//! Core domain types used throughout the pharmacy ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐        ┌──────────────────────┐              │
//! │  │      Medicine        │ owns   │        Batch         │              │
//! │  │  ──────────────────  │──────► │  ──────────────────  │              │
//! │  │  id (UUID)           │  0..n  │  batch_number        │              │
//! │  │  tablets_per_strip   │        │  expiry_date         │              │
//! │  │  quantity (derived)  │        │  quantity (tablets)  │              │
//! │  │  expiry (derived)    │        │  unit_price (strip)  │              │
//! │  │  audit_history ──────┼──► AuditEntry (append-only)   │              │
//! │  └──────────────────────┘        └──────────────────────┘              │
//! │             ▲ by id                                                     │
//! │  ┌──────────┴───────────┐        ┌──────────────────────┐              │
//! │  │      BillItem        │ ◄───── │        Bill          │              │
//! │  │  quantity (tablets)  │  owns  │  bill_number         │              │
//! │  │  strip_qty/loose_qty │        │  subtotal, discount  │              │
//! │  │  total (FEFO cost)   │        │  grand_total         │              │
//! │  └──────────────────────┘        └──────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Units
//! Every quantity is in tablets (the smallest sellable unit). Every price
//! stored on a medicine or batch is **per strip**.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// Discount rate represented in basis points (bps).
///
/// 1000 bps = 10%. Always within 0..=10000 once constructed through
/// [`DiscountRate::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Creates a discount rate from basis points, capped at 100%.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        if bps > 10_000 {
            DiscountRate(10_000)
        } else {
            DiscountRate(bps)
        }
    }

    /// Converts a caller-supplied percentage, silently clamping it to [0, 100].
    ///
    /// Returns `None` for NaN or infinite input, which has no sensible clamp.
    pub fn clamped(percent: f64) -> Option<Self> {
        if !percent.is_finite() {
            return None;
        }
        let clamped = percent.clamp(0.0, 100.0);
        Some(DiscountRate((clamped * 100.0).round() as u32))
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage.
    #[inline]
    pub fn percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Batch
// =============================================================================

/// A received lot of a medicine with its own expiry, quantity and price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Batch {
    /// Unique identifier (UUID v4). Never changes.
    pub id: String,

    /// Manufacturer lot number printed on the pack.
    pub batch_number: String,

    /// Expiry date of this lot.
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,

    /// Tablets remaining in this lot. Never negative.
    pub quantity: i64,

    /// Price per strip for this lot.
    pub unit_price: Money,
}

impl Batch {
    /// Creates a batch with a fresh id.
    pub fn new(
        batch_number: impl Into<String>,
        expiry_date: NaiveDate,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        Batch {
            id: Uuid::new_v4().to_string(),
            batch_number: batch_number.into(),
            expiry_date,
            quantity,
            unit_price,
        }
    }
}

// =============================================================================
// Audit Trail Types
// =============================================================================

/// What kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Medicine was added.
    Created,
    /// Descriptive fields changed (or a bulk location update).
    Updated,
    /// Stock changed outside of a sale (restock, manual correction).
    QuantityChanged,
    /// Stock changed because of a bill (create or edit).
    Sold,
}

impl AuditAction {
    /// Returns the stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::QuantityChanged => "quantity_changed",
            AuditAction::Sold => "sold",
        }
    }
}

/// One field-level change inside an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl FieldChange {
    pub fn new(
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        FieldChange {
            field: field.into(),
            old_value,
            new_value,
        }
    }
}

/// Immutable record of one mutation of a medicine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuditEntry {
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
    pub note: Option<String>,
}

// =============================================================================
// Medicine
// =============================================================================

/// A medicine stocked by the pharmacy.
///
/// ## Legacy Mode
/// Medicines created before batch tracking have an empty `batches` list;
/// their scalar `quantity`, `expiry_date` and `batch_number` are then
/// authoritative. Once any batch exists the scalars are derived by
/// [`crate::stock::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Medicine {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown at the counter and on bills.
    pub name: String,

    pub brand: Option<String>,

    /// Salt / active ingredient composition.
    pub composition: Option<String>,

    pub category: Option<String>,

    /// Shelf or rack location.
    pub location: Option<String>,

    /// Tablets in one strip. 1 means the pack is the sellable unit.
    pub tablets_per_strip: i64,

    /// Total tablets on hand (derived from batches when present).
    pub quantity: i64,

    /// Earliest expiry (derived from batches when present).
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,

    /// Legacy single-batch number; empty when several batches exist.
    #[serde(default)]
    pub batch_number: String,

    /// Reference price per strip; fallback when batches cannot cover a sale.
    pub unit_price: Money,

    #[serde(default)]
    pub batches: Vec<Batch>,

    /// Append-only mutation history.
    #[serde(default)]
    pub audit_history: Vec<AuditEntry>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Creates an empty legacy-mode medicine with a fresh id.
    pub fn new(name: impl Into<String>, tablets_per_strip: i64, unit_price: Money) -> Self {
        let now = Utc::now();
        Medicine {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            brand: None,
            composition: None,
            category: None,
            location: None,
            tablets_per_strip,
            quantity: 0,
            expiry_date: None,
            batch_number: String::new(),
            unit_price,
            batches: Vec::new(),
            audit_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true when the scalar fields are authoritative.
    #[inline]
    pub fn is_legacy(&self) -> bool {
        self.batches.is_empty()
    }

    /// Tablets available for sale.
    #[inline]
    pub fn available(&self) -> i64 {
        self.quantity
    }

    /// Tablets per strip, never below one.
    #[inline]
    pub fn strip_size(&self) -> i64 {
        self.tablets_per_strip.max(1)
    }

    /// Looks up a batch by id.
    pub fn batch(&self, batch_id: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.id == batch_id)
    }
}

// =============================================================================
// Bills
// =============================================================================

/// Optional customer / prescriber details printed on a bill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct CustomerMeta {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub doctor_name: Option<String>,
}

/// One cart line as submitted by the billing screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BillLineInput {
    pub medicine_id: String,
    /// Tablets requested.
    pub quantity: i64,
}

impl BillLineInput {
    pub fn new(medicine_id: impl Into<String>, quantity: i64) -> Self {
        BillLineInput {
            medicine_id: medicine_id.into(),
            quantity,
        }
    }

    /// Builds a line from a strip + loose tablet entry.
    pub fn from_strips(
        medicine_id: impl Into<String>,
        strips: i64,
        loose: i64,
        tablets_per_strip: i64,
    ) -> Self {
        BillLineInput::new(medicine_id, strips * tablets_per_strip.max(1) + loose)
    }
}

/// A priced line of a bill. Uses the snapshot pattern: name and strip size
/// are frozen at the time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BillItem {
    pub medicine_id: String,
    /// First batch the sale drew from. Audit linkage only.
    pub batch_id: Option<String>,
    pub medicine_name: String,
    pub tablets_per_strip: i64,
    /// Tablets sold.
    pub quantity: i64,
    /// FEFO-weighted price per strip actually charged.
    pub unit_price: Money,
    pub strip_qty: i64,
    pub loose_qty: i64,
    /// Batch-weighted cost of this line.
    pub total: Money,
}

impl BillItem {
    /// Strips back into a cart line.
    pub fn as_line(&self) -> BillLineInput {
        BillLineInput::new(self.medicine_id.clone(), self.quantity)
    }
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Bill {
    pub id: String,
    /// Human-readable number, `BILL-0001`.
    pub bill_number: String,
    #[serde(default)]
    pub customer: CustomerMeta,
    pub items: Vec<BillItem>,
    pub subtotal: Money,
    /// Clamped to [0, 100].
    pub discount_percent: f64,
    pub discount_amount: Money,
    pub grand_total: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Returns the discount as a rate.
    pub fn discount_rate(&self) -> DiscountRate {
        DiscountRate::clamped(self.discount_percent).unwrap_or_default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_rate_clamps() {
        assert_eq!(DiscountRate::clamped(10.0).unwrap().bps(), 1000);
        assert_eq!(DiscountRate::clamped(-5.0).unwrap().bps(), 0);
        assert_eq!(DiscountRate::clamped(150.0).unwrap().bps(), 10_000);
        assert_eq!(DiscountRate::clamped(12.5).unwrap().bps(), 1250);
        assert!(DiscountRate::clamped(f64::NAN).is_none());
        assert!(DiscountRate::clamped(f64::INFINITY).is_none());
        assert_eq!(DiscountRate::from_bps(20_000).bps(), 10_000);
    }

    #[test]
    fn test_line_from_strips() {
        let line = BillLineInput::from_strips("m1", 2, 5, 10);
        assert_eq!(line.quantity, 25);
    }

    #[test]
    fn test_medicine_serializes_camel_case() {
        let med = Medicine::new("Cetirizine", 10, Money::from_cents(3500));
        let json = serde_json::to_value(&med).unwrap();
        assert!(json.get("tabletsPerStrip").is_some());
        assert!(json.get("auditHistory").is_some());
        assert_eq!(json["unitPrice"], 3500);
    }

    #[test]
    fn test_audit_action_strings() {
        assert_eq!(AuditAction::QuantityChanged.as_str(), "quantity_changed");
        let json = serde_json::to_string(&AuditAction::Sold).unwrap();
        assert_eq!(json, "\"sold\"");
    }
}
