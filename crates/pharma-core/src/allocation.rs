//! # FEFO Allocator
//!
//! Prices a requested number of tablets against a medicine's batches,
//! First-Expiry-First-Out.
//!
//! ## How It Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Paracetamol, 10 tablets/strip, request 25 tablets                      │
//! │                                                                         │
//! │  batches (qty > 0), stable-sorted by expiry:                            │
//! │    B1  exp 2025-01-01  qty 20  ₹10.00/strip  ──► take 20               │
//! │    B2  exp 2025-06-01  qty 100 ₹12.00/strip  ──► take  5               │
//! │                                                                         │
//! │  cost = (20 × 1000 + 5 × 1200) / 10 = 2600 paise = ₹26.00              │
//! │  strips = 25 div 10 = 2, loose = 25 mod 10 = 5                          │
//! │  effective strip price = 2600 × 10 / 25 = 1040 paise                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//! The allocator never mutates. Given the same batch snapshot it always
//! returns the same draws and cost, so the ledger can price a line and later
//! replay the identical draws when it commits the decrement.

use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Batch, Medicine};

// =============================================================================
// Allocation Result
// =============================================================================

/// Tablets drawn from one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BatchDraw {
    pub batch_id: String,
    pub tablets: i64,
}

/// The priced result of a hypothetical sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Allocation {
    /// Tablets requested.
    pub requested: i64,
    /// FEFO-weighted price per strip.
    pub unit_price_effective: Money,
    /// Batch-weighted cost of all requested tablets.
    pub total_cost: Money,
    pub strip_qty: i64,
    pub loose_qty: i64,
    /// Draws in FEFO order. Empty for legacy medicines.
    pub draws: Vec<BatchDraw>,
    /// Tablets priced at the medicine-level fallback price because batches
    /// ran out.
    pub fallback_tablets: i64,
}

impl Allocation {
    /// Zero-quantity allocation.
    pub fn empty() -> Self {
        Allocation {
            requested: 0,
            unit_price_effective: Money::zero(),
            total_cost: Money::zero(),
            strip_qty: 0,
            loose_qty: 0,
            draws: Vec::new(),
            fallback_tablets: 0,
        }
    }

    /// True when any tablets were costed at the medicine fallback price.
    #[inline]
    pub fn used_fallback_price(&self) -> bool {
        self.fallback_tablets > 0
    }

    /// First batch drawn from, if any.
    pub fn first_batch_id(&self) -> Option<&str> {
        self.draws.first().map(|d| d.batch_id.as_str())
    }
}

// =============================================================================
// Allocator
// =============================================================================

/// Batches with stock, in FEFO order.
///
/// `sort_by_key` is stable, so batches expiring on the same day keep their
/// insertion order.
pub fn fefo_order(batches: &[Batch]) -> Vec<&Batch> {
    let mut ordered: Vec<&Batch> = batches.iter().filter(|b| b.quantity > 0).collect();
    ordered.sort_by_key(|b| b.expiry_date);
    ordered
}

/// Prices `requested_tablets` of `medicine` FEFO.
///
/// ## Errors
/// * `InvalidQuantity` - `requested_tablets` is negative
///
/// ## Fallback Pricing
/// If the batches hold fewer tablets than requested, the remainder is
/// priced at `medicine.unit_price`. A prior availability check should make
/// this unreachable; it is logged at `warn` when it happens.
pub fn allocate(medicine: &Medicine, requested_tablets: i64) -> CoreResult<Allocation> {
    if requested_tablets < 0 {
        return Err(CoreError::InvalidQuantity {
            quantity: requested_tablets,
        });
    }
    if requested_tablets == 0 {
        return Ok(Allocation::empty());
    }

    let per_strip = medicine.strip_size();

    // Exact numerator in (tablets × paise-per-strip); divided once at the end.
    let mut numerator: i128 = 0;
    let mut remaining = requested_tablets;
    let mut draws = Vec::new();

    if medicine.is_legacy() {
        numerator += requested_tablets as i128 * medicine.unit_price.cents() as i128;
        remaining = 0;
    } else {
        for batch in fefo_order(&medicine.batches) {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.quantity);
            numerator += take as i128 * batch.unit_price.cents() as i128;
            draws.push(BatchDraw {
                batch_id: batch.id.clone(),
                tablets: take,
            });
            remaining -= take;
        }
    }

    let fallback_tablets = remaining;
    if fallback_tablets > 0 {
        warn!(
            medicine = %medicine.name,
            requested = requested_tablets,
            fallback_tablets,
            "Batches cannot cover request, pricing remainder at medicine price"
        );
        numerator += fallback_tablets as i128 * medicine.unit_price.cents() as i128;
    }

    let total_cost = Money::from_ratio(numerator, per_strip);

    // total_cost / (requested / per_strip), kept in integer space.
    let unit_price_effective =
        Money::from_ratio(total_cost.cents() as i128 * per_strip as i128, requested_tablets);

    Ok(Allocation {
        requested: requested_tablets,
        unit_price_effective,
        total_cost,
        strip_qty: requested_tablets / per_strip,
        loose_qty: requested_tablets % per_strip,
        draws,
        fallback_tablets,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn paracetamol() -> Medicine {
        let mut med = Medicine::new("Paracetamol", 10, Money::from_cents(1500));
        med.batches = vec![
            Batch::new("B2", date(2025, 6, 1), 100, Money::from_cents(1200)),
            Batch::new("B1", date(2025, 1, 1), 20, Money::from_cents(1000)),
        ];
        med
    }

    #[test]
    fn test_spans_batches_in_expiry_order() {
        let med = paracetamol();
        let alloc = allocate(&med, 25).unwrap();

        assert_eq!(alloc.total_cost.cents(), 2600);
        assert_eq!(alloc.strip_qty, 2);
        assert_eq!(alloc.loose_qty, 5);
        assert_eq!(alloc.draws.len(), 2);
        assert_eq!(alloc.draws[0].batch_id, med.batches[1].id);
        assert_eq!(alloc.draws[0].tablets, 20);
        assert_eq!(alloc.draws[1].tablets, 5);
        assert_eq!(alloc.unit_price_effective.cents(), 1040);
        assert!(!alloc.used_fallback_price());
    }

    #[test]
    fn test_zero_request_is_free() {
        let alloc = allocate(&paracetamol(), 0).unwrap();
        assert_eq!(alloc, Allocation::empty());
    }

    #[test]
    fn test_negative_request_rejected() {
        let err = allocate(&paracetamol(), -1).unwrap_err();
        assert!(matches!(err, CoreError::InvalidQuantity { quantity: -1 }));
    }

    #[test]
    fn test_legacy_medicine_uses_scalar_price() {
        let mut med = Medicine::new("ORS Sachet", 1, Money::from_cents(2000));
        med.quantity = 50;
        let alloc = allocate(&med, 3).unwrap();
        assert_eq!(alloc.total_cost.cents(), 6000);
        assert_eq!(alloc.strip_qty, 3);
        assert_eq!(alloc.loose_qty, 0);
        assert!(alloc.draws.is_empty());
    }

    #[test]
    fn test_loose_tablet_pricing_rounds_once() {
        // 15 per strip at ₹10.00: 7 tablets = 466.67 paise → 467
        let mut med = Medicine::new("Metformin", 15, Money::from_cents(1000));
        med.quantity = 100;
        let alloc = allocate(&med, 7).unwrap();
        assert_eq!(alloc.total_cost.cents(), 467);
        assert_eq!(alloc.strip_qty, 0);
        assert_eq!(alloc.loose_qty, 7);
    }

    #[test]
    fn test_insufficient_batches_fall_back_to_medicine_price() {
        let med = paracetamol();
        let alloc = allocate(&med, 130).unwrap();
        // 20 @ 1000 + 100 @ 1200 + 10 @ 1500, all over 10
        assert_eq!(alloc.total_cost.cents(), (20 * 1000 + 100 * 1200 + 10 * 1500) / 10);
        assert_eq!(alloc.fallback_tablets, 10);
        assert!(alloc.used_fallback_price());
    }

    #[test]
    fn test_empty_batches_are_skipped() {
        let mut med = paracetamol();
        med.batches[1].quantity = 0;
        let alloc = allocate(&med, 5).unwrap();
        assert_eq!(alloc.draws[0].batch_id, med.batches[0].id);
        assert_eq!(alloc.total_cost.cents(), 600);
    }

    #[test]
    fn test_same_expiry_keeps_insertion_order() {
        let mut med = Medicine::new("Ibuprofen", 10, Money::from_cents(500));
        med.batches = vec![
            Batch::new("X", date(2026, 3, 1), 5, Money::from_cents(400)),
            Batch::new("Y", date(2026, 3, 1), 5, Money::from_cents(600)),
        ];
        let alloc = allocate(&med, 5).unwrap();
        assert_eq!(alloc.draws.len(), 1);
        assert_eq!(alloc.draws[0].batch_id, med.batches[0].id);
        assert_eq!(alloc.total_cost.cents(), 200);
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let med = paracetamol();
        assert_eq!(allocate(&med, 47).unwrap(), allocate(&med, 47).unwrap());
    }
}
