//! # Billing
//!
//! Pure bill math: line preparation, pricing, totals, bill numbers, and the
//! stock plans the ledger commits for create and update.
//!
//! ## Create vs Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  plan_create                                                            │
//! │    lines ──► allocate each against a working copy ──► consume FEFO      │
//! │    (two lines of one medicine see each other's draws)                   │
//! │                                                                         │
//! │  plan_update                                                            │
//! │    delta[m] = Σ original qty(m) − Σ new qty(m)                          │
//! │      delta > 0  ──► credit back    (batch the original line drew from)  │
//! │      delta < 0  ──► consume FEFO   (only the difference)                │
//! │      delta = 0  ──► untouched                                           │
//! │    unchanged lines keep their original pricing                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every check runs before the first mutation of the working copy, so a
//! failed plan leaves nothing half-applied. The ledger runs these plans
//! inside one storage transaction.

use std::collections::{BTreeMap, HashMap};

use crate::allocation::{allocate, Allocation};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::stock::{consume_fefo, credit};
use crate::types::{Bill, BillItem, BillLineInput, DiscountRate, Medicine};
use crate::{BILL_NUMBER_PREFIX, MAX_BILL_LINES};

// =============================================================================
// Bill Numbers
// =============================================================================

/// Formats a counter value as `BILL-0001`.
///
/// Values beyond four digits keep growing (`BILL-10000`).
pub fn format_bill_number(sequence: i64) -> String {
    format!("{}{:04}", BILL_NUMBER_PREFIX, sequence)
}

/// Parses `BILL-0042` back to 42.
pub fn parse_bill_number(bill_number: &str) -> Option<i64> {
    bill_number
        .strip_prefix(BILL_NUMBER_PREFIX)
        .and_then(|digits| digits.parse().ok())
}

// =============================================================================
// Discount & Totals
// =============================================================================

/// Interprets a caller-supplied discount percentage.
///
/// Out-of-range values are clamped to [0, 100]. NaN and infinities are
/// rejected.
pub fn resolve_discount(percent: f64) -> CoreResult<DiscountRate> {
    DiscountRate::clamped(percent).ok_or_else(|| CoreError::InvalidDiscount {
        reason: format!("{} is not a finite percentage", percent),
    })
}

/// Subtotal, discount and grand total of a list of items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillTotals {
    pub subtotal: Money,
    pub discount_percent: f64,
    pub discount_amount: Money,
    pub grand_total: Money,
}

impl BillTotals {
    /// ```rust
    /// use pharma_core::billing::BillTotals;
    /// use pharma_core::types::DiscountRate;
    /// use pharma_core::Money;
    ///
    /// let totals = BillTotals::from_subtotal(Money::from_cents(50000), DiscountRate::from_bps(1000));
    /// assert_eq!(totals.discount_amount.cents(), 5000);
    /// assert_eq!(totals.grand_total.cents(), 45000);
    /// ```
    pub fn from_subtotal(subtotal: Money, rate: DiscountRate) -> Self {
        let discount_amount = subtotal.percentage(rate);
        BillTotals {
            subtotal,
            discount_percent: rate.percent(),
            discount_amount,
            grand_total: (subtotal - discount_amount).clamp_non_negative(),
        }
    }

    pub fn compute(items: &[BillItem], rate: DiscountRate) -> Self {
        BillTotals::from_subtotal(items.iter().map(|i| i.total).sum(), rate)
    }
}

/// True when the bill's stored totals agree with its items and discount.
pub fn totals_consistent(bill: &Bill) -> bool {
    let expected = BillTotals::compute(&bill.items, bill.discount_rate());
    bill.subtotal == expected.subtotal
        && bill.discount_amount == expected.discount_amount
        && bill.grand_total == expected.grand_total
        && bill.items.iter().all(|item| {
            item.strip_qty * item.tablets_per_strip.max(1) + item.loose_qty == item.quantity
        })
}

// =============================================================================
// Lines
// =============================================================================

/// Validates and filters cart lines for a new bill.
///
/// ## Errors
/// * `InvalidQuantity` - any line is negative
/// * `BillTooLarge` - more than [`MAX_BILL_LINES`] lines
/// * `EmptyBill` - no line has a positive quantity
pub fn prepare_lines(lines: &[BillLineInput]) -> CoreResult<Vec<BillLineInput>> {
    check_line_quantities(lines)?;

    let kept: Vec<BillLineInput> = lines.iter().filter(|l| l.quantity > 0).cloned().collect();
    if kept.is_empty() {
        return Err(CoreError::EmptyBill);
    }

    Ok(kept)
}

fn check_line_quantities(lines: &[BillLineInput]) -> CoreResult<()> {
    if lines.len() > MAX_BILL_LINES {
        return Err(CoreError::BillTooLarge {
            max: MAX_BILL_LINES,
        });
    }
    if let Some(bad) = lines.iter().find(|l| l.quantity < 0) {
        return Err(CoreError::InvalidQuantity {
            quantity: bad.quantity,
        });
    }
    Ok(())
}

/// Builds a bill item from an allocation. Name and strip size are frozen.
pub fn item_from_allocation(
    medicine: &Medicine,
    allocation: &Allocation,
    batch_id: Option<String>,
) -> BillItem {
    BillItem {
        medicine_id: medicine.id.clone(),
        batch_id,
        medicine_name: medicine.name.clone(),
        tablets_per_strip: medicine.strip_size(),
        quantity: allocation.requested,
        unit_price: allocation.unit_price_effective,
        strip_qty: allocation.strip_qty,
        loose_qty: allocation.loose_qty,
        total: allocation.total_cost,
    }
}

/// Prices and draws one line from a working medicine.
fn take_line(medicine: &mut Medicine, quantity: i64) -> CoreResult<BillItem> {
    let allocation = allocate(medicine, quantity)?;
    let first_batch = consume_fefo(medicine, quantity)?;
    Ok(item_from_allocation(medicine, &allocation, first_batch))
}

// =============================================================================
// Stock Plans
// =============================================================================

/// Net stock movement of one medicine caused by a bill operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub medicine_id: String,
    pub quantity_before: i64,
    pub quantity_after: i64,
}

/// Items to persist plus the medicines whose stock changed.
///
/// The mutated medicines themselves live in the working map the plan was
/// computed against.
#[derive(Debug, Clone, PartialEq)]
pub struct StockPlan {
    pub items: Vec<BillItem>,
    pub adjustments: Vec<StockAdjustment>,
}

fn working_medicine<'a>(
    working: &'a mut HashMap<String, Medicine>,
    medicine_id: &str,
) -> CoreResult<&'a mut Medicine> {
    working
        .get_mut(medicine_id)
        .ok_or_else(|| CoreError::not_found("Medicine", medicine_id))
}

/// Plans a new bill against `working`.
///
/// `working` must contain every medicine referenced by `lines`. On success
/// the touched medicines in `working` hold their post-sale batches.
///
/// ## Errors
/// Everything [`prepare_lines`] returns, plus `NotFound` and
/// `InsufficientStock`. On error `working` is unchanged.
pub fn plan_create(
    lines: &[BillLineInput],
    working: &mut HashMap<String, Medicine>,
) -> CoreResult<StockPlan> {
    let lines = prepare_lines(lines)?;

    // Aggregate per medicine so duplicate lines are checked together.
    let mut requested: Vec<(String, i64)> = Vec::new();
    for line in &lines {
        match requested.iter_mut().find(|(id, _)| *id == line.medicine_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => requested.push((line.medicine_id.clone(), line.quantity)),
        }
    }

    for (medicine_id, qty) in &requested {
        let medicine = working_medicine(working, medicine_id)?;
        if medicine.available() < *qty {
            return Err(CoreError::InsufficientStock {
                medicine: medicine.name.clone(),
                available: medicine.available(),
                requested: *qty,
            });
        }
    }

    let adjustments_before: Vec<(String, i64)> = requested
        .iter()
        .map(|(id, _)| (id.clone(), working[id].quantity))
        .collect();

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let medicine = working_medicine(working, &line.medicine_id)?;
        items.push(take_line(medicine, line.quantity)?);
    }

    let adjustments = adjustments_before
        .into_iter()
        .map(|(id, before)| StockAdjustment {
            quantity_after: working[&id].quantity,
            medicine_id: id,
            quantity_before: before,
        })
        .collect();

    Ok(StockPlan { items, adjustments })
}

/// Net stock delta per medicine: `+original − new`.
///
/// A positive value means stock goes back on the shelf.
pub fn reconcile(original: &[BillItem], new_lines: &[BillLineInput]) -> BTreeMap<String, i64> {
    let mut delta: BTreeMap<String, i64> = BTreeMap::new();
    for item in original {
        *delta.entry(item.medicine_id.clone()).or_insert(0) += item.quantity;
    }
    for line in new_lines {
        *delta.entry(line.medicine_id.clone()).or_insert(0) -= line.quantity;
    }
    delta
}

fn original_quantity(original: &[BillItem], medicine_id: &str) -> i64 {
    original
        .iter()
        .filter(|i| i.medicine_id == medicine_id)
        .map(|i| i.quantity)
        .sum()
}

fn original_batch<'a>(original: &'a [BillItem], medicine_id: &str) -> Option<&'a str> {
    original
        .iter()
        .filter(|i| i.medicine_id == medicine_id)
        .find_map(|i| i.batch_id.as_deref())
}

/// Plans an edit from `original` to `new_lines` against `working`.
///
/// `working` must contain every medicine with a non-zero delta and every
/// medicine of a line that has to be re-priced. Lines identical to an
/// original line (same medicine and quantity) keep their original item;
/// other lines are priced FEFO against current stock plus the original
/// quantity not held by a kept line.
///
/// Zero-quantity lines are dropped from the items but still take part in
/// reconciliation. An edit to an empty item list is allowed and returns all
/// stock.
///
/// ## Errors
/// * `InvalidQuantity` - a new line is negative
/// * `NotFound` - a needed medicine is missing from `working`
/// * `InsufficientStock` - `available` is current stock plus the original
///   quantity of that medicine
///
/// On error `working` is unchanged.
pub fn plan_update(
    original: &[BillItem],
    new_lines: &[BillLineInput],
    working: &mut HashMap<String, Medicine>,
) -> CoreResult<StockPlan> {
    check_line_quantities(new_lines)?;

    let delta = reconcile(original, new_lines);

    // Check everything first.
    for (medicine_id, change) in delta.iter().filter(|(_, d)| **d != 0) {
        let medicine = working_medicine(working, medicine_id)?;
        if medicine.available() + change < 0 {
            let original_qty = original_quantity(original, medicine_id);
            return Err(CoreError::InsufficientStock {
                medicine: medicine.name.clone(),
                available: medicine.available() + original_qty,
                requested: original_qty - change,
            });
        }
    }

    // Work out which lines keep their original pricing.
    let mut used = vec![false; original.len()];
    let mut kept: Vec<Option<BillItem>> = Vec::with_capacity(new_lines.len());
    for line in new_lines.iter().filter(|l| l.quantity > 0) {
        let matched = original.iter().enumerate().find(|(idx, item)| {
            !used[*idx] && item.medicine_id == line.medicine_id && item.quantity == line.quantity
        });
        match matched {
            Some((idx, item)) => {
                used[idx] = true;
                kept.push(Some(item.clone()));
            }
            None => kept.push(None),
        }
    }

    // Pricing copies: stock as it stood before this bill, minus what the
    // kept lines still hold.
    let mut pricing: HashMap<String, Medicine> = HashMap::new();
    for (line, keep) in new_lines.iter().filter(|l| l.quantity > 0).zip(&kept) {
        if keep.is_none() && !pricing.contains_key(&line.medicine_id) {
            let mut copy = working_medicine(working, &line.medicine_id)?.clone();
            for (item, _) in original
                .iter()
                .zip(&used)
                .filter(|(item, used)| !**used && item.medicine_id == line.medicine_id)
            {
                credit(&mut copy, item.quantity, item.batch_id.as_deref());
            }
            pricing.insert(line.medicine_id.clone(), copy);
        }
    }

    let mut items = Vec::with_capacity(kept.len());
    for (line, keep) in new_lines.iter().filter(|l| l.quantity > 0).zip(kept) {
        let item = match keep {
            Some(item) => item,
            None => {
                let copy = working_medicine(&mut pricing, &line.medicine_id)?;
                take_line(copy, line.quantity)?
            }
        };
        items.push(item);
    }

    // Apply the deltas.
    let mut adjustments = Vec::new();
    for (medicine_id, change) in delta.into_iter().filter(|(_, d)| *d != 0) {
        let preferred = original_batch(original, &medicine_id).map(str::to_string);
        let medicine = working_medicine(working, &medicine_id)?;
        let before = medicine.quantity;
        if change > 0 {
            credit(medicine, change, preferred.as_deref());
        } else {
            consume_fefo(medicine, -change)?;
        }
        adjustments.push(StockAdjustment {
            medicine_id,
            quantity_before: before,
            quantity_after: medicine.quantity,
        });
    }

    Ok(StockPlan { items, adjustments })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::normalize;
    use crate::types::Batch;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn legacy(name: &str, tps: i64, price: i64, qty: i64) -> Medicine {
        let mut med = Medicine::new(name, tps, Money::from_cents(price));
        med.quantity = qty;
        med
    }

    fn batched() -> Medicine {
        let mut med = Medicine::new("Paracetamol", 10, Money::from_cents(1200));
        med.batches = vec![
            Batch::new("B1", date(2025, 1, 1), 20, Money::from_cents(1000)),
            Batch::new("B2", date(2025, 6, 1), 100, Money::from_cents(1200)),
        ];
        normalize(med)
    }

    fn stock(meds: Vec<Medicine>) -> HashMap<String, Medicine> {
        meds.into_iter().map(|m| (m.id.clone(), m)).collect()
    }

    #[test]
    fn test_bill_number_format() {
        assert_eq!(format_bill_number(1), "BILL-0001");
        assert_eq!(format_bill_number(42), "BILL-0042");
        assert_eq!(format_bill_number(12345), "BILL-12345");
        assert_eq!(parse_bill_number("BILL-0042"), Some(42));
        assert_eq!(parse_bill_number("INV-1"), None);
    }

    #[test]
    fn test_discount_totals() {
        // 10% off ₹500.00
        let totals = BillTotals::from_subtotal(Money::from_cents(50000), resolve_discount(10.0).unwrap());
        assert_eq!(totals.discount_amount.cents(), 5000);
        assert_eq!(totals.grand_total.cents(), 45000);

        let clamped = BillTotals::from_subtotal(Money::from_cents(50000), resolve_discount(150.0).unwrap());
        assert_eq!(clamped.grand_total, Money::zero());
        assert_eq!(clamped.discount_percent, 100.0);

        assert!(matches!(resolve_discount(f64::NAN), Err(CoreError::InvalidDiscount { .. })));
    }

    #[test]
    fn test_prepare_lines() {
        let lines = vec![BillLineInput::new("a", 0), BillLineInput::new("b", 3)];
        assert_eq!(prepare_lines(&lines).unwrap().len(), 1);

        assert!(matches!(
            prepare_lines(&[BillLineInput::new("a", 0)]),
            Err(CoreError::EmptyBill)
        ));
        assert!(matches!(
            prepare_lines(&[BillLineInput::new("a", -2)]),
            Err(CoreError::InvalidQuantity { quantity: -2 })
        ));
        assert!(matches!(prepare_lines(&[]), Err(CoreError::EmptyBill)));
    }

    #[test]
    fn test_plan_create_spans_batches() {
        let med = batched();
        let id = med.id.clone();
        let mut working = stock(vec![med]);

        let plan = plan_create(&[BillLineInput::new(&id, 25)], &mut working).unwrap();
        assert_eq!(plan.items[0].total.cents(), 2600);
        assert_eq!((plan.items[0].strip_qty, plan.items[0].loose_qty), (2, 5));
        assert_eq!(plan.items[0].batch_id.as_deref(), Some(working[&id].batches[0].id.as_str()));
        assert_eq!(working[&id].quantity, 95);
        assert_eq!(
            plan.adjustments,
            vec![StockAdjustment { medicine_id: id, quantity_before: 120, quantity_after: 95 }]
        );
    }

    #[test]
    fn test_plan_create_insufficient_is_atomic() {
        let a = legacy("Amoxicillin", 10, 800, 10);
        let b = legacy("Cetirizine", 10, 300, 5);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let mut working = stock(vec![a, b]);
        let before = working.clone();

        let err = plan_create(
            &[BillLineInput::new(&a_id, 5), BillLineInput::new(&b_id, 10)],
            &mut working,
        )
        .unwrap_err();

        match err {
            CoreError::InsufficientStock { medicine, available, requested } => {
                assert_eq!(medicine, "Cetirizine");
                assert_eq!(available, 5);
                assert_eq!(requested, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(working, before);
    }

    #[test]
    fn test_plan_create_duplicate_lines_aggregate() {
        let med = legacy("ORS", 1, 2000, 10);
        let id = med.id.clone();
        let mut working = stock(vec![med]);

        let err = plan_create(
            &[BillLineInput::new(&id, 6), BillLineInput::new(&id, 6)],
            &mut working,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 10, requested: 12, .. }));

        let plan = plan_create(
            &[BillLineInput::new(&id, 4), BillLineInput::new(&id, 6)],
            &mut working,
        )
        .unwrap();
        assert_eq!(plan.items.len(), 2);
        assert_eq!(working[&id].quantity, 0);
        assert_eq!(plan.adjustments.len(), 1);
    }

    #[test]
    fn test_plan_create_unknown_medicine() {
        let mut working = HashMap::new();
        let err = plan_create(&[BillLineInput::new("missing", 1)], &mut working).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_plan_update_reduces_quantity() {
        // Original bill sold 10 of a medicine now at 50 on hand.
        let med = legacy("Azithromycin", 10, 1000, 60);
        let id = med.id.clone();
        let mut working = stock(vec![med]);
        let original = plan_create(&[BillLineInput::new(&id, 10)], &mut working).unwrap().items;
        assert_eq!(working[&id].quantity, 50);

        let plan = plan_update(&original, &[BillLineInput::new(&id, 4)], &mut working).unwrap();
        assert_eq!(working[&id].quantity, 56);
        assert_eq!(plan.items[0].quantity, 4);
        assert_eq!(plan.items[0].total.cents(), 400);
    }

    #[test]
    fn test_plan_update_increase_beyond_stock_fails() {
        let med = legacy("Azithromycin", 10, 1000, 12);
        let id = med.id.clone();
        let mut working = stock(vec![med]);
        let original = plan_create(&[BillLineInput::new(&id, 10)], &mut working).unwrap().items;
        let before = working.clone();

        let err = plan_update(&original, &[BillLineInput::new(&id, 15)], &mut working).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 12, requested: 15, .. }));
        assert_eq!(working, before);
    }

    #[test]
    fn test_plan_update_identical_is_noop() {
        let med = batched();
        let id = med.id.clone();
        let mut working = stock(vec![med]);
        let original = plan_create(&[BillLineInput::new(&id, 25)], &mut working).unwrap().items;
        let before = working.clone();

        let lines: Vec<BillLineInput> = original.iter().map(BillItem::as_line).collect();
        let plan = plan_update(&original, &lines, &mut working).unwrap();

        assert_eq!(working, before);
        assert!(plan.adjustments.is_empty());
        assert_eq!(plan.items, original);
    }

    #[test]
    fn test_plan_update_credits_original_batch() {
        let med = batched();
        let id = med.id.clone();
        let mut working = stock(vec![med]);
        let original = plan_create(&[BillLineInput::new(&id, 25)], &mut working).unwrap().items;
        // B1 drained, B2 at 95
        plan_update(&original, &[BillLineInput::new(&id, 15)], &mut working).unwrap();

        let med = &working[&id];
        assert_eq!(med.batches[0].quantity, 10);
        assert_eq!(med.batches[1].quantity, 95);
        assert_eq!(med.quantity, 105);
    }

    #[test]
    fn test_plan_update_reprices_against_pre_bill_stock() {
        let med = batched();
        let id = med.id.clone();
        let mut working = stock(vec![med]);
        let original = plan_create(&[BillLineInput::new(&id, 10)], &mut working).unwrap().items;
        assert_eq!(original[0].total.cents(), 1000);

        // Raising to 25 should price as if the bill were new: 20 @ B1, 5 @ B2.
        let plan = plan_update(&original, &[BillLineInput::new(&id, 25)], &mut working).unwrap();
        assert_eq!(plan.items[0].total.cents(), 2600);
        assert_eq!(working[&id].quantity, 95);
    }

    #[test]
    fn test_plan_update_reprice_ignores_stock_held_by_kept_lines() {
        let med = batched();
        let id = med.id.clone();
        let mut working = stock(vec![med]);
        // 20 drains B1 at 10.00, 10 more come from B2 at 12.00
        let original = plan_create(
            &[BillLineInput::new(&id, 20), BillLineInput::new(&id, 10)],
            &mut working,
        )
        .unwrap()
        .items;
        assert_eq!(original[1].total.cents(), 1200);

        // The first line is kept, so B1 stays sold and 15 price from B2.
        let plan = plan_update(
            &original,
            &[BillLineInput::new(&id, 20), BillLineInput::new(&id, 15)],
            &mut working,
        )
        .unwrap();
        assert_eq!(plan.items[0], original[0]);
        assert_eq!(plan.items[1].total.cents(), 1800);
        assert_eq!(working[&id].batches[0].quantity, 0);
        assert_eq!(working[&id].quantity, 85);
    }

    #[test]
    fn test_plan_update_zero_line_returns_stock() {
        let a = legacy("Amoxicillin", 10, 800, 20);
        let b = legacy("Cetirizine", 10, 300, 20);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let mut working = stock(vec![a, b]);
        let original = plan_create(
            &[BillLineInput::new(&a_id, 5), BillLineInput::new(&b_id, 5)],
            &mut working,
        )
        .unwrap()
        .items;

        let plan = plan_update(
            &original,
            &[BillLineInput::new(&a_id, 5), BillLineInput::new(&b_id, 0)],
            &mut working,
        )
        .unwrap();

        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0], original[0]);
        assert_eq!(working[&b_id].quantity, 20);
        assert_eq!(working[&a_id].quantity, 15);
    }

    #[test]
    fn test_reconcile_nets_per_medicine() {
        let item = |id: &str, qty| BillItem {
            medicine_id: id.to_string(),
            batch_id: None,
            medicine_name: id.to_string(),
            tablets_per_strip: 1,
            quantity: qty,
            unit_price: Money::zero(),
            strip_qty: qty,
            loose_qty: 0,
            total: Money::zero(),
        };
        let delta = reconcile(
            &[item("a", 10), item("b", 3)],
            &[BillLineInput::new("a", 4), BillLineInput::new("c", 2)],
        );
        assert_eq!(delta["a"], 6);
        assert_eq!(delta["b"], 3);
        assert_eq!(delta["c"], -2);
    }

    #[test]
    fn test_totals_consistent() {
        let med = batched();
        let id = med.id.clone();
        let mut working = stock(vec![med]);
        let items = plan_create(&[BillLineInput::new(&id, 25)], &mut working).unwrap().items;
        let totals = BillTotals::compute(&items, DiscountRate::from_bps(500));
        let now = chrono::Utc::now();
        let mut bill = Bill {
            id: "b".into(),
            bill_number: format_bill_number(1),
            customer: Default::default(),
            items,
            subtotal: totals.subtotal,
            discount_percent: totals.discount_percent,
            discount_amount: totals.discount_amount,
            grand_total: totals.grand_total,
            created_at: now,
            updated_at: now,
        };
        assert!(totals_consistent(&bill));
        bill.grand_total += Money::from_cents(1);
        assert!(!totals_consistent(&bill));
    }
}
