//! Property tests for the stock and pricing rules.
//!
//! - FEFO determinism: the same snapshot always prices the same way
//! - Normalizer invariant: derived scalars always match the batches
//! - Consume never drives a batch negative and never half-applies
//! - Edit idempotence: re-submitting a bill's own lines is a stock no-op

use std::collections::HashMap;

use chrono::NaiveDate;
use proptest::prelude::*;

use pharma_core::allocation::allocate;
use pharma_core::billing::{plan_create, plan_update};
use pharma_core::stock::{consume_fefo, normalize};
use pharma_core::{Batch, BillItem, BillLineInput, Medicine, Money};

// ============================================================================
// Strategies
// ============================================================================

fn batch_strategy() -> impl Strategy<Value = Batch> {
    (0u32..720, 0i64..200, 100i64..20_000).prop_map(|(days, qty, price)| {
        let expiry = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Duration::days(days as i64);
        Batch::new(format!("L{days}"), expiry, qty, Money::from_cents(price))
    })
}

fn medicine_strategy() -> impl Strategy<Value = Medicine> {
    (
        1i64..=30,
        100i64..20_000,
        prop::collection::vec(batch_strategy(), 0..6),
        0i64..300,
    )
        .prop_map(|(tps, price, batches, legacy_qty)| {
            let mut med = Medicine::new("Prop", tps, Money::from_cents(price));
            if batches.is_empty() {
                med.quantity = legacy_qty;
            }
            med.batches = batches;
            normalize(med)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Same snapshot, same allocation.
    #[test]
    fn prop_allocation_is_deterministic(med in medicine_strategy(), req in 0i64..500) {
        prop_assert_eq!(allocate(&med, req).unwrap(), allocate(&med, req).unwrap());
    }

    /// strip_qty × tps + loose_qty reconstructs the request.
    #[test]
    fn prop_strip_split_reconstructs(med in medicine_strategy(), req in 0i64..500) {
        let alloc = allocate(&med, req).unwrap();
        prop_assert_eq!(alloc.strip_qty * med.strip_size() + alloc.loose_qty, req);
        prop_assert!(alloc.loose_qty < med.strip_size());
    }

    /// Within stock, draws cover the request exactly without fallback.
    #[test]
    fn prop_draws_cover_request(med in medicine_strategy(), req in 0i64..500) {
        prop_assume!(!med.is_legacy() && req <= med.quantity);
        let alloc = allocate(&med, req).unwrap();
        prop_assert!(!alloc.used_fallback_price());
        prop_assert_eq!(alloc.draws.iter().map(|d| d.tablets).sum::<i64>(), req);
    }

    /// quantity == Σ batches and expiry == min expiry after normalize.
    #[test]
    fn prop_normalizer_invariant(med in medicine_strategy()) {
        let med = normalize(med);
        if !med.is_legacy() {
            prop_assert_eq!(med.quantity, med.batches.iter().map(|b| b.quantity).sum::<i64>());
            prop_assert_eq!(med.expiry_date, med.batches.iter().map(|b| b.expiry_date).min());
        }
        prop_assert_eq!(normalize(med.clone()), med);
    }

    /// Consume either succeeds keeping every batch ≥ 0, or leaves the medicine untouched.
    #[test]
    fn prop_consume_never_negative(med in medicine_strategy(), req in 0i64..500) {
        let mut working = med.clone();
        match consume_fefo(&mut working, req) {
            Ok(_) => {
                prop_assert!(working.batches.iter().all(|b| b.quantity >= 0));
                prop_assert!(working.quantity >= 0);
                prop_assert_eq!(working.quantity, med.quantity - req);
            }
            Err(_) => prop_assert_eq!(working, med),
        }
    }

    /// Updating a bill with its own lines changes nothing.
    #[test]
    fn prop_update_with_same_lines_is_noop(
        meds in prop::collection::vec(medicine_strategy(), 1..4),
        picks in prop::collection::vec((0usize..4, 1i64..40), 1..6),
    ) {
        let mut working: HashMap<String, Medicine> =
            meds.iter().map(|m| (m.id.clone(), m.clone())).collect();
        let lines: Vec<BillLineInput> = picks
            .iter()
            .map(|(idx, qty)| BillLineInput::new(meds[idx % meds.len()].id.clone(), *qty))
            .collect();

        if let Ok(plan) = plan_create(&lines, &mut working) {
            let before = working.clone();
            let resubmitted: Vec<BillLineInput> = plan.items.iter().map(BillItem::as_line).collect();
            let update = plan_update(&plan.items, &resubmitted, &mut working).unwrap();

            prop_assert_eq!(&working, &before);
            prop_assert!(update.adjustments.is_empty());
            prop_assert_eq!(update.items, plan.items);
        }
    }
}
