//! Property tests for the bill ledger against a real (in-memory) database.
//!
//! - Stock never goes negative, whatever mix of carts is attempted
//! - Every committed bill has consistent totals
//! - Bill numbers are strictly increasing and gapless, failed checkouts included
//! - Re-submitting a bill's own items is a stock no-op

use chrono::NaiveDate;
use proptest::prelude::*;
use tokio::runtime::Runtime;

use pharma_core::billing::{parse_bill_number, totals_consistent};
use pharma_core::{Batch, BillItem, BillLineInput, CustomerMeta, Medicine, Money};
use pharma_db::{Database, DbConfig};

// ============================================================================
// Strategies
// ============================================================================

/// (tablets_per_strip, [(expiry offset days, qty, strip price)], legacy qty)
type MedicineShape = (i64, Vec<(i64, i64, i64)>, i64);

fn medicine_shape() -> impl Strategy<Value = MedicineShape> {
    (
        prop_oneof![Just(1i64), Just(10), Just(15)],
        prop::collection::vec((0i64..400, 0i64..60, 500i64..5_000), 0..4),
        0i64..60,
    )
}

/// Carts as (medicine index, tablets).
fn carts() -> impl Strategy<Value = Vec<Vec<(usize, i64)>>> {
    prop::collection::vec(prop::collection::vec((0usize..3, 0i64..40), 1..4), 1..8)
}

fn build(shape: &MedicineShape, idx: usize) -> Medicine {
    let (tps, batches, legacy_qty) = shape;
    let mut med = Medicine::new(format!("Medicine {idx}"), *tps, Money::from_cents(1_000));
    let base = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    if batches.is_empty() {
        med.quantity = *legacy_qty;
    }
    for (n, (offset, qty, price)) in batches.iter().enumerate() {
        med.batches.push(Batch::new(
            format!("LOT-{n}"),
            base + chrono::Duration::days(*offset),
            *qty,
            Money::from_cents(*price),
        ));
    }
    med
}

async fn stocked_db(shapes: &[MedicineShape]) -> (Database, Vec<String>) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let mut ids = Vec::new();
    for (idx, shape) in shapes.iter().enumerate() {
        let med = db.medicines().add(build(shape, idx)).await.unwrap();
        ids.push(med.id);
    }
    (db, ids)
}

fn lines(ids: &[String], cart: &[(usize, i64)]) -> Vec<BillLineInput> {
    cart.iter()
        .map(|(idx, qty)| BillLineInput::new(&ids[*idx], *qty))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Checkouts either commit fully or not at all, stock stays non-negative,
    /// totals are consistent and numbers are gapless.
    #[test]
    fn prop_checkouts_keep_ledger_consistent(
        shapes in prop::collection::vec(medicine_shape(), 3),
        carts in carts(),
        discount in 0.0f64..100.0,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let (db, ids) = stocked_db(&shapes).await;
            let mut committed = 0i64;

            for cart in &carts {
                let before: Vec<i64> = {
                    let mut q = Vec::new();
                    for id in &ids {
                        q.push(db.medicines().get(id).await.unwrap().unwrap().quantity);
                    }
                    q
                };

                match db.bills().create(&lines(&ids, cart), discount, CustomerMeta::default()).await {
                    Ok(bill) => {
                        committed += 1;
                        prop_assert_eq!(parse_bill_number(&bill.bill_number), Some(committed));
                        prop_assert!(totals_consistent(&bill));
                        prop_assert!(bill.grand_total >= Money::zero());

                        for (idx, id) in ids.iter().enumerate() {
                            let sold: i64 = cart.iter().filter(|(i, _)| *i == idx).map(|(_, q)| q).sum();
                            let after = db.medicines().get(id).await.unwrap().unwrap();
                            prop_assert_eq!(after.quantity, before[idx] - sold);
                        }
                    }
                    Err(err) => {
                        prop_assert!(
                            err.is_insufficient_stock()
                                || matches!(err, pharma_db::DbError::Core(pharma_core::CoreError::EmptyBill))
                        );
                        for (idx, id) in ids.iter().enumerate() {
                            let after = db.medicines().get(id).await.unwrap().unwrap();
                            prop_assert_eq!(after.quantity, before[idx]);
                        }
                    }
                }

                for id in &ids {
                    let med = db.medicines().get(id).await.unwrap().unwrap();
                    prop_assert!(med.quantity >= 0);
                    prop_assert!(med.batches.iter().all(|b| b.quantity >= 0));
                }
            }

            prop_assert_eq!(db.bills().count().await.unwrap(), committed);
            Ok(())
        })?;
    }

    /// Editing a bill to its own items leaves stock untouched.
    #[test]
    fn prop_edit_with_original_items_is_noop(
        shapes in prop::collection::vec(medicine_shape(), 3),
        cart in prop::collection::vec((0usize..3, 1i64..20), 1..4),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let (db, ids) = stocked_db(&shapes).await;
            let Ok(bill) = db.bills().create(&lines(&ids, &cart), 0.0, CustomerMeta::default()).await else {
                return Ok(());
            };

            let before = db.medicines().list().await.unwrap();
            let same: Vec<BillLineInput> = bill.items.iter().map(BillItem::as_line).collect();
            let edited = db
                .bills()
                .update(&bill.id, &same, 0.0, &bill.items, CustomerMeta::default())
                .await
                .unwrap();
            let after = db.medicines().list().await.unwrap();

            prop_assert_eq!(&edited.items, &bill.items);
            for (b, a) in before.iter().zip(&after) {
                prop_assert_eq!(&b.batches, &a.batches);
                prop_assert_eq!(b.quantity, a.quantity);
            }
            Ok(())
        })?;
    }

    /// Any edit either applies the net delta or leaves everything as it was.
    #[test]
    fn prop_edit_applies_net_delta(
        shapes in prop::collection::vec(medicine_shape(), 3),
        cart in prop::collection::vec((0usize..3, 1i64..20), 1..4),
        revised in prop::collection::vec((0usize..3, 0i64..40), 0..4),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let (db, ids) = stocked_db(&shapes).await;
            let Ok(bill) = db.bills().create(&lines(&ids, &cart), 0.0, CustomerMeta::default()).await else {
                return Ok(());
            };

            let mut before = Vec::new();
            for id in &ids {
                before.push(db.medicines().get(id).await.unwrap().unwrap().quantity);
            }

            let result = db
                .bills()
                .update(&bill.id, &lines(&ids, &revised), 0.0, &bill.items, CustomerMeta::default())
                .await;

            for (idx, id) in ids.iter().enumerate() {
                let now = db.medicines().get(id).await.unwrap().unwrap().quantity;
                prop_assert!(now >= 0);
                match &result {
                    Ok(edited) => {
                        let old: i64 = cart.iter().filter(|(i, _)| *i == idx).map(|(_, q)| q).sum();
                        let new: i64 = revised.iter().filter(|(i, _)| *i == idx).map(|(_, q)| q).sum();
                        prop_assert_eq!(now, before[idx] + old - new);
                        prop_assert!(totals_consistent(edited));
                        prop_assert_eq!(&edited.bill_number, &bill.bill_number);
                    }
                    Err(err) => {
                        prop_assert!(err.is_insufficient_stock());
                        prop_assert_eq!(now, before[idx]);
                    }
                }
            }
            Ok(())
        })?;
    }
}
