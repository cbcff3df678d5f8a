//! # Stock Normalizer
//!
//! Keeps a medicine's scalar stock fields consistent with its batches, and
//! provides the batch mutations every write path goes through.
//!
//! ## Derived Fields
//! ```text
//! batches: [B1 exp 2025-01 qty 20] [B2 exp 2025-06 qty 100]
//!              │
//!              ▼ normalize
//! quantity     = 120          (Σ batch.quantity)
//! expiry_date  = 2025-01-01   (min batch.expiry_date)
//! batch_number = ""           (only set when exactly one batch exists)
//! ```
//!
//! A medicine with no batches is in legacy mode: its scalars are left
//! untouched and are the source of truth.

use crate::allocation::fefo_order;
use crate::error::{CoreError, CoreResult};
use crate::types::{Batch, Medicine};

/// Recomputes the derived scalar fields from the batches.
///
/// Idempotent. No-op for legacy medicines.
pub fn normalize(mut medicine: Medicine) -> Medicine {
    normalize_in_place(&mut medicine);
    medicine
}

/// In-place form of [`normalize`].
pub fn normalize_in_place(medicine: &mut Medicine) {
    if medicine.batches.is_empty() {
        return;
    }

    medicine.quantity = medicine.batches.iter().map(|b| b.quantity).sum();
    medicine.expiry_date = medicine.batches.iter().map(|b| b.expiry_date).min();
    medicine.batch_number = match medicine.batches.as_slice() {
        [only] => only.batch_number.clone(),
        _ => String::new(),
    };
}

/// Removes `tablets` from the medicine FEFO.
///
/// Draws in the same order as [`crate::allocation::allocate`], so a priced
/// allocation and the committed decrement always agree. Legacy medicines
/// decrement the scalar quantity.
///
/// Returns the id of the first batch drawn from.
///
/// ## Errors
/// * `InvalidQuantity` - `tablets` is negative
/// * `InsufficientStock` - the medicine holds fewer than `tablets`; the
///   medicine is left unchanged
pub fn consume_fefo(medicine: &mut Medicine, tablets: i64) -> CoreResult<Option<String>> {
    if tablets < 0 {
        return Err(CoreError::InvalidQuantity { quantity: tablets });
    }
    if tablets == 0 {
        return Ok(None);
    }

    let available = if medicine.is_legacy() {
        medicine.quantity
    } else {
        medicine.batches.iter().map(|b| b.quantity.max(0)).sum()
    };
    if available < tablets {
        return Err(CoreError::InsufficientStock {
            medicine: medicine.name.clone(),
            available,
            requested: tablets,
        });
    }

    if medicine.is_legacy() {
        medicine.quantity -= tablets;
        return Ok(None);
    }

    let order: Vec<String> = fefo_order(&medicine.batches)
        .into_iter()
        .map(|b| b.id.clone())
        .collect();

    let mut remaining = tablets;
    let mut first = None;
    for id in order {
        if remaining == 0 {
            break;
        }
        if let Some(batch) = medicine.batches.iter_mut().find(|b| b.id == id) {
            let take = remaining.min(batch.quantity);
            batch.quantity -= take;
            remaining -= take;
            if first.is_none() {
                first = Some(id);
            }
        }
    }

    normalize_in_place(medicine);
    Ok(first)
}

/// Returns `tablets` to stock.
///
/// Target, in order of preference:
/// 1. `preferred_batch` if it still exists on the medicine
/// 2. the earliest-expiring batch (zero-quantity batches included)
/// 3. the legacy scalar quantity
pub fn credit(medicine: &mut Medicine, tablets: i64, preferred_batch: Option<&str>) {
    if tablets <= 0 {
        return;
    }

    let target = preferred_batch
        .and_then(|id| medicine.batches.iter().position(|b| b.id == id))
        .or_else(|| earliest_batch_index(&medicine.batches));

    match target {
        Some(idx) => {
            medicine.batches[idx].quantity += tablets;
            normalize_in_place(medicine);
        }
        None => medicine.quantity += tablets,
    }
}

/// Adds a new batch, or tops up an existing one with the same batch number
/// and expiry.
///
/// Returns the id of the batch that received the stock.
pub fn receive_batch(medicine: &mut Medicine, batch: Batch) -> String {
    let existing = medicine
        .batches
        .iter_mut()
        .find(|b| b.batch_number == batch.batch_number && b.expiry_date == batch.expiry_date);

    let id = match existing {
        Some(found) => {
            found.quantity += batch.quantity;
            found.unit_price = batch.unit_price;
            found.id.clone()
        }
        None => {
            // First batch on a legacy medicine: fold the scalar stock into it
            // so tablets on hand are not lost when batches take over.
            let mut batch = batch;
            if medicine.batches.is_empty() && medicine.quantity > 0 {
                batch.quantity += medicine.quantity;
            }
            let id = batch.id.clone();
            medicine.batches.push(batch);
            id
        }
    };

    normalize_in_place(medicine);
    id
}

/// Removes a batch entirely.
///
/// Returns the removed batch. If it was the last one the medicine drops back
/// to legacy mode with zero stock.
pub fn remove_batch(medicine: &mut Medicine, batch_id: &str) -> CoreResult<Batch> {
    let idx = medicine
        .batches
        .iter()
        .position(|b| b.id == batch_id)
        .ok_or_else(|| CoreError::not_found("Batch", batch_id))?;

    let removed = medicine.batches.remove(idx);

    if medicine.batches.is_empty() {
        medicine.quantity = 0;
        medicine.expiry_date = None;
        medicine.batch_number = String::new();
    } else {
        normalize_in_place(medicine);
    }

    Ok(removed)
}

fn earliest_batch_index(batches: &[Batch]) -> Option<usize> {
    batches
        .iter()
        .enumerate()
        .min_by_key(|(idx, b)| (b.expiry_date, *idx))
        .map(|(idx, _)| idx)
}

// =============================================================================
// Unit Tests
// =============================================================================
