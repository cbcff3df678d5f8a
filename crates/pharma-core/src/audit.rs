//! # Audit Trail
//!
//! Append-only mutation history for medicines.
//!
//! Every write path (create, field update, quantity change, sale, restock,
//! bulk location update) appends exactly one [`AuditEntry`] per medicine it
//! touches. Entries are never edited or removed.

use chrono::Utc;

use crate::types::{AuditAction, AuditEntry, FieldChange, Medicine};

/// Appends an entry stamped with the current time.
pub fn append(
    mut medicine: Medicine,
    action: AuditAction,
    changes: Vec<FieldChange>,
    note: Option<String>,
) -> Medicine {
    record(&mut medicine, action, changes, note);
    medicine
}

/// In-place form of [`append`].
pub fn record(
    medicine: &mut Medicine,
    action: AuditAction,
    changes: Vec<FieldChange>,
    note: Option<String>,
) {
    let now = Utc::now();
    medicine.audit_history.push(AuditEntry {
        timestamp: now,
        action,
        changes,
        note,
    });
    medicine.updated_at = now;
}

/// Single quantity change, old and new tablet counts.
pub fn quantity_change(old: i64, new: i64) -> FieldChange {
    FieldChange::new("quantity", Some(old.to_string()), Some(new.to_string()))
}

/// Builds the change list between two versions of a medicine.
///
/// Only descriptive and pricing fields are compared; stock changes are
/// recorded through [`quantity_change`] by the operations that make them.
pub fn diff_fields(before: &Medicine, after: &Medicine) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    let mut push = |field: &str, old: Option<String>, new: Option<String>| {
        if old != new {
            changes.push(FieldChange::new(field, old, new));
        }
    };

    push("name", Some(before.name.clone()), Some(after.name.clone()));
    push("brand", before.brand.clone(), after.brand.clone());
    push("composition", before.composition.clone(), after.composition.clone());
    push("category", before.category.clone(), after.category.clone());
    push("location", before.location.clone(), after.location.clone());
    push(
        "tabletsPerStrip",
        Some(before.tablets_per_strip.to_string()),
        Some(after.tablets_per_strip.to_string()),
    );
    push(
        "unitPrice",
        Some(before.unit_price.to_decimal_string()),
        Some(after.unit_price.to_decimal_string()),
    );
    if before.is_legacy() && after.is_legacy() {
        push(
            "quantity",
            Some(before.quantity.to_string()),
            Some(after.quantity.to_string()),
        );
        push(
            "batchNumber",
            Some(before.batch_number.clone()),
            Some(after.batch_number.clone()),
        );
        push(
            "expiryDate",
            before.expiry_date.map(|d| d.to_string()),
            after.expiry_date.map(|d| d.to_string()),
        );
    }

    changes
}
