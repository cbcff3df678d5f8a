//! # Validation Module
//!
//! Input validation for medicines and batches.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI form checks (external)                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, runs before every medicine write               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite CHECK / NOT NULL constraints                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sale quantities are not validated here: a negative sale quantity is an
//! `InvalidQuantity` contract violation raised by the allocator.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Batch, Medicine};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest strip size accepted.
pub const MAX_TABLETS_PER_STRIP: i64 = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a medicine name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ```rust
/// use pharma_core::validation::validate_medicine_name;
///
/// assert!(validate_medicine_name("Paracetamol 500mg").is_ok());
/// assert!(validate_medicine_name("   ").is_err());
/// ```
pub fn validate_medicine_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a batch number (lot code).
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    let batch_number = batch_number.trim();

    if batch_number.is_empty() {
        return Err(ValidationError::Required {
            field: "batchNumber".to_string(),
        });
    }

    if batch_number.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "batchNumber".to_string(),
            max: 50,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the strip size.
///
/// ## Rules
/// - At least 1 (1 means the whole pack is the sellable unit)
/// - At most [`MAX_TABLETS_PER_STRIP`]
pub fn validate_tablets_per_strip(tablets_per_strip: i64) -> ValidationResult<()> {
    if !(1..=MAX_TABLETS_PER_STRIP).contains(&tablets_per_strip) {
        return Err(ValidationError::OutOfRange {
            field: "tabletsPerStrip".to_string(),
            min: 1,
            max: MAX_TABLETS_PER_STRIP,
        });
    }

    Ok(())
}

/// Validates a stock quantity (tablets).
pub fn validate_stock_quantity(field: &str, quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (free samples).
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a UUID string.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Validates a single batch.
pub fn validate_batch(batch: &Batch) -> ValidationResult<()> {
    validate_batch_number(&batch.batch_number)?;
    validate_stock_quantity("batch.quantity", batch.quantity)?;
    validate_price("batch.unitPrice", batch.unit_price)?;
    Ok(())
}

/// Validates a medicine before it is persisted.
///
/// Checks descriptive fields, the legacy scalars, every batch, and that
/// batch ids are unique within the medicine.
pub fn validate_medicine(medicine: &Medicine) -> ValidationResult<()> {
    validate_medicine_name(&medicine.name)?;
    validate_tablets_per_strip(medicine.tablets_per_strip)?;
    validate_price("unitPrice", medicine.unit_price)?;
    validate_stock_quantity("quantity", medicine.quantity)?;

    let mut seen = HashSet::new();
    for batch in &medicine.batches {
        validate_batch(batch)?;
        if !seen.insert(batch.id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "batch.id".to_string(),
                value: batch.id.clone(),
            });
        }
    }

    Ok(())
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

    #[test]
    fn test_validate_medicine_name() {
        assert!(validate_medicine_name("Amoxicillin 250").is_ok());
        assert!(validate_medicine_name("").is_err());
        assert!(validate_medicine_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_tablets_per_strip() {
        assert!(validate_tablets_per_strip(1).is_ok());
        assert!(validate_tablets_per_strip(15).is_ok());
        assert!(validate_tablets_per_strip(0).is_err());
        assert!(validate_tablets_per_strip(-10).is_err());
        assert!(validate_tablets_per_strip(1001).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price("p", Money::zero()).is_ok());
        assert!(validate_price("p", Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_medicine_rejects_duplicate_batch_ids() {
        let mut med = Medicine::new("Azithromycin", 3, Money::from_cents(9000));
        let batch = Batch::new("AZ1", date(2026, 1, 1), 9, Money::from_cents(9000));
        med.batches = vec![batch.clone(), batch];
        assert!(matches!(
            validate_medicine(&med),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_validate_medicine_rejects_negative_batch() {
        let mut med = Medicine::new("Azithromycin", 3, Money::from_cents(9000));
        med.batches = vec![Batch::new("AZ1", date(2026, 1, 1), -1, Money::from_cents(9000))];
        assert!(validate_medicine(&med).is_err());
    }
}
