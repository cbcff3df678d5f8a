//! # CSV Export
//!
//! Flat exports of medicines and bills for spreadsheets. One header row,
//! one row per record; the `csv` writer handles double-quote escaping.
//!
//! Everything is written into an in-memory buffer; saving the file is the
//! caller's concern.

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::types::{Bill, Medicine};

const MEDICINE_HEADERS: [&str; 13] = [
    "Name",
    "Brand",
    "Composition",
    "Category",
    "Location",
    "Tablets Per Strip",
    "Quantity",
    "Strips",
    "Loose",
    "Expiry",
    "Batch Number",
    "Batches",
    "Unit Price",
];

const BILL_HEADERS: [&str; 10] = [
    "Bill Number",
    "Date",
    "Customer",
    "Phone",
    "Doctor",
    "Items",
    "Subtotal",
    "Discount %",
    "Discount",
    "Grand Total",
];

// Field order below must match the header arrays.

#[derive(Debug, Serialize)]
struct MedicineRow<'a> {
    name: &'a str,
    brand: &'a str,
    composition: &'a str,
    category: &'a str,
    location: &'a str,
    tablets_per_strip: i64,
    quantity: i64,
    strips: i64,
    loose: i64,
    expiry: String,
    batch_number: &'a str,
    batches: usize,
    unit_price: String,
}

#[derive(Debug, Serialize)]
struct BillRow<'a> {
    bill_number: &'a str,
    date: String,
    customer: &'a str,
    phone: &'a str,
    doctor: &'a str,
    items: String,
    subtotal: String,
    discount_percent: f64,
    discount: String,
    grand_total: String,
}

/// The header is written up front so an empty table still exports it.
fn write_rows<T: Serialize>(headers: &[&str], rows: impl IntoIterator<Item = T>) -> CoreResult<String> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(vec![]);
    wtr.write_record(headers)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| CoreError::Export(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| CoreError::Export(format!("UTF-8 conversion error: {}", e)))
}

/// Exports the inventory table.
pub fn medicines_to_csv(medicines: &[Medicine]) -> CoreResult<String> {
    write_rows(&MEDICINE_HEADERS, medicines.iter().map(|m| MedicineRow {
        name: &m.name,
        brand: m.brand.as_deref().unwrap_or(""),
        composition: m.composition.as_deref().unwrap_or(""),
        category: m.category.as_deref().unwrap_or(""),
        location: m.location.as_deref().unwrap_or(""),
        tablets_per_strip: m.strip_size(),
        quantity: m.quantity,
        strips: m.quantity / m.strip_size(),
        loose: m.quantity % m.strip_size(),
        expiry: m.expiry_date.map(|d| d.to_string()).unwrap_or_default(),
        batch_number: &m.batch_number,
        batches: m.batches.len(),
        unit_price: m.unit_price.to_decimal_string(),
    }))
}

/// Exports the bill history, one row per bill.
///
/// The `Items` column lists `name × tablets` joined with `; `.
pub fn bills_to_csv(bills: &[Bill]) -> CoreResult<String> {
    write_rows(&BILL_HEADERS, bills.iter().map(|b| BillRow {
        bill_number: &b.bill_number,
        date: b.created_at.format("%Y-%m-%d %H:%M").to_string(),
        customer: b.customer.customer_name.as_deref().unwrap_or(""),
        phone: b.customer.customer_phone.as_deref().unwrap_or(""),
        doctor: b.customer.doctor_name.as_deref().unwrap_or(""),
        items: b
            .items
            .iter()
            .map(|i| format!("{} × {}", i.medicine_name, i.quantity))
            .collect::<Vec<_>>()
            .join("; "),
        subtotal: b.subtotal.to_decimal_string(),
        discount_percent: b.discount_percent,
        discount: b.discount_amount.to_decimal_string(),
        grand_total: b.grand_total.to_decimal_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{BillItem, CustomerMeta};

    #[test]
    fn test_medicines_csv_escapes_quotes() {
        let mut med = Medicine::new("Syrup \"Kids\", 100ml", 1, Money::from_cents(8550));
        med.quantity = 7;
        let csv = medicines_to_csv(&[med]).unwrap();
        let mut lines = csv.lines();

        assert!(lines.next().unwrap().starts_with("Name,Brand,Composition"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("\"Syrup \"\"Kids\"\", 100ml\""));
        assert!(row.ends_with(",85.50"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_exports_have_only_the_header() {
        assert_eq!(
            medicines_to_csv(&[]).unwrap(),
            "Name,Brand,Composition,Category,Location,Tablets Per Strip,Quantity,Strips,Loose,Expiry,Batch Number,Batches,Unit Price\n"
        );
        assert_eq!(
            bills_to_csv(&[]).unwrap(),
            "Bill Number,Date,Customer,Phone,Doctor,Items,Subtotal,Discount %,Discount,Grand Total\n"
        );
    }

    #[test]
    fn test_bills_csv() {
        let now = chrono::Utc::now();
        let bill = Bill {
            id: "b1".into(),
            bill_number: "BILL-0007".into(),
            customer: CustomerMeta {
                customer_name: Some("R. Sharma".into()),
                ..Default::default()
            },
            items: vec![BillItem {
                medicine_id: "m1".into(),
                batch_id: None,
                medicine_name: "Dolo 650".into(),
                tablets_per_strip: 15,
                quantity: 20,
                unit_price: Money::from_cents(3000),
                strip_qty: 1,
                loose_qty: 5,
                total: Money::from_cents(4000),
            }],
            subtotal: Money::from_cents(4000),
            discount_percent: 0.0,
            discount_amount: Money::zero(),
            grand_total: Money::from_cents(4000),
            created_at: now,
            updated_at: now,
        };

        let csv = bills_to_csv(&[bill]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("BILL-0007,"));
        assert!(row.contains("R. Sharma"));
        assert!(row.contains("Dolo 650 × 20"));
        assert!(row.ends_with(",40.00"));
    }
}
