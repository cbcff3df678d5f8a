//! # Backup Snapshots
//!
//! The JSON document produced by export and consumed by restore.
//!
//! ## Format
//! ```text
//! {
//!   "version": 3,
//!   "exportedAt": "2025-04-01T10:15:00Z",
//!   "app": "pharma-pos",
//!   "medicines": [ ...Medicine... ],
//!   "bills": [ ...Bill... ],
//!   "counters": { "bill_number": 42 }
//! }
//! ```
//!
//! ## Version Upgrades
//! Older snapshots are upgraded in sequence by pure functions over the raw
//! JSON before they are deserialized:
//!
//! ```text
//! v1 ──► v2   medicines gain tabletsPerStrip (1), batches ([]), auditHistory ([])
//! v2 ──► v3   bills gain discountPercent (0), discountAmount (0),
//!             grandTotal (subtotal), updatedAt (createdAt);
//!             items gain stripQty / looseQty
//! ```
//!
//! A snapshot newer than [`SNAPSHOT_VERSION`] is rejected.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{Bill, Medicine};
use crate::{SNAPSHOT_APP_LABEL, SNAPSHOT_VERSION};

// =============================================================================
// Snapshot
// =============================================================================

/// A full backup of medicines, bills and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Snapshot {
    pub version: u32,
    #[ts(as = "String")]
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub app: String,
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub bills: Vec<Bill>,
    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
}

impl Snapshot {
    /// Builds a current-version snapshot stamped now.
    pub fn new(medicines: Vec<Medicine>, bills: Vec<Bill>, counters: BTreeMap<String, i64>) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            app: SNAPSHOT_APP_LABEL.to_string(),
            medicines,
            bills,
            counters,
        }
    }

    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::MalformedSnapshot(format!("cannot serialize: {}", e)))
    }

    /// Parses, validates and upgrades a snapshot document.
    pub fn parse(json: &str) -> CoreResult<Snapshot> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| CoreError::MalformedSnapshot(format!("invalid JSON: {}", e)))?;
        Snapshot::from_value(value)
    }

    /// Validates and upgrades an already-parsed document.
    ///
    /// ## Errors
    /// * `MalformedSnapshot` - not an object, `version` or `exportedAt`
    ///   missing, `medicines` not an array, or a record that does not fit
    ///   the current model after upgrading
    /// * `UnsupportedSnapshotVersion` - written by a newer build
    pub fn from_value(mut value: Value) -> CoreResult<Snapshot> {
        let version = validate(&value)?;
        upgrade(&mut value, version)?;

        serde_json::from_value(value)
            .map_err(|e| CoreError::MalformedSnapshot(format!("invalid record: {}", e)))
    }
}

fn malformed(reason: &str) -> CoreError {
    CoreError::MalformedSnapshot(reason.to_string())
}

/// Structural checks. Returns the stored version.
fn validate(value: &Value) -> CoreResult<u32> {
    let obj = value.as_object().ok_or_else(|| malformed("expected a JSON object"))?;

    let version = obj
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("missing version"))?;
    if version == 0 {
        return Err(malformed("version must be at least 1"));
    }
    if version > SNAPSHOT_VERSION as u64 {
        return Err(CoreError::UnsupportedSnapshotVersion {
            found: version,
            supported: SNAPSHOT_VERSION,
        });
    }

    match obj.get("exportedAt") {
        Some(Value::String(_)) => {}
        _ => return Err(malformed("missing exportedAt")),
    }

    if !obj.get("medicines").is_some_and(Value::is_array) {
        return Err(malformed("medicines must be an array"));
    }
    if obj.get("bills").is_some_and(|b| !b.is_array()) {
        return Err(malformed("bills must be an array"));
    }
    if obj.get("counters").is_some_and(|c| !c.is_object()) {
        return Err(malformed("counters must be an object"));
    }

    Ok(version as u32)
}

// =============================================================================
// Migrations
// =============================================================================

type Migration = fn(&mut Map<String, Value>);

/// `(from_version, upgrade)` in order.
const MIGRATIONS: &[(u32, Migration)] = &[(1, v1_to_v2), (2, v2_to_v3)];

fn upgrade(value: &mut Value, mut version: u32) -> CoreResult<()> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| malformed("expected a JSON object"))?;

    while version < SNAPSHOT_VERSION {
        let (_, migrate) = MIGRATIONS
            .iter()
            .find(|(from, _)| *from == version)
            .ok_or_else(|| malformed("no upgrade path"))?;
        migrate(obj);
        version += 1;
        obj.insert("version".to_string(), json!(version));
    }

    Ok(())
}

fn records_mut<'a>(obj: &'a mut Map<String, Value>, key: &str) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    obj.get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|records| records.iter_mut())
        .filter_map(Value::as_object_mut)
}

fn default_field(record: &mut Map<String, Value>, key: &str, value: Value) {
    if record.get(key).map_or(true, Value::is_null) {
        record.insert(key.to_string(), value);
    }
}

fn v1_to_v2(obj: &mut Map<String, Value>) {
    for medicine in records_mut(obj, "medicines") {
        default_field(medicine, "tabletsPerStrip", json!(1));
        default_field(medicine, "batches", json!([]));
        default_field(medicine, "auditHistory", json!([]));
    }
}

fn v2_to_v3(obj: &mut Map<String, Value>) {
    for bill in records_mut(obj, "bills") {
        default_field(bill, "discountPercent", json!(0));
        default_field(bill, "discountAmount", json!(0));
        if let Some(subtotal) = bill.get("subtotal").cloned() {
            default_field(bill, "grandTotal", subtotal);
        }
        if let Some(created) = bill.get("createdAt").cloned() {
            default_field(bill, "updatedAt", created);
        }

        for item in records_mut(bill, "items") {
            default_field(item, "tabletsPerStrip", json!(1));
            let per_strip = item
                .get("tabletsPerStrip")
                .and_then(Value::as_i64)
                .unwrap_or(1)
                .max(1);
            let quantity = item.get("quantity").and_then(Value::as_i64).unwrap_or(0);
            default_field(item, "stripQty", json!(quantity / per_strip));
            default_field(item, "looseQty", json!(quantity % per_strip));
        }
    }
}

// =============================================================================
// Restore Options
// =============================================================================

/// What to do when a snapshot record's id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ConflictPolicy {
    /// Keep the existing record.
    #[default]
    Skip,
    /// Replace the existing record with the snapshot's.
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RestoreOptions {
    /// Delete all medicines and bills before restoring.
    pub clear_existing: bool,
    pub conflict: ConflictPolicy,
}
