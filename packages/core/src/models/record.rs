//! Record Types
//!
//! This module contains the runtime representation of node data. Internally
//! a record is a map from field number to JSON value (`FieldMap`), which is
//! what migrations and validation operate on. Field names only exist at the
//! API boundary and are translated through the schema version the caller is
//! bound to.
//!
//! Keying records by number instead of name is what makes renames free:
//! stored data never changes when a field is renamed, only the name table
//! of the new schema version does.

use crate::models::schema::SchemaVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Record payload keyed by field number
pub type FieldMap = BTreeMap<u32, Value>;

/// Convert a named JSON payload into a field-number map
///
/// Names are resolved against the given schema version. Names the version
/// does not know are dropped; they never reach validation or storage.
///
/// # Examples
///
/// ```
/// # use nodevault_core::models::{fields_from_named, FieldDefinition, FieldType};
/// # use nodevault_core::models::{CompatibilityMode, SchemaVersion};
/// # use serde_json::json;
/// let version = SchemaVersion::new(1, CompatibilityMode::Forward, chrono::Utc::now())
///     .with_field(FieldDefinition::new(1, "name", FieldType::Text));
///
/// let payload = json!({"name": "Widget", "unknown": true});
/// let fields = fields_from_named(payload.as_object().unwrap(), &version);
///
/// assert_eq!(fields.get(&1), Some(&json!("Widget")));
/// assert_eq!(fields.len(), 1); // "unknown" was dropped
/// ```
pub fn fields_from_named(named: &Map<String, Value>, version: &SchemaVersion) -> FieldMap {
    let mut fields = FieldMap::new();
    for (name, value) in named {
        if let Some(def) = version.field_by_name(name) {
            fields.insert(def.field_number, value.clone());
        }
    }
    fields
}

/// Convert a field-number map back into a named JSON payload
///
/// Numbers the version does not know are dropped, which keeps payloads
/// shaped exactly like the schema version the caller is bound to.
pub fn fields_to_named(fields: &FieldMap, version: &SchemaVersion) -> Map<String, Value> {
    let mut named = Map::new();
    for (number, value) in fields {
        if let Some(def) = version.field(*number) {
            named.insert(def.name.clone(), value.clone());
        }
    }
    named
}

/// Persisted record envelope
///
/// Wraps the field map together with the schema version that validated it
/// and the storage timestamps. Ids are sequential per node type and are
/// allocated by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Sequential id, unique within the node type
    pub id: u64,

    /// Node type this record belongs to
    pub node_type: String,

    /// Schema version the fields conform to
    pub schema_version: u32,

    /// Field values keyed by field number
    pub fields: FieldMap,

    /// Timestamp when the record was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the record was last modified
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Create a record stamped with the current time
    pub fn new(id: u64, node_type: impl Into<String>, schema_version: u32, fields: FieldMap) -> Self {
        let now = Utc::now();
        Self {
            id,
            node_type: node_type.into(),
            schema_version,
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Result of a delete operation
///
/// Distinguishes between "deleted" and "was never there" while keeping
/// deletes idempotent: deleting a missing record is not an error.
///
/// # Examples
///
/// ```
/// # use nodevault_core::models::DeleteResult;
/// let result = DeleteResult::existed();
/// assert!(result.existed);
///
/// let result = DeleteResult::not_found();
/// assert!(!result.existed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Whether the record existed before the delete
    pub existed: bool,
}

impl DeleteResult {
    /// Create a DeleteResult indicating the record existed
    pub fn existed() -> Self {
        Self { existed: true }
    }

    /// Create a DeleteResult indicating the record didn't exist
    pub fn not_found() -> Self {
        Self { existed: false }
    }
}
