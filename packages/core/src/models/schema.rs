//! Schema Version Types
//!
//! This module contains the data structures describing one accepted version
//! of a node type's schema: the field table keyed by field number, the
//! compatibility contract the next version must honor, the validity window,
//! and the ordered field changes that transform a record from the preceding
//! version into this one.
//!
//! ## Validity Windows
//!
//! Versions carry half-open `[valid_from, valid_to)` windows. Registering a
//! new version closes the previous window at the new version's `valid_from`,
//! so exactly one version is current (`valid_to = None`) at any time and the
//! windows of a node type are gapless and non-overlapping.
//!
//! ## Example Version
//!
//! ```json
//! {
//!   "version": 2,
//!   "compatibility": "FORWARD",
//!   "valid_from": "2024-06-01T00:00:00Z",
//!   "fields": {
//!     "1": { "field_number": 1, "name": "name", "type": "TEXT", "required": true },
//!     "2": { "field_number": 2, "name": "status", "type": "TEXT", "default": "active" }
//!   },
//!   "upgrade_definitions": [
//!     { "op": "add_field", "field_number": 2 }
//!   ]
//! }
//! ```

use crate::models::field::FieldDefinition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compatibility contract a version imposes on its successor
///
/// The mode stored on version N is enforced when version N+1 is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompatibilityMode {
    /// No structural changes at all
    Strict,
    /// New data must stay readable by the old schema
    Forward,
    /// Old data must stay readable by the new schema
    Backward,
    /// Both directions (FORWARD and BACKWARD combined)
    Full,
}

/// One structural change between a version and its predecessor
///
/// The change only names the field number; the definitions involved are
/// looked up in the field tables of the two adjacent versions. Applied
/// forward the changes upgrade a record, applied in reverse order with
/// inverted semantics they downgrade it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldChange {
    /// Field exists in this version but not in the previous one.
    /// Forward: insert the new field's default if the record lacks the
    /// field. Reverse: drop the field.
    AddField { field_number: u32 },

    /// Field exists in both versions with a changed type or attributes.
    /// Forward: coerce the stored value from the old type to the new one.
    /// Reverse: coerce back, which requires the reverse promotion to exist.
    ModifyField { field_number: u32 },

    /// Field exists in the previous version but not in this one.
    /// Forward: drop the field. Reverse: reinstate the field from its
    /// default in the older version, failing if no default is declared.
    RemoveField { field_number: u32 },
}

impl FieldChange {
    /// Field number this change operates on
    pub fn field_number(&self) -> u32 {
        match self {
            FieldChange::AddField { field_number }
            | FieldChange::ModifyField { field_number }
            | FieldChange::RemoveField { field_number } => *field_number,
        }
    }
}

/// One accepted schema version of a node type
///
/// The field table is keyed by field number, so the declaration order of
/// fields never matters. Once registered into a `SchemaEvolution` a version
/// is immutable; corrections require registering a successor version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Monotonic version number, starting at 1 per node type
    pub version: u32,

    /// Field table keyed by field number
    pub fields: BTreeMap<u32, FieldDefinition>,

    /// Contract enforced against the next registered version
    pub compatibility: CompatibilityMode,

    /// Start of the validity window (inclusive)
    pub valid_from: DateTime<Utc>,

    /// End of the validity window (exclusive); `None` means current
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,

    /// Ordered changes transforming a record from the preceding version
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upgrade_definitions: Vec<FieldChange>,
}

impl SchemaVersion {
    /// Create an empty version with an open validity window
    pub fn new(version: u32, compatibility: CompatibilityMode, valid_from: DateTime<Utc>) -> Self {
        Self {
            version,
            fields: BTreeMap::new(),
            compatibility,
            valid_from,
            valid_to: None,
            upgrade_definitions: Vec::new(),
        }
    }

    /// Add a field definition, keyed by its field number
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.insert(field.field_number, field);
        self
    }

    /// Set the upgrade definitions transforming the preceding version
    pub fn with_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.upgrade_definitions = changes;
        self
    }

    /// Look up a field definition by number
    pub fn field(&self, field_number: u32) -> Option<&FieldDefinition> {
        self.fields.get(&field_number)
    }

    /// Look up a field definition by name
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.values().find(|f| f.name == name)
    }

    /// Check whether an instant falls inside the `[valid_from, valid_to)` window
    pub fn contains_instant(&self, at: DateTime<Utc>) -> bool {
        if at < self.valid_from {
            return false;
        }
        match self.valid_to {
            Some(valid_to) => at < valid_to,
            None => true,
        }
    }
}
