//! Data Models
//!
//! This module contains the core data structures used throughout NodeVault:
//!
//! - `FieldDefinition` and friends - typed, numbered schema fields
//! - `SchemaVersion` - one accepted version of a node type's field layout
//! - `StoredRecord` / `FieldMap` - record payloads keyed by field number
//!
//! All record data is JSON (`serde_json::Value`) keyed by stable field
//! numbers, so schema versions can rename fields without rewriting data.

mod field;
mod record;
mod schema;

pub use field::{FieldConstraints, FieldDefinition, FieldType, ValidationMode};
pub use record::{fields_from_named, fields_to_named, DeleteResult, FieldMap, StoredRecord};
pub use schema::{CompatibilityMode, FieldChange, SchemaVersion};
