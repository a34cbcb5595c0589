//! Field Definition Types
//!
//! This module contains the building blocks of a schema version: the wire
//! types a field can declare, the validation mode applied to inbound values,
//! optional value constraints, and the `FieldDefinition` itself.
//!
//! ## Field Numbers
//!
//! Every field carries a positive `field_number` that identifies it for the
//! lifetime of its node type. Records are keyed by field number rather than
//! name, so fields can be renamed across versions without touching stored
//! data. A field number is never reused for a different field, even after
//! the field is removed.
//!
//! ## Example Definition
//!
//! ```json
//! {
//!   "field_number": 4,
//!   "name": "total_amount",
//!   "type": "DECIMAL",
//!   "required": true,
//!   "validation_mode": "COERCE",
//!   "constraints": { "min_value": 0.0, "precision": 2 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wire types available to schema fields
///
/// `DECIMAL` values are represented as canonical decimal string literals
/// (e.g. `"19.99"`) so that monetary amounts never pass through binary
/// floating point. `DATE` is `YYYY-MM-DD` and `TIMESTAMP` is RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    Timestamp,
}

impl FieldType {
    /// Uppercase name as it appears in schema files and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Decimal => "DECIMAL",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Date => "DATE",
            FieldType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strictly inbound values are checked against the declared field type
///
/// - `Strict`: the runtime type must match the declared type exactly
/// - `Coerce`: promote per the coercion table; text parses into numerics
/// - `Loose`: accept anything with a conversion path, routing through an
///   intermediate text rendering when no direct promotion exists; values
///   that still cannot be converted are treated as absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationMode {
    Strict,
    Coerce,
    Loose,
}

impl Default for ValidationMode {
    fn default() -> Self {
        ValidationMode::Strict
    }
}

/// Optional value constraints checked after type normalization
///
/// Numeric bounds apply to INTEGER, FLOAT, and DECIMAL fields. Length and
/// pattern apply to TEXT fields. `precision` caps the number of fractional
/// digits of a DECIMAL field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    /// Inclusive lower bound for numeric fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    /// Inclusive upper bound for numeric fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,

    /// Minimum character count for TEXT fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum character count for TEXT fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Regular expression a TEXT value must match in full
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Maximum fractional digits for DECIMAL fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

/// Definition of a single field within a schema version
///
/// Each schema version owns a full copy of its field definitions; definitions
/// are never shared between versions, so editing a draft version can never
/// corrupt an accepted one.
///
/// # Examples
///
/// ```
/// # use nodevault_core::models::{FieldDefinition, FieldType, ValidationMode};
/// # use serde_json::json;
/// let status = FieldDefinition::new(5, "status", FieldType::Text)
///     .with_default(json!("PENDING"))
///     .with_allowed_values(vec![json!("PENDING"), json!("CONFIRMED")]);
///
/// assert_eq!(status.field_number, 5);
/// assert!(!status.required);
/// assert_eq!(status.validation_mode, ValidationMode::Strict);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Stable positive identifier, unique within the node type forever
    pub field_number: u32,

    /// Human-readable field name (unique within a single version)
    pub name: String,

    /// Declared wire type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Whether the field must be present after defaults are applied
    #[serde(default)]
    pub required: bool,

    /// Strictness applied to inbound values for this field
    #[serde(default)]
    pub validation_mode: ValidationMode,

    /// Literal inserted when the field is missing from a record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Optional value constraints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<FieldConstraints>,

    /// Closed enumeration of permitted values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
}

impl FieldDefinition {
    /// Create an optional field with STRICT validation and no extras
    pub fn new(field_number: u32, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field_number,
            name: name.into(),
            field_type,
            required: false,
            validation_mode: ValidationMode::default(),
            default: None,
            constraints: None,
            allowed_values: None,
        }
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the validation mode
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    /// Set the default literal
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Attach value constraints
    pub fn with_constraints(mut self, constraints: FieldConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Restrict the field to a closed set of values
    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }
}
