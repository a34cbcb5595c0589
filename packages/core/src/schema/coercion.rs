//! Type & Coercion Table
//!
//! This module owns the directional promotion table between field types and
//! the value conversions that go with it. Everything else in the engine
//! (validation, migrations, API payload conversion) funnels value conversion
//! through here.
//!
//! ## Promotion Table
//!
//! | From      | Allowed targets                  |
//! |-----------|----------------------------------|
//! | INTEGER   | INTEGER, FLOAT, DECIMAL, TEXT    |
//! | FLOAT     | FLOAT, TEXT                      |
//! | DECIMAL   | DECIMAL, FLOAT, TEXT             |
//! | BOOLEAN   | BOOLEAN, TEXT                    |
//! | DATE      | DATE, TIMESTAMP, TEXT            |
//! | TIMESTAMP | TIMESTAMP, TEXT                  |
//! | TEXT      | TEXT                             |
//!
//! The table is deliberately directional: INTEGER widens to DECIMAL but a
//! DECIMAL never silently narrows to INTEGER, and FLOAT never promotes to
//! DECIMAL because binary floats cannot guarantee the exactness DECIMAL
//! promises.
//!
//! ## Text Parsing
//!
//! At COERCE strength, TEXT additionally parses into the other types when
//! the literal is valid ("42" into INTEGER, "19.99" into DECIMAL, "true"
//! into BOOLEAN, "2024-01-15" into DATE). At LOOSE strength any value may
//! route through an intermediate text rendering, so an INTEGER can still
//! reach BOOLEAN-adjacent targets only if its rendering parses.

use crate::models::FieldType;
use crate::schema::error::SchemaError;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

// Regex pattern for canonical decimal literals (optional sign, no exponent)
const DECIMAL_PATTERN: &str = r"^-?\d+(\.\d+)?$";

fn decimal_regex() -> &'static Regex {
    static DECIMAL_REGEX: OnceLock<Regex> = OnceLock::new();
    DECIMAL_REGEX.get_or_init(|| Regex::new(DECIMAL_PATTERN).unwrap())
}

/// Check if a string is a canonical decimal literal (e.g. "42", "-19.99")
pub fn is_decimal_literal(s: &str) -> bool {
    decimal_regex().is_match(s)
}

/// Check if a string is a calendar date in `YYYY-MM-DD` form
///
/// Validates both the format and the semantics: "2024-13-45" is rejected
/// even though it matches the shape.
pub fn is_date_literal(s: &str) -> bool {
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        // Round-trip guards against unpadded inputs like "2024-1-3"
        Ok(date) => date.format("%Y-%m-%d").to_string() == s,
        Err(_) => false,
    }
}

/// Check if a string is an RFC 3339 timestamp
pub fn is_timestamp_literal(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

/// Check whether a promotion from one field type to another is allowed
///
/// Every type promotes to itself and to TEXT; the remaining entries are the
/// directional widenings listed in the module table.
pub fn can_promote(from: FieldType, to: FieldType) -> bool {
    use FieldType::*;
    if from == to || to == Text {
        return true;
    }
    matches!(
        (from, to),
        (Integer, Float) | (Integer, Decimal) | (Decimal, Float) | (Date, Timestamp)
    )
}

/// Check whether a runtime JSON value matches a declared field type exactly
///
/// This is the STRICT-mode check: JSON strings carry TEXT, DECIMAL, DATE,
/// and TIMESTAMP values (distinguished by their literal form), JSON integers
/// carry INTEGER, JSON floats carry FLOAT, and JSON booleans carry BOOLEAN.
pub fn matches_declared(value: &Value, field_type: FieldType) -> bool {
    match field_type {
        FieldType::Text => value.is_string(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_f64(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Decimal => value.as_str().map(is_decimal_literal).unwrap_or(false),
        FieldType::Date => value.as_str().map(is_date_literal).unwrap_or(false),
        FieldType::Timestamp => value.as_str().map(is_timestamp_literal).unwrap_or(false),
    }
}

/// JSON type name for error messages
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert a value between two declared types at COERCE strength
///
/// The value must match `from`. Identity conversions return the value
/// untouched, TEXT sources are parsed into the target when the literal is
/// valid, and everything else follows the promotion table with the value
/// rewritten into the target representation.
///
/// # Errors
///
/// Returns `SchemaError::Coercion` when the value does not match `from`,
/// when no promotion path exists, or when a TEXT literal does not parse
/// as the target type.
///
/// # Examples
///
/// ```
/// # use nodevault_core::models::FieldType;
/// # use nodevault_core::schema::coerce;
/// # use serde_json::json;
/// let exact = coerce(&json!(42), FieldType::Integer, FieldType::Decimal).unwrap();
/// assert_eq!(exact, json!("42"));
///
/// assert!(coerce(&json!("abc"), FieldType::Text, FieldType::Decimal).is_err());
/// ```
pub fn coerce(value: &Value, from: FieldType, to: FieldType) -> Result<Value, SchemaError> {
    if !matches_declared(value, from) {
        return Err(SchemaError::coercion(
            from,
            to,
            format!("value {} is not a valid {}", value, from),
        ));
    }
    if from == to {
        return Ok(value.clone());
    }
    if from == FieldType::Text {
        let s = value
            .as_str()
            .ok_or_else(|| SchemaError::coercion(from, to, "value is not a string"))?;
        return parse_text(s, to);
    }
    if !can_promote(from, to) {
        return Err(SchemaError::coercion(
            from,
            to,
            format!("no promotion path from {} to {}", from, to),
        ));
    }
    promote(value, from, to)
}

/// Convert a value between two declared types at LOOSE strength
///
/// Tries the COERCE conversion first; if that fails the value is rendered
/// as text and re-parsed as the target type. The original error is kept
/// when the detour fails too, so callers see why the direct path broke.
pub fn coerce_loose(value: &Value, from: FieldType, to: FieldType) -> Result<Value, SchemaError> {
    match coerce(value, from, to) {
        Ok(converted) => Ok(converted),
        Err(direct_err) => match render_text(value) {
            Some(text) => parse_text(&text, to).map_err(|_| direct_err),
            None => Err(direct_err),
        },
    }
}

/// Parse a text literal into a target type
fn parse_text(s: &str, to: FieldType) -> Result<Value, SchemaError> {
    let trimmed = s.trim();
    let parsed = match to {
        FieldType::Text => Some(Value::String(s.to_string())),
        FieldType::Integer => trimmed.parse::<i64>().ok().map(Value::from),
        FieldType::Float => trimmed.parse::<f64>().ok().map(Value::from),
        FieldType::Decimal => {
            is_decimal_literal(trimmed).then(|| Value::String(trimmed.to_string()))
        }
        FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        FieldType::Date => is_date_literal(trimmed).then(|| Value::String(trimmed.to_string())),
        FieldType::Timestamp => {
            is_timestamp_literal(trimmed).then(|| Value::String(trimmed.to_string()))
        }
    };

    parsed.ok_or_else(|| {
        SchemaError::coercion(
            FieldType::Text,
            to,
            format!("'{}' does not parse as {}", s, to),
        )
    })
}

/// Render a scalar value as text for the LOOSE through-TEXT detour
fn render_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Rewrite a value along a promotion-table edge
///
/// Callers have already verified `can_promote(from, to)` and that the value
/// matches `from`, so the fallthrough arm only fires on table edges with no
/// conversion, which would be a bug in the table itself.
fn promote(value: &Value, from: FieldType, to: FieldType) -> Result<Value, SchemaError> {
    use FieldType::*;

    let converted = match (from, to) {
        (Integer, Float) => value
            .as_i64()
            .map(|i| Value::from(i as f64))
            .or_else(|| value.as_u64().map(|u| Value::from(u as f64))),
        (Integer, Decimal) | (Integer, Text) => value.as_number().map(|n| Value::from(n.to_string())),
        (Float, Text) => value.as_number().map(|n| Value::from(n.to_string())),
        (Decimal, Float) => value.as_str().and_then(|s| s.parse::<f64>().ok()).map(Value::from),
        (Decimal, Text) | (Date, Text) | (Timestamp, Text) => value.as_str().map(Value::from),
        (Boolean, Text) => value.as_bool().map(|b| Value::from(b.to_string())),
        (Date, Timestamp) => value.as_str().map(|s| Value::from(format!("{}T00:00:00Z", s))),
        _ => None,
    };

    converted.ok_or_else(|| {
        SchemaError::coercion(from, to, format!("no conversion for value {}", value))
    })
}
