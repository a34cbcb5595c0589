//! Per-Version Record Validation
//!
//! This module validates a field map against one schema version: values are
//! normalized according to each field's validation mode, defaults fill the
//! gaps, and constraints plus allowed-value enumerations are enforced on
//! whatever survives normalization.
//!
//! ## Mode Behavior
//!
//! - STRICT fields reject any runtime type mismatch
//! - COERCE fields promote per the coercion table and surface
//!   `SchemaError::Coercion` when a conversion is impossible
//! - LOOSE fields treat unconvertible values as absent, so the field's
//!   default applies, or a missing-required error if there is none
//!
//! Field numbers the version does not declare are dropped. Defaults are
//! applied before the required-presence check, which is what lets a
//! BACKWARD-compatible required field added in version N still accept
//! records written before N existed.

use crate::models::{FieldDefinition, FieldMap, FieldType, SchemaVersion, ValidationMode};
use crate::schema::coercion::{coerce, coerce_loose, json_type_name, matches_declared};
use crate::schema::error::SchemaError;
use regex::Regex;
use serde_json::Value;

/// Validate a field map against a schema version
///
/// Returns the normalized field map: values converted into their declared
/// representation, defaults filled in, and unknown field numbers dropped.
/// The input map is never mutated.
///
/// # Errors
///
/// - `SchemaError::Validation` for type mismatches on STRICT fields,
///   constraint violations, values outside `allowed_values`, and missing
///   required fields without defaults
/// - `SchemaError::Coercion` for impossible conversions on COERCE fields
///
/// # Examples
///
/// ```
/// # use nodevault_core::models::{CompatibilityMode, FieldDefinition, FieldMap, FieldType,
/// #     SchemaVersion, ValidationMode};
/// # use nodevault_core::schema::validate_record;
/// # use serde_json::json;
/// let version = SchemaVersion::new(1, CompatibilityMode::Forward, chrono::Utc::now())
///     .with_field(
///         FieldDefinition::new(1, "quantity", FieldType::Integer)
///             .required()
///             .with_mode(ValidationMode::Coerce),
///     );
///
/// let mut fields = FieldMap::new();
/// fields.insert(1, json!("3")); // text parses into INTEGER under COERCE
///
/// let normalized = validate_record(&fields, &version).unwrap();
/// assert_eq!(normalized.get(&1), Some(&json!(3)));
/// ```
pub fn validate_record(fields: &FieldMap, version: &SchemaVersion) -> Result<FieldMap, SchemaError> {
    let mut normalized = FieldMap::new();

    for (number, def) in &version.fields {
        // JSON null counts as absent
        let present = fields.get(number).filter(|v| !v.is_null());

        let chosen = match present {
            Some(raw) => normalize_value(raw, def)?.or_else(|| def.default.clone()),
            None => def.default.clone(),
        };

        match chosen {
            Some(value) => {
                check_allowed_values(&value, def)?;
                check_constraints(&value, def)?;
                normalized.insert(*number, value);
            }
            None if def.required => {
                return Err(SchemaError::validation(
                    &def.name,
                    "required field is missing",
                ));
            }
            None => {}
        }
    }

    Ok(normalized)
}

/// Normalize one value per its field's validation mode
///
/// `Ok(None)` means the value could not be converted but the mode tolerates
/// that (LOOSE); the caller falls back to the default or absence handling.
fn normalize_value(value: &Value, def: &FieldDefinition) -> Result<Option<Value>, SchemaError> {
    if matches_declared(value, def.field_type) {
        return Ok(Some(value.clone()));
    }

    match def.validation_mode {
        ValidationMode::Strict => Err(SchemaError::validation(
            &def.name,
            format!("expected {}, got {}", def.field_type, json_type_name(value)),
        )),
        ValidationMode::Coerce => {
            let from = infer_type(value).ok_or_else(|| {
                SchemaError::validation(
                    &def.name,
                    format!("unsupported value of type {}", json_type_name(value)),
                )
            })?;
            coerce(value, from, def.field_type).map(Some)
        }
        ValidationMode::Loose => match infer_type(value) {
            Some(from) => Ok(coerce_loose(value, from, def.field_type).ok()),
            None => Ok(None),
        },
    }
}

/// Infer the natural field type of a runtime JSON value
///
/// Strings infer TEXT even when they would match DECIMAL or DATE literals;
/// `matches_declared` has already run at that point, so inference only
/// matters for values that need conversion toward a different declared type.
fn infer_type(value: &Value) -> Option<FieldType> {
    match value {
        Value::String(_) => Some(FieldType::Text),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldType::Integer),
        Value::Number(_) => Some(FieldType::Float),
        Value::Bool(_) => Some(FieldType::Boolean),
        _ => None,
    }
}

fn check_allowed_values(value: &Value, def: &FieldDefinition) -> Result<(), SchemaError> {
    if let Some(allowed) = &def.allowed_values {
        if !allowed.contains(value) {
            return Err(SchemaError::validation(
                &def.name,
                format!("value {} is not one of the allowed values", value),
            ));
        }
    }
    Ok(())
}

fn check_constraints(value: &Value, def: &FieldDefinition) -> Result<(), SchemaError> {
    let constraints = match &def.constraints {
        Some(c) => c,
        None => return Ok(()),
    };

    if let Some(magnitude) = numeric_magnitude(value, def.field_type) {
        if let Some(min) = constraints.min_value {
            if magnitude < min {
                return Err(SchemaError::validation(
                    &def.name,
                    format!("value {} is below minimum {}", magnitude, min),
                ));
            }
        }
        if let Some(max) = constraints.max_value {
            if magnitude > max {
                return Err(SchemaError::validation(
                    &def.name,
                    format!("value {} is above maximum {}", magnitude, max),
                ));
            }
        }
    }

    if let Value::String(s) = value {
        if def.field_type == FieldType::Text {
            let length = s.chars().count();
            if let Some(min_length) = constraints.min_length {
                if length < min_length {
                    return Err(SchemaError::validation(
                        &def.name,
                        format!("length {} is below minimum length {}", length, min_length),
                    ));
                }
            }
            if let Some(max_length) = constraints.max_length {
                if length > max_length {
                    return Err(SchemaError::validation(
                        &def.name,
                        format!("length {} exceeds maximum length {}", length, max_length),
                    ));
                }
            }
            if let Some(pattern) = &constraints.pattern {
                // Patterns match the whole value, not a substring
                let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                    SchemaError::validation(&def.name, format!("invalid pattern constraint: {}", e))
                })?;
                if !regex.is_match(s) {
                    return Err(SchemaError::validation(
                        &def.name,
                        format!("value does not match pattern '{}'", pattern),
                    ));
                }
            }
        }

        if def.field_type == FieldType::Decimal {
            if let Some(precision) = constraints.precision {
                let fractional = s.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0);
                if fractional as u32 > precision {
                    return Err(SchemaError::validation(
                        &def.name,
                        format!("value has more than {} fractional digits", precision),
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Numeric magnitude used for min/max comparison
///
/// DECIMAL values compare through f64, which is fine for bounds checking
/// even though the stored representation stays exact.
fn numeric_magnitude(value: &Value, field_type: FieldType) -> Option<f64> {
    match field_type {
        FieldType::Integer => value
            .as_i64()
            .map(|i| i as f64)
            .or_else(|| value.as_u64().map(|u| u as f64)),
        FieldType::Float => value.as_f64(),
        FieldType::Decimal => value.as_str().and_then(|s| s.parse::<f64>().ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompatibilityMode, FieldConstraints};
    use chrono::Utc;
    use serde_json::json;

    fn version_with(fields: Vec<FieldDefinition>) -> SchemaVersion {
        let mut version = SchemaVersion::new(1, CompatibilityMode::Forward, Utc::now());
        for field in fields {
            version = version.with_field(field);
        }
        version
    }

    fn field_map(entries: Vec<(u32, Value)>) -> FieldMap {
        entries.into_iter().collect()
    }

    #[test]
    fn test_strict_accepts_exact_type() {
        let version = version_with(vec![
            FieldDefinition::new(1, "name", FieldType::Text).required()
        ]);
        let fields = field_map(vec![(1, json!("Widget"))]);

        let normalized = validate_record(&fields, &version).unwrap();
        assert_eq!(normalized.get(&1), Some(&json!("Widget")));
    }

    #[test]
    fn test_strict_rejects_mismatch() {
        let version = version_with(vec![
            FieldDefinition::new(1, "price", FieldType::Float).required()
        ]);
        // INTEGER 42 is not a FLOAT under STRICT
        let fields = field_map(vec![(1, json!(42))]);

        let err = validate_record(&fields, &version).unwrap_err();
        match err {
            SchemaError::Validation { field, reason } => {
                assert_eq!(field, "price");
                assert!(reason.contains("expected FLOAT"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_coerce_promotes_integer_to_decimal() {
        let version = version_with(vec![FieldDefinition::new(1, "amount", FieldType::Decimal)
            .required()
            .with_mode(ValidationMode::Coerce)]);
        let fields = field_map(vec![(1, json!(42))]);

        let normalized = validate_record(&fields, &version).unwrap();
        assert_eq!(normalized.get(&1), Some(&json!("42")));
    }

    #[test]
    fn test_coerce_parses_text() {
        let version = version_with(vec![FieldDefinition::new(1, "quantity", FieldType::Integer)
            .required()
            .with_mode(ValidationMode::Coerce)]);
        let fields = field_map(vec![(1, json!("17"))]);

        let normalized = validate_record(&fields, &version).unwrap();
        assert_eq!(normalized.get(&1), Some(&json!(17)));
    }

    #[test]
    fn test_coerce_surfaces_coercion_error() {
        let version = version_with(vec![FieldDefinition::new(1, "amount", FieldType::Decimal)
            .required()
            .with_mode(ValidationMode::Coerce)]);
        let fields = field_map(vec![(1, json!("abc"))]);

        let err = validate_record(&fields, &version).unwrap_err();
        assert!(matches!(err, SchemaError::Coercion { .. }));
    }

    #[test]
    fn test_loose_drops_unconvertible_optional() {
        let version = version_with(vec![
            FieldDefinition::new(1, "note", FieldType::Decimal).with_mode(ValidationMode::Loose)
        ]);
        let fields = field_map(vec![(1, json!("abc"))]);

        let normalized = validate_record(&fields, &version).unwrap();
        assert!(normalized.get(&1).is_none());
    }

    #[test]
    fn test_loose_unconvertible_required_falls_to_default() {
        let version = version_with(vec![FieldDefinition::new(1, "amount", FieldType::Decimal)
            .required()
            .with_mode(ValidationMode::Loose)
            .with_default(json!("0.00"))]);
        let fields = field_map(vec![(1, json!("abc"))]);

        let normalized = validate_record(&fields, &version).unwrap();
        assert_eq!(normalized.get(&1), Some(&json!("0.00")));
    }

    #[test]
    fn test_loose_unconvertible_required_without_default_fails() {
        let version = version_with(vec![FieldDefinition::new(1, "amount", FieldType::Decimal)
            .required()
            .with_mode(ValidationMode::Loose)]);
        let fields = field_map(vec![(1, json!("abc"))]);

        let err = validate_record(&fields, &version).unwrap_err();
        assert!(matches!(err, SchemaError::Validation { .. }));
    }

    #[test]
    fn test_loose_converts_through_text() {
        let version = version_with(vec![
            FieldDefinition::new(1, "amount", FieldType::Decimal).with_mode(ValidationMode::Loose)
        ]);
        // FLOAT 9.99 reaches DECIMAL through its text rendering
        let fields = field_map(vec![(1, json!(9.99))]);

        let normalized = validate_record(&fields, &version).unwrap();
        assert_eq!(normalized.get(&1), Some(&json!("9.99")));
    }

    #[test]
    fn test_default_fills_missing_field() {
        let version = version_with(vec![FieldDefinition::new(1, "status", FieldType::Text)
            .required()
            .with_default(json!("PENDING"))]);

        let normalized = validate_record(&FieldMap::new(), &version).unwrap();
        assert_eq!(normalized.get(&1), Some(&json!("PENDING")));
    }

    #[test]
    fn test_missing_required_without_default() {
        let version = version_with(vec![
            FieldDefinition::new(1, "name", FieldType::Text).required()
        ]);

        let err = validate_record(&FieldMap::new(), &version).unwrap_err();
        match err {
            SchemaError::Validation { field, reason } => {
                assert_eq!(field, "name");
                assert!(reason.contains("required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_optional_stays_absent() {
        let version = version_with(vec![FieldDefinition::new(1, "note", FieldType::Text)]);

        let normalized = validate_record(&FieldMap::new(), &version).unwrap();
        assert!(normalized.is_empty());
    }

    #[test]
    fn test_null_counts_as_absent() {
        let version = version_with(vec![FieldDefinition::new(1, "status", FieldType::Text)
            .with_default(json!("PENDING"))]);
        let fields = field_map(vec![(1, json!(null))]);

        let normalized = validate_record(&fields, &version).unwrap();
        assert_eq!(normalized.get(&1), Some(&json!("PENDING")));
    }

    #[test]
    fn test_unknown_field_numbers_dropped() {
        let version = version_with(vec![FieldDefinition::new(1, "name", FieldType::Text)]);
        let fields = field_map(vec![(1, json!("Widget")), (42, json!("stale"))]);

        let normalized = validate_record(&fields, &version).unwrap();
        assert_eq!(normalized.len(), 1);
        assert!(!normalized.contains_key(&42));
    }

    #[test]
    fn test_allowed_values() {
        let version = version_with(vec![FieldDefinition::new(1, "status", FieldType::Text)
            .with_allowed_values(vec![json!("PENDING"), json!("CONFIRMED")])]);

        let ok = field_map(vec![(1, json!("CONFIRMED"))]);
        assert!(validate_record(&ok, &version).is_ok());

        let bad = field_map(vec![(1, json!("INVALID_STATUS"))]);
        let err = validate_record(&bad, &version).unwrap_err();
        assert!(err.to_string().contains("allowed values"));
    }

    #[test]
    fn test_numeric_bounds() {
        let version = version_with(vec![FieldDefinition::new(1, "quantity", FieldType::Integer)
            .with_constraints(FieldConstraints {
                min_value: Some(1.0),
                max_value: Some(100.0),
                ..FieldConstraints::default()
            })]);

        assert!(validate_record(&field_map(vec![(1, json!(50))]), &version).is_ok());
        assert!(validate_record(&field_map(vec![(1, json!(0))]), &version).is_err());
        assert!(validate_record(&field_map(vec![(1, json!(101))]), &version).is_err());
    }

    #[test]
    fn test_decimal_bounds_compare_numerically() {
        let version = version_with(vec![FieldDefinition::new(1, "amount", FieldType::Decimal)
            .with_constraints(FieldConstraints {
                min_value: Some(0.0),
                ..FieldConstraints::default()
            })]);

        assert!(validate_record(&field_map(vec![(1, json!("10.50"))]), &version).is_ok());
        assert!(validate_record(&field_map(vec![(1, json!("-0.01"))]), &version).is_err());
    }

    #[test]
    fn test_text_length_bounds() {
        let version = version_with(vec![FieldDefinition::new(1, "code", FieldType::Text)
            .with_constraints(FieldConstraints {
                min_length: Some(3),
                max_length: Some(5),
                ..FieldConstraints::default()
            })]);

        assert!(validate_record(&field_map(vec![(1, json!("A-100"))]), &version).is_ok());
        assert!(validate_record(&field_map(vec![(1, json!("AB"))]), &version).is_err());
        assert!(validate_record(&field_map(vec![(1, json!("TOOLONG"))]), &version).is_err());
    }

    #[test]
    fn test_pattern_matches_whole_value() {
        let version = version_with(vec![FieldDefinition::new(1, "email", FieldType::Text)
            .with_constraints(FieldConstraints {
                pattern: Some(r"[^@\s]+@[^@\s]+\.[^@\s]+".to_string()),
                ..FieldConstraints::default()
            })]);

        assert!(validate_record(
            &field_map(vec![(1, json!("ops@example.com"))]),
            &version
        )
        .is_ok());
        assert!(validate_record(&field_map(vec![(1, json!("not-an-email"))]), &version).is_err());
        // Substring matches are not enough
        assert!(validate_record(
            &field_map(vec![(1, json!("x ops@example.com y"))]),
            &version
        )
        .is_err());
    }

    #[test]
    fn test_decimal_precision() {
        let version = version_with(vec![FieldDefinition::new(1, "amount", FieldType::Decimal)
            .with_constraints(FieldConstraints {
                precision: Some(2),
                ..FieldConstraints::default()
            })]);

        assert!(validate_record(&field_map(vec![(1, json!("19.99"))]), &version).is_ok());
        assert!(validate_record(&field_map(vec![(1, json!("42"))]), &version).is_ok());
        assert!(validate_record(&field_map(vec![(1, json!("19.999"))]), &version).is_err());
    }

    #[test]
    fn test_constraints_apply_after_coercion() {
        let version = version_with(vec![FieldDefinition::new(1, "quantity", FieldType::Integer)
            .with_mode(ValidationMode::Coerce)
            .with_constraints(FieldConstraints {
                min_value: Some(1.0),
                ..FieldConstraints::default()
            })]);

        // "0" parses into INTEGER 0, which then violates the bound
        let err = validate_record(&field_map(vec![(1, json!("0"))]), &version).unwrap_err();
        assert!(err.to_string().contains("below minimum"));
    }
}
