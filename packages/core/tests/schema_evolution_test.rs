//! Schema Evolution Lifecycle Tests
//!
//! Integration tests for the version history engine: registering versions
//! through the registry, resolving schemas by number and by instant, and
//! migrating records along the chain in both directions.
//!
//! ## Coverage
//!
//! - Register/resolve/latest lifecycle and validity windows
//! - Compatibility mode enforcement across all four modes
//! - Field number immutability (no renames, no reuse)
//! - Forward/backward migration, round trips, idempotence
//! - Coercion behavior under the three validation modes

#[cfg(test)]
mod schema_evolution_tests {
    use anyhow::Result;
    use chrono::{DateTime, TimeZone, Utc};
    use nodevault_core::{
        coerce, validate_record, CompatibilityMode, FieldChange, FieldDefinition, FieldMap,
        FieldType, SchemaError, SchemaRegistry, SchemaVersion, ValidationMode,
    };
    use serde_json::{json, Value};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn fields(entries: Vec<(u32, Value)>) -> FieldMap {
        entries.into_iter().collect()
    }

    fn product_v1() -> SchemaVersion {
        SchemaVersion::new(1, CompatibilityMode::Forward, ts(1))
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
            .with_field(FieldDefinition::new(2, "name", FieldType::Text).required())
            .with_field(FieldDefinition::new(3, "price", FieldType::Float).required())
    }

    fn product_v2() -> SchemaVersion {
        SchemaVersion::new(2, CompatibilityMode::Forward, ts(2))
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
            .with_field(FieldDefinition::new(2, "name", FieldType::Text).required())
            .with_field(FieldDefinition::new(3, "price", FieldType::Float).required())
            .with_field(
                FieldDefinition::new(4, "status", FieldType::Text).with_default(json!("active")),
            )
            .with_changes(vec![FieldChange::AddField { field_number: 4 }])
    }

    fn product_registry() -> Result<SchemaRegistry> {
        let registry = SchemaRegistry::new();
        registry.register("product", product_v1())?;
        registry.register("product", product_v2())?;
        Ok(registry)
    }

    #[test]
    fn test_register_resolve_lifecycle() -> Result<()> {
        let registry = product_registry()?;
        let evolution = registry.evolution("product")?;

        assert_eq!(evolution.version_count(), 2);
        assert_eq!(evolution.latest()?.version, 2);
        assert_eq!(evolution.resolve(1)?.version, 1);

        // v1's window closed exactly where v2 begins
        assert_eq!(evolution.resolve(1)?.valid_to, Some(ts(2)));
        assert_eq!(evolution.resolve(2)?.valid_to, None);
        Ok(())
    }

    #[test]
    fn test_resolve_by_instant_half_open_windows() -> Result<()> {
        let registry = product_registry()?;
        let evolution = registry.evolution("product")?;

        assert_eq!(evolution.resolve_at(ts(1))?.version, 1);
        // the boundary instant belongs to the newer version
        assert_eq!(evolution.resolve_at(ts(2))?.version, 2);
        assert_eq!(evolution.resolve_at(ts(20))?.version, 2);

        let before = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            evolution.resolve_at(before).unwrap_err(),
            SchemaError::VersionNotFound { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_product_record_migrates_to_v2() -> Result<()> {
        let registry = product_registry()?;
        let record = fields(vec![(1, json!("A1")), (2, json!("Widget")), (3, json!(9.99))]);

        let upgraded = registry.migrate("product", &record, 1, 2)?;
        let expected = fields(vec![
            (1, json!("A1")),
            (2, json!("Widget")),
            (3, json!(9.99)),
            (4, json!("active")),
        ]);
        assert_eq!(upgraded, expected);
        Ok(())
    }

    #[test]
    fn test_migration_round_trip_and_idempotence() -> Result<()> {
        let registry = product_registry()?;
        let evolution = registry.evolution("product")?;
        let record = fields(vec![(1, json!("A1")), (2, json!("Widget")), (3, json!(9.99))]);

        // identity
        assert_eq!(evolution.migrate(&record, 1, 1)?, record);

        // round trip through the added field
        let upgraded = evolution.migrate(&record, 1, 2)?;
        assert_eq!(evolution.migrate(&upgraded, 2, 1)?, record);

        // repeating a migration on its own output changes nothing
        assert_eq!(evolution.migrate(&upgraded, 2, 2)?, upgraded);
        Ok(())
    }

    #[test]
    fn test_forward_compatibility_enforcement() -> Result<()> {
        // removing a required field violates FORWARD
        let registry = SchemaRegistry::new();
        registry.register("product", product_v1())?;
        let dropped = SchemaVersion::new(2, CompatibilityMode::Forward, ts(2))
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
            .with_field(FieldDefinition::new(2, "name", FieldType::Text).required())
            .with_changes(vec![FieldChange::RemoveField { field_number: 3 }]);
        assert!(matches!(
            registry.register("product", dropped).unwrap_err(),
            SchemaError::IncompatibleSchema { .. }
        ));

        // adding an optional field with a default is fine
        registry.register("product", product_v2())?;
        assert_eq!(registry.latest_version("product")?, 2);
        Ok(())
    }

    #[test]
    fn test_strict_compatibility_freezes_schema() -> Result<()> {
        let registry = SchemaRegistry::new();
        let frozen = SchemaVersion::new(1, CompatibilityMode::Strict, ts(1))
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required());
        registry.register("ledger", frozen)?;

        let extended = SchemaVersion::new(2, CompatibilityMode::Strict, ts(2))
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
            .with_field(FieldDefinition::new(2, "memo", FieldType::Text))
            .with_changes(vec![FieldChange::AddField { field_number: 2 }]);
        assert!(registry.register("ledger", extended).is_err());
        Ok(())
    }

    #[test]
    fn test_backward_compatibility_rules() -> Result<()> {
        let registry = SchemaRegistry::new();
        let v1 = SchemaVersion::new(1, CompatibilityMode::Backward, ts(1))
            .with_field(FieldDefinition::new(1, "quantity", FieldType::Integer).required());
        registry.register("order", v1)?;

        // a new required field without a default strands old data
        let bare = SchemaVersion::new(2, CompatibilityMode::Backward, ts(2))
            .with_field(FieldDefinition::new(1, "quantity", FieldType::Integer).required())
            .with_field(FieldDefinition::new(2, "warehouse", FieldType::Text).required())
            .with_changes(vec![FieldChange::AddField { field_number: 2 }]);
        assert!(registry.register("order", bare).is_err());

        // widening INTEGER to FLOAT is permitted
        let widened = SchemaVersion::new(2, CompatibilityMode::Backward, ts(2))
            .with_field(FieldDefinition::new(1, "quantity", FieldType::Float).required())
            .with_changes(vec![FieldChange::ModifyField { field_number: 1 }]);
        registry.register("order", widened)?;
        Ok(())
    }

    #[test]
    fn test_field_number_immutability() -> Result<()> {
        let registry = SchemaRegistry::new();
        registry.register("product", product_v1())?;

        // reassigning field 1 to a differently named field
        let renamed = SchemaVersion::new(2, CompatibilityMode::Forward, ts(2))
            .with_field(FieldDefinition::new(1, "sku", FieldType::Text).required())
            .with_field(FieldDefinition::new(2, "name", FieldType::Text).required())
            .with_field(FieldDefinition::new(3, "price", FieldType::Float).required())
            .with_changes(vec![FieldChange::ModifyField { field_number: 1 }]);
        assert!(matches!(
            registry.register("product", renamed).unwrap_err(),
            SchemaError::IncompatibleSchema { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_duplicate_and_gap_version_numbers() -> Result<()> {
        let registry = product_registry()?;

        assert!(matches!(
            registry.register("product", product_v2()).unwrap_err(),
            SchemaError::DuplicateVersion { .. }
        ));

        let gapped = SchemaVersion::new(5, CompatibilityMode::Forward, ts(5))
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
            .with_field(FieldDefinition::new(2, "name", FieldType::Text).required())
            .with_field(FieldDefinition::new(3, "price", FieldType::Float).required())
            .with_field(
                FieldDefinition::new(4, "status", FieldType::Text).with_default(json!("active")),
            );
        assert!(matches!(
            registry.register("product", gapped).unwrap_err(),
            SchemaError::IncompatibleSchema { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_downgrade_failure_paths() -> Result<()> {
        // a type change with no reverse promotion cannot downgrade
        let registry = SchemaRegistry::new();
        let v1 = SchemaVersion::new(1, CompatibilityMode::Forward, ts(1))
            .with_field(FieldDefinition::new(1, "quantity", FieldType::Integer).required());
        let v2 = SchemaVersion::new(2, CompatibilityMode::Forward, ts(2))
            .with_field(FieldDefinition::new(1, "quantity", FieldType::Decimal).required())
            .with_changes(vec![FieldChange::ModifyField { field_number: 1 }]);
        registry.register("order", v1)?;
        registry.register("order", v2)?;

        let record = fields(vec![(1, json!("7"))]);
        assert!(matches!(
            registry.migrate("order", &record, 2, 1).unwrap_err(),
            SchemaError::Coercion { .. }
        ));

        // a removed field without a default cannot be reinstated
        let registry = SchemaRegistry::new();
        let v1 = SchemaVersion::new(1, CompatibilityMode::Forward, ts(1))
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
            .with_field(FieldDefinition::new(2, "note", FieldType::Text));
        let v2 = SchemaVersion::new(2, CompatibilityMode::Forward, ts(2))
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
            .with_changes(vec![FieldChange::RemoveField { field_number: 2 }]);
        registry.register("order", v1)?;
        registry.register("order", v2)?;

        let record = fields(vec![(1, json!("A1"))]);
        assert!(matches!(
            registry.migrate("order", &record, 2, 1).unwrap_err(),
            SchemaError::VersionNotFound { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_coercion_under_validation_modes() -> Result<()> {
        // INTEGER 42 to DECIMAL is exact under COERCE
        assert_eq!(
            coerce(&json!(42), FieldType::Integer, FieldType::Decimal)?,
            json!("42")
        );

        // TEXT "abc" to DECIMAL fails with a coercion error
        assert!(matches!(
            coerce(&json!("abc"), FieldType::Text, FieldType::Decimal).unwrap_err(),
            SchemaError::Coercion { .. }
        ));

        // the same value on a LOOSE optional field is treated as absent
        let version = SchemaVersion::new(1, CompatibilityMode::Forward, ts(1)).with_field(
            FieldDefinition::new(1, "amount", FieldType::Decimal).with_mode(ValidationMode::Loose),
        );
        let normalized = validate_record(&fields(vec![(1, json!("abc"))]), &version)?;
        assert!(normalized.get(&1).is_none());

        // with a default, absence resolves to the default
        let version = SchemaVersion::new(1, CompatibilityMode::Forward, ts(1)).with_field(
            FieldDefinition::new(1, "amount", FieldType::Decimal)
                .with_mode(ValidationMode::Loose)
                .with_default(json!("0.00")),
        );
        let normalized = validate_record(&fields(vec![(1, json!("abc"))]), &version)?;
        assert_eq!(normalized.get(&1), Some(&json!("0.00")));
        Ok(())
    }

    #[test]
    fn test_multi_version_chain_migration() -> Result<()> {
        let registry = SchemaRegistry::new();
        let v1 = SchemaVersion::new(1, CompatibilityMode::Forward, ts(1))
            .with_field(FieldDefinition::new(1, "quantity", FieldType::Integer).required());
        let v2 = SchemaVersion::new(2, CompatibilityMode::Forward, ts(2))
            .with_field(FieldDefinition::new(1, "quantity", FieldType::Integer).required())
            .with_field(FieldDefinition::new(2, "channel", FieldType::Text).with_default(json!("web")))
            .with_changes(vec![FieldChange::AddField { field_number: 2 }]);
        let v3 = SchemaVersion::new(3, CompatibilityMode::Forward, ts(3))
            .with_field(FieldDefinition::new(1, "quantity", FieldType::Decimal).required())
            .with_field(FieldDefinition::new(2, "channel", FieldType::Text).with_default(json!("web")))
            .with_changes(vec![FieldChange::ModifyField { field_number: 1 }]);
        registry.register("order", v1)?;
        registry.register("order", v2)?;
        registry.register("order", v3)?;

        let record = fields(vec![(1, json!(5))]);
        let upgraded = registry.migrate("order", &record, 1, 3)?;
        assert_eq!(upgraded.get(&1), Some(&json!("5")));
        assert_eq!(upgraded.get(&2), Some(&json!("web")));
        Ok(())
    }
}
