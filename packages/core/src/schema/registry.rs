//! Schema Registry
//!
//! Process-wide lookup of schema evolutions, one per node type. The
//! registry is read-mostly: `evolution`, `latest_version`, and `migrate`
//! take a shared snapshot and never block each other. `register` is the
//! sole mutator; it rebuilds the affected evolution off to the side and
//! swaps it in whole, so readers observe either the fully-old or the
//! fully-new history, never a half-updated one.

use crate::models::{FieldMap, SchemaVersion};
use crate::schema::error::SchemaError;
use crate::schema::evolution::SchemaEvolution;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

type EvolutionMap = HashMap<String, Arc<SchemaEvolution>>;

/// Shared registry of all node type schema histories
#[derive(Debug)]
pub struct SchemaRegistry {
    evolutions: RwLock<EvolutionMap>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            evolutions: RwLock::new(HashMap::new()),
        }
    }

    // The map only ever holds fully-built evolutions swapped in under the
    // write lock, so a poisoned lock still guards a consistent map.
    fn read_map(&self) -> RwLockReadGuard<'_, EvolutionMap> {
        self.evolutions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, EvolutionMap> {
        self.evolutions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of a node type's schema history
    ///
    /// The returned `Arc` stays valid even if a new version is registered
    /// afterwards; callers migrating a record against it see one coherent
    /// history for the whole operation.
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` if the node type is unknown.
    pub fn evolution(&self, node_type: &str) -> Result<Arc<SchemaEvolution>, SchemaError> {
        self.read_map()
            .get(node_type)
            .cloned()
            .ok_or_else(|| SchemaError::unknown_node_type(node_type))
    }

    /// Register the next schema version for a node type
    ///
    /// Unknown node types are created on their first version. The rebuilt
    /// history replaces the old one only after every registration check
    /// passed; on error the registry is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Propagates `SchemaError::DuplicateVersion` and
    /// `SchemaError::IncompatibleSchema` from the evolution's checks.
    pub fn register(&self, node_type: &str, version: SchemaVersion) -> Result<(), SchemaError> {
        let number = version.version;
        let mut map = self.write_map();
        let mut evolution = match map.get(node_type) {
            Some(existing) => existing.as_ref().clone(),
            None => SchemaEvolution::new(node_type),
        };
        evolution.register(version)?;
        map.insert(node_type.to_string(), Arc::new(evolution));
        info!(node_type, version = number, "schema version registered");
        Ok(())
    }

    /// Install a pre-built evolution, replacing any existing history
    ///
    /// Used when loading catalogs at startup; the evolution has already
    /// been validated by replaying its versions through `register`.
    pub fn insert_evolution(&self, evolution: SchemaEvolution) {
        let mut map = self.write_map();
        map.insert(evolution.node_type().to_string(), Arc::new(evolution));
    }

    /// Current version number for a node type
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` if the node type is unknown.
    pub fn latest_version(&self, node_type: &str) -> Result<u32, SchemaError> {
        Ok(self.evolution(node_type)?.latest()?.version)
    }

    /// Migrate a field map between two versions of a node type
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` for unknown node types or versions,
    /// plus any migration error from the evolution.
    pub fn migrate(
        &self,
        node_type: &str,
        fields: &FieldMap,
        from_version: u32,
        to_version: u32,
    ) -> Result<FieldMap, SchemaError> {
        self.evolution(node_type)?
            .migrate(fields, from_version, to_version)
    }

    /// All registered node types, sorted
    pub fn node_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_map().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompatibilityMode, FieldChange, FieldDefinition, FieldType};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn v1() -> SchemaVersion {
        SchemaVersion::new(
            1,
            CompatibilityMode::Forward,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
        .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
    }

    fn v2() -> SchemaVersion {
        SchemaVersion::new(
            2,
            CompatibilityMode::Forward,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
        .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
        .with_field(FieldDefinition::new(2, "status", FieldType::Text).with_default(json!("active")))
        .with_changes(vec![FieldChange::AddField { field_number: 2 }])
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = SchemaRegistry::new();
        registry.register("product", v1()).unwrap();
        registry.register("product", v2()).unwrap();

        assert_eq!(registry.latest_version("product").unwrap(), 2);
        let evolution = registry.evolution("product").unwrap();
        assert_eq!(evolution.version_count(), 2);
    }

    #[test]
    fn test_unknown_node_type() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.evolution("ghost").unwrap_err(),
            SchemaError::VersionNotFound { .. }
        ));
    }

    #[test]
    fn test_failed_register_leaves_registry_unchanged() {
        let registry = SchemaRegistry::new();
        registry.register("product", v1()).unwrap();

        // gap in numbering
        let v3 = SchemaVersion::new(
            3,
            CompatibilityMode::Forward,
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
        )
        .with_field(FieldDefinition::new(1, "code", FieldType::Text).required());
        assert!(registry.register("product", v3).is_err());

        let evolution = registry.evolution("product").unwrap();
        assert_eq!(evolution.version_count(), 1);
        assert_eq!(evolution.latest().unwrap().valid_to, None);
    }

    #[test]
    fn test_snapshot_survives_later_registration() {
        let registry = SchemaRegistry::new();
        registry.register("product", v1()).unwrap();

        let snapshot = registry.evolution("product").unwrap();
        registry.register("product", v2()).unwrap();

        // the held snapshot still describes the old state
        assert_eq!(snapshot.version_count(), 1);
        assert_eq!(registry.evolution("product").unwrap().version_count(), 2);
    }

    #[test]
    fn test_migrate_through_registry() {
        let registry = SchemaRegistry::new();
        registry.register("product", v1()).unwrap();
        registry.register("product", v2()).unwrap();

        let record: FieldMap = [(1, json!("A1"))].into_iter().collect();
        let upgraded = registry.migrate("product", &record, 1, 2).unwrap();
        assert_eq!(upgraded.get(&2), Some(&json!("active")));
    }

    #[test]
    fn test_node_types_sorted() {
        let registry = SchemaRegistry::new();
        registry.register("product", v1()).unwrap();
        registry.register("customer", v1()).unwrap();

        assert_eq!(registry.node_types(), vec!["customer", "product"]);
    }

    #[test]
    fn test_concurrent_registration_of_distinct_node_types() {
        let registry = Arc::new(SchemaRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register(&format!("type_{i}"), v1()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.node_types().len(), 8);
    }
}
