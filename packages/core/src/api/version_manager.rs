//! API Version Manager
//!
//! External callers speak a named API version ("v1", "v2"); internally every
//! record is stored at the latest schema version of its node type. This
//! module holds the bindings between the two and drives the schema engine
//! to translate payloads at the boundary:
//!
//! - `to_internal` takes a named payload shaped for the caller's API
//!   version and returns a field map upgraded to the latest version
//! - `from_internal` takes a latest-version field map and returns a named
//!   payload downgraded to the caller's API version
//!
//! Bindings are registered once at startup and immutable afterwards, so
//! lookups are read-only and never contend.

use crate::models::{fields_from_named, fields_to_named, FieldMap};
use crate::schema::{SchemaError, SchemaRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// One API version's node type bindings
///
/// Maps each covered node type to the internal schema version that API
/// version serializes against, plus the instant the binding took effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiVersionBinding {
    pub api_version: String,
    pub bindings: HashMap<String, u32>,
    pub effective_at: DateTime<Utc>,
}

impl ApiVersionBinding {
    pub fn new(api_version: impl Into<String>, effective_at: DateTime<Utc>) -> Self {
        Self {
            api_version: api_version.into(),
            bindings: HashMap::new(),
            effective_at,
        }
    }

    /// Bind a node type to an internal schema version (builder style)
    pub fn with_binding(mut self, node_type: impl Into<String>, version: u32) -> Self {
        self.bindings.insert(node_type.into(), version);
        self
    }

    /// Internal schema version this API version uses for a node type
    pub fn bound_version(&self, node_type: &str) -> Option<u32> {
        self.bindings.get(node_type).copied()
    }
}

/// Registry of API version bindings plus the payload translation entry points
#[derive(Debug)]
pub struct ApiVersionManager {
    registry: Arc<SchemaRegistry>,
    bindings: RwLock<HashMap<String, ApiVersionBinding>>,
}

impl ApiVersionManager {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    // Bindings are registered whole under the write lock, so the map is
    // consistent even behind a poisoned lock.
    fn read_bindings(&self) -> RwLockReadGuard<'_, HashMap<String, ApiVersionBinding>> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_bindings(&self) -> RwLockWriteGuard<'_, HashMap<String, ApiVersionBinding>> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an API version's bindings
    ///
    /// Every bound (node type, version) pair must resolve against the
    /// schema registry; nothing is stored if any pair fails, so a partial
    /// binding can never be observed.
    ///
    /// # Errors
    ///
    /// - `SchemaError::DuplicateVersion` if the API version is already
    ///   registered
    /// - `SchemaError::VersionNotFound` if a bound node type or schema
    ///   version does not exist
    pub fn register(&self, binding: ApiVersionBinding) -> Result<(), SchemaError> {
        for (node_type, version) in &binding.bindings {
            self.registry.evolution(node_type)?.resolve(*version)?;
        }

        let mut bindings = self.write_bindings();
        if bindings.contains_key(&binding.api_version) {
            return Err(SchemaError::duplicate_api_version(&binding.api_version));
        }
        info!(
            api_version = %binding.api_version,
            node_types = binding.bindings.len(),
            "API version registered"
        );
        bindings.insert(binding.api_version.clone(), binding);
        Ok(())
    }

    /// Internal schema version bound for (api_version, node_type)
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` if the API version is unregistered or
    /// does not cover the node type.
    pub fn resolve(&self, api_version: &str, node_type: &str) -> Result<u32, SchemaError> {
        let bindings = self.read_bindings();
        let binding = bindings
            .get(api_version)
            .ok_or_else(|| SchemaError::api_version_not_found(api_version))?;
        binding
            .bound_version(node_type)
            .ok_or_else(|| SchemaError::api_binding_not_found(api_version, node_type))
    }

    /// Translate an inbound named payload into a latest-version field map
    ///
    /// The payload is interpreted against the schema the caller's API
    /// version is bound to; names the bound schema does not declare are
    /// dropped. The resulting field map is migrated up to the latest
    /// version, ready for validation and storage.
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` for unknown API versions, node types,
    /// or bindings, plus any migration error from the evolution.
    pub fn to_internal(
        &self,
        api_version: &str,
        node_type: &str,
        payload: &Map<String, Value>,
    ) -> Result<FieldMap, SchemaError> {
        let bound = self.resolve(api_version, node_type)?;
        let evolution = self.registry.evolution(node_type)?;
        let bound_schema = evolution.resolve(bound)?;
        let fields = fields_from_named(payload, bound_schema);
        let latest = evolution.latest()?.version;
        evolution.migrate(&fields, bound, latest)
    }

    /// Translate a latest-version field map into an outbound named payload
    ///
    /// The inverse of `to_internal`: the field map is migrated down to the
    /// bound version, then rendered under that version's field names.
    /// Fields the bound schema does not know are dropped.
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` for unknown API versions, node types,
    /// or bindings; downgrade errors propagate from the evolution.
    pub fn from_internal(
        &self,
        api_version: &str,
        node_type: &str,
        fields: &FieldMap,
    ) -> Result<Map<String, Value>, SchemaError> {
        let bound = self.resolve(api_version, node_type)?;
        let evolution = self.registry.evolution(node_type)?;
        let latest = evolution.latest()?.version;
        let downgraded = evolution.migrate(fields, latest, bound)?;
        let bound_schema = evolution.resolve(bound)?;
        Ok(fields_to_named(&downgraded, bound_schema))
    }

    /// The binding in effect at a given instant
    ///
    /// Returns the registered binding with the greatest `effective_at` at
    /// or before `at`, or `None` when the instant predates every binding.
    pub fn binding_effective_at(&self, at: DateTime<Utc>) -> Option<ApiVersionBinding> {
        self.read_bindings()
            .values()
            .filter(|b| b.effective_at <= at)
            .max_by_key(|b| b.effective_at)
            .cloned()
    }

    /// Registered API versions ordered by effective instant
    pub fn api_versions(&self) -> Vec<String> {
        let bindings = self.read_bindings();
        let mut all: Vec<&ApiVersionBinding> = bindings.values().collect();
        all.sort_by_key(|b| b.effective_at);
        all.iter().map(|b| b.api_version.clone()).collect()
    }
}
