//! Record Service - Core CRUD Operations
//!
//! The business logic layer for versioned records. Every operation runs the
//! same pipeline: resolve the node type's schema, translate between named
//! payloads and field-number maps, migrate across versions, validate, then
//! hand the result to the storage backend.
//!
//! # Lazy Migration
//!
//! Records are stored at whatever version was current when they were last
//! written. Reads migrate the field map up to the latest version in memory
//! and return it as such, but never write the migrated form back; bulk
//! rewriting is the upgrade service's job. A read therefore never mutates
//! storage, and records written by old code stay valid indefinitely.
//!
//! # API Versions
//!
//! The `*_for_api` variants accept and produce named payloads shaped for a
//! registered API version, translating through the `ApiVersionManager` at
//! the boundary. Internal callers use field maps at the latest version
//! directly.

use crate::api::ApiVersionManager;
use crate::db::RecordStore;
use crate::models::{fields_from_named, DeleteResult, FieldMap, StoredRecord};
use crate::schema::{validate_record, SchemaRegistry};
use crate::services::error::ServiceError;
use serde_json::{Map, Value};
use std::sync::Arc;

/// CRUD operations over versioned records
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    registry: Arc<SchemaRegistry>,
    api_versions: Arc<ApiVersionManager>,
}

impl Clone for RecordService {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            api_versions: Arc::clone(&self.api_versions),
        }
    }
}

impl RecordService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: Arc<SchemaRegistry>,
        api_versions: Arc<ApiVersionManager>,
    ) -> Self {
        Self {
            store,
            registry,
            api_versions,
        }
    }

    /// Schema registry this service resolves against
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// API version manager used by the `*_for_api` operations
    pub fn api_versions(&self) -> &Arc<ApiVersionManager> {
        &self.api_versions
    }

    /// Create a record from a named payload at the latest schema version
    ///
    /// Field names the latest schema does not declare are dropped. The
    /// payload is validated and normalized before anything is stored.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Schema` for unknown node types and validation or
    ///   coercion failures
    /// - `ServiceError::Storage` if the backend rejects the write
    pub async fn create(
        &self,
        node_type: &str,
        payload: &Map<String, Value>,
    ) -> Result<StoredRecord, ServiceError> {
        let evolution = self.registry.evolution(node_type)?;
        let latest = evolution.latest()?;
        let fields = fields_from_named(payload, latest);
        self.persist_new(node_type, fields).await
    }

    /// Create a record from a payload shaped for a registered API version
    ///
    /// The payload is interpreted against the API version's bound schema,
    /// migrated up to the latest version, then validated and stored.
    ///
    /// # Errors
    ///
    /// As `create`, plus `ServiceError::Schema` with a version lookup error
    /// when the API version or binding is unknown.
    pub async fn create_for_api(
        &self,
        api_version: &str,
        node_type: &str,
        payload: &Map<String, Value>,
    ) -> Result<StoredRecord, ServiceError> {
        let fields = self.api_versions.to_internal(api_version, node_type, payload)?;
        self.persist_new(node_type, fields).await
    }

    async fn persist_new(
        &self,
        node_type: &str,
        fields: FieldMap,
    ) -> Result<StoredRecord, ServiceError> {
        let evolution = self.registry.evolution(node_type)?;
        let latest = evolution.latest()?;
        let normalized = validate_record(&fields, latest)?;

        let id = self.store.next_id(node_type).await?;
        let record = StoredRecord::new(id, node_type, latest.version, normalized);
        let stored = self.store.create_record(record).await?;
        tracing::info!(
            node_type,
            id = stored.id,
            version = stored.schema_version,
            "record created"
        );
        Ok(stored)
    }

    /// Fetch a record, upgraded in memory to the latest schema version
    ///
    /// # Errors
    ///
    /// - `ServiceError::RecordNotFound` if no such record exists
    /// - `ServiceError::Schema` if the stored version can no longer migrate
    ///   to the latest
    pub async fn get(&self, node_type: &str, id: u64) -> Result<StoredRecord, ServiceError> {
        let record = self.fetch(node_type, id).await?;
        self.upgrade_to_latest(record)
    }

    /// Fetch a record represented at an explicit schema version
    ///
    /// Downgrades as well as upgrades; asking for the stored version
    /// returns the record as persisted.
    ///
    /// # Errors
    ///
    /// As `get`, plus `ServiceError::Schema` when the requested version is
    /// unknown or the downgrade path is irreversible.
    pub async fn get_at(
        &self,
        node_type: &str,
        id: u64,
        version: u32,
    ) -> Result<StoredRecord, ServiceError> {
        let mut record = self.fetch(node_type, id).await?;
        if record.schema_version != version {
            let evolution = self.registry.evolution(node_type)?;
            record.fields = evolution.migrate(&record.fields, record.schema_version, version)?;
            record.schema_version = version;
        }
        Ok(record)
    }

    /// Fetch a record as a named payload shaped for an API version
    ///
    /// # Errors
    ///
    /// As `get`, plus version lookup errors for the API binding.
    pub async fn get_for_api(
        &self,
        api_version: &str,
        node_type: &str,
        id: u64,
    ) -> Result<Map<String, Value>, ServiceError> {
        let record = self.get(node_type, id).await?;
        Ok(self
            .api_versions
            .from_internal(api_version, node_type, &record.fields)?)
    }

    /// Merge named updates into a record at the latest schema version
    ///
    /// The record is first upgraded to the latest version, then the given
    /// fields replace their current values. An explicit JSON null clears a
    /// field, which re-applies its default if one is declared. The merged
    /// record is re-validated before it is written back.
    ///
    /// # Errors
    ///
    /// - `ServiceError::RecordNotFound` if no such record exists
    /// - `ServiceError::Schema` if the merged record fails validation
    /// - `ServiceError::Storage` if the backend rejects the write
    pub async fn update(
        &self,
        node_type: &str,
        id: u64,
        updates: &Map<String, Value>,
    ) -> Result<StoredRecord, ServiceError> {
        let mut record = self.get(node_type, id).await?;

        let evolution = self.registry.evolution(node_type)?;
        let latest = evolution.latest()?;
        for (number, value) in fields_from_named(updates, latest) {
            record.fields.insert(number, value);
        }
        record.fields = validate_record(&record.fields, latest)?;
        record.touch();

        let stored = self.store.update_record(record).await?;
        tracing::info!(node_type, id, "record updated");
        Ok(stored)
    }

    /// Delete a record
    ///
    /// Deleting an absent record reports `existed = false` rather than
    /// failing.
    ///
    /// # Errors
    ///
    /// `ServiceError::Storage` if the backend fails.
    pub async fn delete(&self, node_type: &str, id: u64) -> Result<DeleteResult, ServiceError> {
        let result = self.store.delete_record(node_type, id).await?;
        if result.existed {
            tracing::info!(node_type, id, "record deleted");
        }
        Ok(result)
    }

    /// All record ids of a node type, ascending
    ///
    /// # Errors
    ///
    /// `ServiceError::Storage` if the backend fails.
    pub async fn list_ids(&self, node_type: &str) -> Result<Vec<u64>, ServiceError> {
        Ok(self.store.list_ids(node_type).await?)
    }

    async fn fetch(&self, node_type: &str, id: u64) -> Result<StoredRecord, ServiceError> {
        self.store
            .get_record(node_type, id)
            .await?
            .ok_or_else(|| ServiceError::record_not_found(node_type, id))
    }

    /// In-memory upgrade to the latest version; storage is left untouched
    fn upgrade_to_latest(&self, mut record: StoredRecord) -> Result<StoredRecord, ServiceError> {
        let evolution = self.registry.evolution(&record.node_type)?;
        let latest = evolution.latest()?.version;
        if record.schema_version != latest {
            tracing::debug!(
                node_type = %record.node_type,
                id = record.id,
                from = record.schema_version,
                to = latest,
                "lazily migrating record on read"
            );
            record.fields = evolution.migrate(&record.fields, record.schema_version, latest)?;
            record.schema_version = latest;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiVersionBinding;
    use crate::db::MemoryStore;
    use crate::models::{
        CompatibilityMode, FieldChange, FieldDefinition, FieldMap, FieldType, SchemaVersion,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ts(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
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

    struct Fixture {
        service: RecordService,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(SchemaRegistry::new());
        registry.register("product", product_v1()).unwrap();
        registry.register("product", product_v2()).unwrap();

        let api_versions = Arc::new(ApiVersionManager::new(Arc::clone(&registry)));
        api_versions
            .register(ApiVersionBinding::new("v1", ts(1)).with_binding("product", 1))
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        let service = RecordService::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            registry,
            api_versions,
        );
        Fixture { service, store }
    }

    fn widget_payload() -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("code".to_string(), json!("A1"));
        payload.insert("name".to_string(), json!("Widget"));
        payload.insert("price".to_string(), json!(9.99));
        payload
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_fills_defaults() {
        let fx = fixture();
        let record = fx.service.create("product", &widget_payload()).await.unwrap();

        assert_eq!(record.id, 1);
        assert_eq!(record.schema_version, 2);
        assert_eq!(record.fields.get(&4), Some(&json!("active")));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required_field() {
        let fx = fixture();
        let mut payload = widget_payload();
        payload.remove("price");

        let err = fx.service.create("product", &payload).await.unwrap_err();
        assert!(matches!(err, ServiceError::Schema(_)));
    }

    #[tokio::test]
    async fn test_create_unknown_node_type() {
        let fx = fixture();
        let err = fx.service.create("ghost", &widget_payload()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Schema(_)));
    }

    #[tokio::test]
    async fn test_get_migrates_legacy_record_without_write_back() {
        let fx = fixture();
        // simulate a record written before v2 existed
        let fields: FieldMap = [(1, json!("A1")), (2, json!("Widget")), (3, json!(9.99))]
            .into_iter()
            .collect();
        fx.store
            .create_record(StoredRecord::new(7, "product", 1, fields))
            .await
            .unwrap();

        let read = fx.service.get("product", 7).await.unwrap();
        assert_eq!(read.schema_version, 2);
        assert_eq!(read.fields.get(&4), Some(&json!("active")));

        // storage still holds the v1 form
        let raw = fx.store.get_record("product", 7).await.unwrap().unwrap();
        assert_eq!(raw.schema_version, 1);
        assert!(raw.fields.get(&4).is_none());
    }

    #[tokio::test]
    async fn test_get_at_downgrades() {
        let fx = fixture();
        fx.service.create("product", &widget_payload()).await.unwrap();

        let v1_view = fx.service.get_at("product", 1, 1).await.unwrap();
        assert_eq!(v1_view.schema_version, 1);
        assert!(v1_view.fields.get(&4).is_none());
    }

    #[tokio::test]
    async fn test_get_missing_record() {
        let fx = fixture();
        let err = fx.service.get("product", 42).await.unwrap_err();
        assert!(matches!(err, ServiceError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_merges_and_validates() {
        let fx = fixture();
        fx.service.create("product", &widget_payload()).await.unwrap();

        let mut updates = Map::new();
        updates.insert("price".to_string(), json!(12.5));
        let updated = fx.service.update("product", 1, &updates).await.unwrap();

        assert_eq!(updated.fields.get(&3), Some(&json!(12.5)));
        assert_eq!(updated.fields.get(&1), Some(&json!("A1")));
    }

    #[tokio::test]
    async fn test_update_null_restores_default() {
        let fx = fixture();
        let mut payload = widget_payload();
        payload.insert("status".to_string(), json!("discontinued"));
        fx.service.create("product", &payload).await.unwrap();

        let mut updates = Map::new();
        updates.insert("status".to_string(), json!(null));
        let updated = fx.service.update("product", 1, &updates).await.unwrap();
        assert_eq!(updated.fields.get(&4), Some(&json!("active")));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let fx = fixture();
        fx.service.create("product", &widget_payload()).await.unwrap();

        assert!(fx.service.delete("product", 1).await.unwrap().existed);
        assert!(!fx.service.delete("product", 1).await.unwrap().existed);
    }

    #[tokio::test]
    async fn test_api_round_trip() {
        let fx = fixture();
        let created = fx
            .service
            .create_for_api("v1", "product", &widget_payload())
            .await
            .unwrap();
        assert_eq!(created.schema_version, 2);

        let outbound = fx
            .service
            .get_for_api("v1", "product", created.id)
            .await
            .unwrap();
        assert_eq!(outbound, widget_payload());
    }
}
