//! Product Service - Business Facade
//!
//! Thin CRUD facade over `RecordService` for the `product` node type. It
//! owns the product schema bootstrap and delegates every operation; all
//! versioning, validation, and migration behavior comes from the layers
//! below.

use crate::models::{
    CompatibilityMode, DeleteResult, FieldConstraints, FieldDefinition, FieldType, SchemaVersion,
    StoredRecord, ValidationMode,
};
use crate::schema::{SchemaError, SchemaRegistry};
use crate::services::error::ServiceError;
use crate::services::record_service::RecordService;
use chrono::Utc;
use serde_json::{json, Map, Value};

/// Node type managed by this facade
pub const PRODUCT_NODE_TYPE: &str = "product";

/// CRUD facade for product records
#[derive(Clone)]
pub struct ProductService {
    records: RecordService,
}

impl ProductService {
    pub fn new(records: RecordService) -> Self {
        Self { records }
    }

    /// Register the product schema if the node type is not yet known
    ///
    /// Safe to call on every startup; an already-registered node type is
    /// left as is (its history may be ahead of version 1).
    ///
    /// # Errors
    ///
    /// Propagates registration errors for a fresh node type.
    pub fn bootstrap(registry: &SchemaRegistry) -> Result<(), SchemaError> {
        if registry.evolution(PRODUCT_NODE_TYPE).is_ok() {
            return Ok(());
        }
        registry.register(PRODUCT_NODE_TYPE, Self::schema_v1())
    }

    /// Initial product schema
    ///
    /// `price` is a DECIMAL in LOOSE mode: JSON numbers reach the canonical
    /// string representation through their text rendering, so callers may
    /// send `19.99` or `"19.99"` interchangeably.
    pub fn schema_v1() -> SchemaVersion {
        SchemaVersion::new(1, CompatibilityMode::Forward, Utc::now())
            .with_field(FieldDefinition::new(1, "code", FieldType::Text).required())
            .with_field(FieldDefinition::new(2, "name", FieldType::Text).required())
            .with_field(FieldDefinition::new(3, "description", FieldType::Text))
            .with_field(
                FieldDefinition::new(4, "price", FieldType::Decimal)
                    .required()
                    .with_mode(ValidationMode::Loose)
                    .with_constraints(FieldConstraints {
                        min_value: Some(0.0),
                        precision: Some(2),
                        ..FieldConstraints::default()
                    }),
            )
            .with_field(FieldDefinition::new(5, "unit", FieldType::Text).with_default(json!("piece")))
    }

    pub async fn create(&self, payload: &Map<String, Value>) -> Result<StoredRecord, ServiceError> {
        self.records.create(PRODUCT_NODE_TYPE, payload).await
    }

    pub async fn get(&self, id: u64) -> Result<StoredRecord, ServiceError> {
        self.records.get(PRODUCT_NODE_TYPE, id).await
    }

    pub async fn update(
        &self,
        id: u64,
        updates: &Map<String, Value>,
    ) -> Result<StoredRecord, ServiceError> {
        self.records.update(PRODUCT_NODE_TYPE, id, updates).await
    }

    pub async fn delete(&self, id: u64) -> Result<DeleteResult, ServiceError> {
        self.records.delete(PRODUCT_NODE_TYPE, id).await
    }

    pub async fn list_ids(&self) -> Result<Vec<u64>, ServiceError> {
        self.records.list_ids(PRODUCT_NODE_TYPE).await
    }
}
