//! Sales Order Service - Business Facade
//!
//! CRUD facade over `RecordService` for sales order headers and their line
//! items. The two node types evolve independently; items reference their
//! header by id, but the facade performs no joins or cascades, callers
//! orchestrate those.

use crate::models::{
    CompatibilityMode, DeleteResult, FieldConstraints, FieldDefinition, FieldType, SchemaVersion,
    StoredRecord, ValidationMode,
};
use crate::schema::{SchemaError, SchemaRegistry};
use crate::services::error::ServiceError;
use crate::services::record_service::RecordService;
use chrono::Utc;
use serde_json::{json, Map, Value};

/// Node type for order headers
pub const SALES_ORDER_HEADER_NODE_TYPE: &str = "sales_order_header";

/// Node type for order line items
pub const SALES_ORDER_ITEM_NODE_TYPE: &str = "sales_order_item";

/// CRUD facade for sales order headers and items
#[derive(Clone)]
pub struct SalesOrderService {
    records: RecordService,
}

impl SalesOrderService {
    pub fn new(records: RecordService) -> Self {
        Self { records }
    }

    /// Register both sales order schemas if the node types are not yet known
    ///
    /// # Errors
    ///
    /// Propagates registration errors for fresh node types.
    pub fn bootstrap(registry: &SchemaRegistry) -> Result<(), SchemaError> {
        if registry.evolution(SALES_ORDER_HEADER_NODE_TYPE).is_err() {
            registry.register(SALES_ORDER_HEADER_NODE_TYPE, Self::header_schema_v1())?;
        }
        if registry.evolution(SALES_ORDER_ITEM_NODE_TYPE).is_err() {
            registry.register(SALES_ORDER_ITEM_NODE_TYPE, Self::item_schema_v1())?;
        }
        Ok(())
    }

    /// Initial order header schema
    pub fn header_schema_v1() -> SchemaVersion {
        SchemaVersion::new(1, CompatibilityMode::Forward, Utc::now())
            .with_field(FieldDefinition::new(1, "order_number", FieldType::Text).required())
            .with_field(
                FieldDefinition::new(2, "customer_id", FieldType::Integer)
                    .required()
                    .with_mode(ValidationMode::Coerce),
            )
            .with_field(
                FieldDefinition::new(3, "order_date", FieldType::Date)
                    .required()
                    .with_mode(ValidationMode::Coerce),
            )
            .with_field(
                FieldDefinition::new(4, "total_amount", FieldType::Decimal)
                    .required()
                    .with_mode(ValidationMode::Loose)
                    .with_constraints(FieldConstraints {
                        min_value: Some(0.0),
                        precision: Some(2),
                        ..FieldConstraints::default()
                    }),
            )
            .with_field(
                FieldDefinition::new(5, "status", FieldType::Text)
                    .with_default(json!("PENDING"))
                    .with_allowed_values(vec![
                        json!("PENDING"),
                        json!("CONFIRMED"),
                        json!("SHIPPED"),
                        json!("DELIVERED"),
                        json!("CANCELLED"),
                    ]),
            )
    }

    /// Initial order item schema
    pub fn item_schema_v1() -> SchemaVersion {
        SchemaVersion::new(1, CompatibilityMode::Forward, Utc::now())
            .with_field(
                FieldDefinition::new(1, "order_id", FieldType::Integer)
                    .required()
                    .with_mode(ValidationMode::Coerce),
            )
            .with_field(
                FieldDefinition::new(2, "position", FieldType::Integer)
                    .required()
                    .with_mode(ValidationMode::Coerce),
            )
            .with_field(FieldDefinition::new(3, "product_code", FieldType::Text).required())
            .with_field(
                FieldDefinition::new(4, "quantity", FieldType::Integer)
                    .required()
                    .with_mode(ValidationMode::Coerce)
                    .with_constraints(FieldConstraints {
                        min_value: Some(1.0),
                        ..FieldConstraints::default()
                    }),
            )
            .with_field(
                FieldDefinition::new(5, "unit_price", FieldType::Decimal)
                    .required()
                    .with_mode(ValidationMode::Loose)
                    .with_constraints(FieldConstraints {
                        min_value: Some(0.0),
                        precision: Some(2),
                        ..FieldConstraints::default()
                    }),
            )
    }

    pub async fn create_header(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<StoredRecord, ServiceError> {
        self.records.create(SALES_ORDER_HEADER_NODE_TYPE, payload).await
    }

    pub async fn get_header(&self, id: u64) -> Result<StoredRecord, ServiceError> {
        self.records.get(SALES_ORDER_HEADER_NODE_TYPE, id).await
    }

    pub async fn update_header(
        &self,
        id: u64,
        updates: &Map<String, Value>,
    ) -> Result<StoredRecord, ServiceError> {
        self.records
            .update(SALES_ORDER_HEADER_NODE_TYPE, id, updates)
            .await
    }

    pub async fn delete_header(&self, id: u64) -> Result<DeleteResult, ServiceError> {
        self.records.delete(SALES_ORDER_HEADER_NODE_TYPE, id).await
    }

    pub async fn list_header_ids(&self) -> Result<Vec<u64>, ServiceError> {
        self.records.list_ids(SALES_ORDER_HEADER_NODE_TYPE).await
    }

    pub async fn create_item(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<StoredRecord, ServiceError> {
        self.records.create(SALES_ORDER_ITEM_NODE_TYPE, payload).await
    }

    pub async fn get_item(&self, id: u64) -> Result<StoredRecord, ServiceError> {
        self.records.get(SALES_ORDER_ITEM_NODE_TYPE, id).await
    }

    pub async fn update_item(
        &self,
        id: u64,
        updates: &Map<String, Value>,
    ) -> Result<StoredRecord, ServiceError> {
        self.records
            .update(SALES_ORDER_ITEM_NODE_TYPE, id, updates)
            .await
    }

    pub async fn delete_item(&self, id: u64) -> Result<DeleteResult, ServiceError> {
        self.records.delete(SALES_ORDER_ITEM_NODE_TYPE, id).await
    }

    pub async fn list_item_ids(&self) -> Result<Vec<u64>, ServiceError> {
        self.records.list_ids(SALES_ORDER_ITEM_NODE_TYPE).await
    }
}
