//! Business Services
//!
//! This module contains the service layer on top of the schema engine and
//! the storage abstraction:
//!
//! - `RecordService` - versioned CRUD with lazy migration on read
//! - `UpgradeService` - persistent bulk migration of stored records
//! - `ProductService` - product facade and schema bootstrap
//! - `SalesOrderService` - sales order header/item facade
//!
//! Services coordinate the schema registry, API version manager, and
//! record store; they contain no versioning logic of their own.

pub mod error;
pub mod product_service;
pub mod record_service;
pub mod sales_order_service;
pub mod upgrade_service;

pub use error::ServiceError;
pub use product_service::{ProductService, PRODUCT_NODE_TYPE};
pub use record_service::RecordService;
pub use sales_order_service::{
    SalesOrderService, SALES_ORDER_HEADER_NODE_TYPE, SALES_ORDER_ITEM_NODE_TYPE,
};
pub use upgrade_service::{UpgradeOutcome, UpgradeService, UpgradeStatus};
