//! NodeVault Schema Versioning Core
//!
//! This crate provides the schema versioning and record evolution engine
//! for typed business records ("nodes") whose shape changes over time.
//!
//! # Architecture
//!
//! - **Field-Number Keyed Records**: record values are keyed by stable
//!   field numbers, never by name; names exist only at the API boundary
//! - **Append-Only Evolutions**: each node type carries an ordered, gapless
//!   version history; registering a new version closes the current validity
//!   window and appends, nothing is ever rewritten
//! - **Lazy Migration**: reads upgrade records in memory to the latest
//!   version; stored bytes change only through the explicit upgrade service
//! - **API Version Bindings**: external API versions map to internal schema
//!   versions per node type, and payloads are translated at the boundary
//!
//! # Modules
//!
//! - [`models`] - Data structures (FieldDefinition, SchemaVersion, StoredRecord)
//! - [`schema`] - Coercion table, validation, evolution, and the registry
//! - [`api`] - API version manager translating boundary payloads
//! - [`services`] - Business services (RecordService, UpgradeService, facades)
//! - [`db`] - Storage abstraction, in-memory store, and the schema catalog

pub mod models;
pub mod schema;
pub mod api;
pub mod services;
pub mod db;

// Re-export commonly used types
pub use models::*;
pub use schema::{
    can_promote, coerce, coerce_loose, matches_declared, validate_record, SchemaError,
    SchemaEvolution, SchemaRegistry,
};
pub use services::*;
