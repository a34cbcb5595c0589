//! Storage Layer
//!
//! Record persistence behind the `RecordStore` trait, the in-memory
//! reference backend, and the on-disk schema catalog. Nothing in here
//! validates or migrates records; stores move bytes, the schema engine
//! decides meaning.

pub mod error;
pub mod memory_store;
pub mod record_store;
pub mod schema_catalog;

pub use error::DatabaseError;
pub use memory_store::MemoryStore;
pub use record_store::RecordStore;
pub use schema_catalog::SchemaCatalog;
