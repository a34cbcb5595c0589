//! RecordStore Trait - Storage Abstraction Layer
//!
//! This module defines the `RecordStore` trait that abstracts record
//! persistence for NodeVault. The schema engine itself never touches
//! storage; services compose a `RecordStore` with the schema registry, so
//! any backend that can keep field maps keyed by (node type, id) works.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: all methods are async so embedded and networked
//!    backends share one trait
//! 2. **Ownership Semantics**: `create_record` and `update_record` take the
//!    record by value; callers clone only when they need to keep a copy
//! 3. **Error Handling**: `anyhow::Result` with `DatabaseError` values
//!    underneath for cases callers match on
//! 4. **Version Agnostic**: records carry their `schema_version`; the store
//!    never migrates or validates, that is service-layer work

use crate::models::{DeleteResult, StoredRecord};
use anyhow::Result;
use async_trait::async_trait;

/// Abstraction layer for record persistence
///
/// Implementations must be `Send + Sync` so services can share them across
/// async tasks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record
    ///
    /// # Arguments
    ///
    /// * `record` - Record to create, already validated at its version
    ///
    /// # Returns
    ///
    /// The stored record as persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the (node type, id) pair already exists.
    async fn create_record(&self, record: StoredRecord) -> Result<StoredRecord>;

    /// Fetch a record by node type and id
    ///
    /// # Returns
    ///
    /// `None` if no such record exists; absence is not an error.
    async fn get_record(&self, node_type: &str, id: u64) -> Result<Option<StoredRecord>>;

    /// Replace an existing record
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist.
    async fn update_record(&self, record: StoredRecord) -> Result<StoredRecord>;

    /// Delete a record by node type and id
    ///
    /// # Returns
    ///
    /// `DeleteResult` reporting whether the record existed. Deleting an
    /// absent record is not an error.
    async fn delete_record(&self, node_type: &str, id: u64) -> Result<DeleteResult>;

    /// All record ids of a node type, ascending
    async fn list_ids(&self, node_type: &str) -> Result<Vec<u64>>;

    /// Allocate the next sequential id for a node type
    ///
    /// Ids start at 1 and never repeat within a node type for the lifetime
    /// of the store.
    async fn next_id(&self, node_type: &str) -> Result<u64>;
}
