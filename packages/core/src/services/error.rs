//! Service Layer Error Types
//!
//! Errors surfaced by the record and upgrade services. Schema engine errors
//! pass through unchanged so callers can still match on the exact failure
//! (validation vs. coercion vs. version lookup); storage failures arrive
//! wrapped with their context intact.

use crate::schema::SchemaError;
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Record not found by node type and id
    #[error("Record {id} of node type '{node_type}' not found")]
    RecordNotFound { node_type: String, id: u64 },

    /// Schema engine rejected the operation
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Storage backend failed
    #[error("Storage operation failed: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    /// Create a record not found error
    pub fn record_not_found(node_type: impl Into<String>, id: u64) -> Self {
        Self::RecordNotFound {
            node_type: node_type.into(),
            id,
        }
    }
}
