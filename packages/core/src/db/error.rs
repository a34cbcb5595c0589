//! Storage Error Types
//!
//! Error types for the record store and the on-disk schema catalog. Schema
//! engine errors live in `schema::error`; this module only covers storage
//! and catalog failures.

use std::path::PathBuf;
use thiserror::Error;

/// Storage and catalog operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Record does not exist in the store
    #[error("Record {id} of node type '{node_type}' not found")]
    RecordNotFound { node_type: String, id: u64 },

    /// Record id already present for the node type
    #[error("Record {id} of node type '{node_type}' already exists")]
    DuplicateRecordId { node_type: String, id: u64 },

    /// Catalog file could not be read or written
    #[error("Catalog I/O failed for {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Catalog file is not valid JSON
    #[error("Catalog file {path} is malformed: {source}")]
    CatalogParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Catalog content fails schema history validation
    #[error("Invalid schema catalog: {0}")]
    InvalidCatalog(String),
}

impl DatabaseError {
    /// Create a record not found error
    pub fn record_not_found(node_type: impl Into<String>, id: u64) -> Self {
        Self::RecordNotFound {
            node_type: node_type.into(),
            id,
        }
    }

    /// Create a duplicate record id error
    pub fn duplicate_record_id(node_type: impl Into<String>, id: u64) -> Self {
        Self::DuplicateRecordId {
            node_type: node_type.into(),
            id,
        }
    }

    /// Create a catalog I/O error
    pub fn catalog_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CatalogIo {
            path: path.into(),
            source,
        }
    }

    /// Create a catalog parse error
    pub fn catalog_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::CatalogParse {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid catalog error
    pub fn invalid_catalog(msg: impl Into<String>) -> Self {
        Self::InvalidCatalog(msg.into())
    }
}
