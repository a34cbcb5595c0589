//! Schema Engine Error Types
//!
//! This module defines the error type raised by the schema engine: version
//! resolution, compatibility enforcement, record validation, and value
//! coercion. Errors are raised synchronously at the failure point and are
//! never swallowed or retried by the engine itself.

use crate::models::FieldType;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Schema engine errors
///
/// Covers the full failure surface of the engine: invalid values, missing
/// versions, rejected version registrations, and impossible coercions.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Value rejected by field validation
    #[error("Validation failed for field '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Value cannot be converted between the given types
    #[error("Cannot coerce {from} to {to}: {reason}")]
    Coercion {
        from: FieldType,
        to: FieldType,
        reason: String,
    },

    /// Requested schema or API version does not exist
    #[error("Version not found for {scope}: {version}")]
    VersionNotFound { scope: String, version: String },

    /// Proposed version violates the previous version's compatibility contract
    #[error("Incompatible schema for node type '{node_type}' version {version}: {reason}")]
    IncompatibleSchema {
        node_type: String,
        version: u32,
        reason: String,
    },

    /// Version identifier is already registered
    #[error("Duplicate version {version} for {scope}")]
    DuplicateVersion { scope: String, version: String },
}

impl SchemaError {
    /// Create a validation error for a named field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a coercion error between two field types
    pub fn coercion(from: FieldType, to: FieldType, reason: impl Into<String>) -> Self {
        Self::Coercion {
            from,
            to,
            reason: reason.into(),
        }
    }

    /// Create a version-not-found error for a node type
    ///
    /// `version` accepts anything with a display form: a version number,
    /// "latest", or a descriptive reason why the version is unreachable.
    pub fn version_not_found(node_type: impl Into<String>, version: impl ToString) -> Self {
        Self::VersionNotFound {
            scope: format!("node type '{}'", node_type.into()),
            version: version.to_string(),
        }
    }

    /// Create a version-not-found error for a timestamp lookup
    pub fn version_not_found_at(node_type: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::VersionNotFound {
            scope: format!("node type '{}'", node_type.into()),
            version: format!("no validity window covers {}", at.to_rfc3339()),
        }
    }

    /// Create a version-not-found error for a node type with no versions at all
    pub fn unknown_node_type(node_type: impl Into<String>) -> Self {
        Self::VersionNotFound {
            scope: format!("node type '{}'", node_type.into()),
            version: "no versions registered".to_string(),
        }
    }

    /// Create a version-not-found error for an unknown API version
    pub fn api_version_not_found(api_version: impl Into<String>) -> Self {
        Self::VersionNotFound {
            scope: "API version".to_string(),
            version: api_version.into(),
        }
    }

    /// Create a version-not-found error for a node type missing from an API binding
    pub fn api_binding_not_found(
        api_version: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self::VersionNotFound {
            scope: format!("API version '{}'", api_version.into()),
            version: format!("no binding for node type '{}'", node_type.into()),
        }
    }

    /// Create an incompatible-schema error
    pub fn incompatible(
        node_type: impl Into<String>,
        version: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self::IncompatibleSchema {
            node_type: node_type.into(),
            version,
            reason: reason.into(),
        }
    }

    /// Create a duplicate-version error for a schema version number
    pub fn duplicate_version(node_type: impl Into<String>, version: u32) -> Self {
        Self::DuplicateVersion {
            scope: format!("node type '{}'", node_type.into()),
            version: version.to_string(),
        }
    }

    /// Create a duplicate-version error for an API version identifier
    pub fn duplicate_api_version(api_version: impl Into<String>) -> Self {
        Self::DuplicateVersion {
            scope: "API version registry".to_string(),
            version: api_version.into(),
        }
    }
}
