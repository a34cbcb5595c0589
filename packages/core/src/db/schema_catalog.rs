//! On-Disk Schema Catalog
//!
//! Persists each node type's version history as one JSON file
//! (`{node_type}.json`) in a catalog directory. At startup the catalog is
//! loaded and every history is rebuilt by replaying its versions through
//! the registration checks, so hand-edited or corrupted files are rejected
//! instead of silently trusted. After a successful `register` the caller
//! saves the updated history back.
//!
//! Catalog I/O is synchronous std::fs: it runs at startup and on the rare
//! schema registration, never on the per-record hot path.

use crate::db::error::DatabaseError;
use crate::models::SchemaVersion;
use crate::schema::{SchemaEvolution, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Serialized form of one node type's history
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    node_type: String,
    versions: Vec<SchemaVersion>,
}

/// Directory-backed store of schema version histories
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    dir: PathBuf,
}

impl SchemaCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Catalog file path for a node type
    pub fn path_for(&self, node_type: &str) -> PathBuf {
        self.dir.join(format!("{}.json", node_type))
    }

    /// Load every node type history from the catalog directory
    ///
    /// A missing directory is an empty catalog, not an error. Results are
    /// sorted by node type so startup logging and registry population are
    /// deterministic.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::CatalogIo` if a file cannot be read
    /// - `DatabaseError::CatalogParse` if a file is not valid JSON
    /// - `DatabaseError::InvalidCatalog` if a history fails replay through
    ///   the registration checks
    pub fn load_all(&self) -> Result<Vec<SchemaEvolution>, DatabaseError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries =
            fs::read_dir(&self.dir).map_err(|e| DatabaseError::catalog_io(&self.dir, e))?;

        let mut evolutions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DatabaseError::catalog_io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            evolutions.push(self.load_file(&path)?);
        }

        evolutions.sort_by(|a, b| a.node_type().cmp(b.node_type()));
        Ok(evolutions)
    }

    /// Load all histories and install them into a registry
    ///
    /// Returns the number of node types loaded.
    ///
    /// # Errors
    ///
    /// Same as `load_all`; the registry is only populated when every file
    /// loaded cleanly.
    pub fn load_into(&self, registry: &SchemaRegistry) -> Result<usize, DatabaseError> {
        let evolutions = self.load_all()?;
        let count = evolutions.len();
        for evolution in evolutions {
            registry.insert_evolution(evolution);
        }
        info!(dir = %self.dir.display(), node_types = count, "schema catalog loaded");
        Ok(count)
    }

    /// Persist one node type's full history
    ///
    /// Writes the whole version list; histories are small (a handful of
    /// versions), so rewriting beats patching.
    ///
    /// # Errors
    ///
    /// `DatabaseError::CatalogIo` if the directory cannot be created or the
    /// file cannot be written.
    pub fn save(&self, evolution: &SchemaEvolution) -> Result<(), DatabaseError> {
        fs::create_dir_all(&self.dir).map_err(|e| DatabaseError::catalog_io(&self.dir, e))?;

        let path = self.path_for(evolution.node_type());
        let file = CatalogFile {
            node_type: evolution.node_type().to_string(),
            versions: evolution.versions().to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| DatabaseError::catalog_parse(&path, e))?;
        fs::write(&path, json).map_err(|e| DatabaseError::catalog_io(&path, e))?;

        debug!(
            node_type = evolution.node_type(),
            versions = evolution.version_count(),
            path = %path.display(),
            "schema catalog saved"
        );
        Ok(())
    }

    fn load_file(&self, path: &Path) -> Result<SchemaEvolution, DatabaseError> {
        let raw = fs::read_to_string(path).map_err(|e| DatabaseError::catalog_io(path, e))?;
        let file: CatalogFile =
            serde_json::from_str(&raw).map_err(|e| DatabaseError::catalog_parse(path, e))?;

        SchemaEvolution::from_versions(file.node_type, file.versions).map_err(|e| {
            DatabaseError::invalid_catalog(format!("{}: {}", path.display(), e))
        })
    }
}
