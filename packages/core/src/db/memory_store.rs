//! In-Memory Record Store
//!
//! `MemoryStore` keeps records in process memory behind tokio locks. It is
//! the reference `RecordStore` backend: tests and embedders that do not
//! need durability run against it directly, and it documents the exact
//! semantics (duplicate ids, sequential id allocation, delete-of-absent)
//! any other backend must reproduce.

use crate::db::error::DatabaseError;
use crate::db::record_store::RecordStore;
use crate::models::{DeleteResult, StoredRecord};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-memory implementation of `RecordStore`
///
/// Records are keyed by (node type, id). Id counters are per node type,
/// start at 1, and never reuse a value, so deleted ids stay retired.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, u64), StoredRecord>>,
    counters: RwLock<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all node types
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_record(&self, record: StoredRecord) -> Result<StoredRecord> {
        let key = (record.node_type.clone(), record.id);
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Err(DatabaseError::duplicate_record_id(&record.node_type, record.id).into());
        }
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn get_record(&self, node_type: &str, id: u64) -> Result<Option<StoredRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&(node_type.to_string(), id)).cloned())
    }

    async fn update_record(&self, record: StoredRecord) -> Result<StoredRecord> {
        let key = (record.node_type.clone(), record.id);
        let mut records = self.records.write().await;
        if !records.contains_key(&key) {
            return Err(DatabaseError::record_not_found(&record.node_type, record.id).into());
        }
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn delete_record(&self, node_type: &str, id: u64) -> Result<DeleteResult> {
        let mut records = self.records.write().await;
        match records.remove(&(node_type.to_string(), id)) {
            Some(_) => Ok(DeleteResult::existed()),
            None => Ok(DeleteResult::not_found()),
        }
    }

    async fn list_ids(&self, node_type: &str) -> Result<Vec<u64>> {
        let records = self.records.read().await;
        let mut ids: Vec<u64> = records
            .keys()
            .filter(|(stored_type, _)| stored_type == node_type)
            .map(|(_, id)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn next_id(&self, node_type: &str) -> Result<u64> {
        let mut counters = self.counters.write().await;
        let counter = counters.entry(node_type.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
