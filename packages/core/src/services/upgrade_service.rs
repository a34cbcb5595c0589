//! Upgrade Service - Persistent Record Migration
//!
//! Reads serve old records through in-memory migration; this service is the
//! counterpart that rewrites stored records to a target schema version for
//! good. Operators run it after registering a new version to retire old
//! record shapes, or pin `target` to roll a node type back while a bad
//! version is withdrawn.
//!
//! Per-record failures during a bulk run are reported, not raised: one
//! unmigratable record must not abort the rest. Infrastructure failures
//! (storage errors, unknown node types) still raise immediately.

use crate::db::RecordStore;
use crate::models::StoredRecord;
use crate::schema::{validate_record, SchemaEvolution, SchemaRegistry};
use crate::services::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happened to one record during an upgrade run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStatus {
    /// Record was migrated and written back
    Upgraded,
    /// Record was already at the target version
    NotNeeded,
    /// Record disappeared between listing and fetching
    Skipped,
    /// Migration or validation failed; the stored record is untouched
    Failed,
}

/// Per-record outcome of an upgrade run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeOutcome {
    pub node_type: String,
    pub id: u64,
    /// Version the record was stored at; `None` when it could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_version: Option<u32>,
    pub to_version: u32,
    pub status: UpgradeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpgradeOutcome {
    pub fn upgraded(node_type: impl Into<String>, id: u64, from: u32, to: u32) -> Self {
        Self {
            node_type: node_type.into(),
            id,
            from_version: Some(from),
            to_version: to,
            status: UpgradeStatus::Upgraded,
            error: None,
        }
    }

    pub fn not_needed(node_type: impl Into<String>, id: u64, version: u32) -> Self {
        Self {
            node_type: node_type.into(),
            id,
            from_version: Some(version),
            to_version: version,
            status: UpgradeStatus::NotNeeded,
            error: None,
        }
    }

    pub fn skipped(node_type: impl Into<String>, id: u64, to: u32) -> Self {
        Self {
            node_type: node_type.into(),
            id,
            from_version: None,
            to_version: to,
            status: UpgradeStatus::Skipped,
            error: None,
        }
    }

    pub fn failed(
        node_type: impl Into<String>,
        id: u64,
        from: u32,
        to: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            id,
            from_version: Some(from),
            to_version: to,
            status: UpgradeStatus::Failed,
            error: Some(reason.into()),
        }
    }
}

/// Rewrites stored records to a target schema version
pub struct UpgradeService {
    store: Arc<dyn RecordStore>,
    registry: Arc<SchemaRegistry>,
}

impl UpgradeService {
    pub fn new(store: Arc<dyn RecordStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self { store, registry }
    }

    /// Upgrade a single record to `target` (latest when `None`)
    ///
    /// The record is migrated, re-validated at the target version, stamped,
    /// and written back. Migration and validation failures come back as a
    /// `Failed` outcome carrying the reason; the stored record is untouched
    /// in that case.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Schema` if the node type or target version is
    ///   unknown
    /// - `ServiceError::RecordNotFound` if the record does not exist
    /// - `ServiceError::Storage` if the backend fails
    pub async fn upgrade_record(
        &self,
        node_type: &str,
        id: u64,
        target: Option<u32>,
    ) -> Result<UpgradeOutcome, ServiceError> {
        let evolution = self.registry.evolution(node_type)?;
        let target = self.resolve_target(&evolution, target)?;

        let record = self
            .store
            .get_record(node_type, id)
            .await?
            .ok_or_else(|| ServiceError::record_not_found(node_type, id))?;

        self.upgrade_fetched(record, &evolution, target).await
    }

    /// Upgrade every record of a node type to `target` (latest when `None`)
    ///
    /// Returns one outcome per listed record, in id order. Records that
    /// vanish between listing and fetching are reported as `Skipped`;
    /// per-record migration failures as `Failed`.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Schema` if the node type or target version is
    ///   unknown
    /// - `ServiceError::Storage` if the backend fails
    pub async fn upgrade_all(
        &self,
        node_type: &str,
        target: Option<u32>,
    ) -> Result<Vec<UpgradeOutcome>, ServiceError> {
        let evolution = self.registry.evolution(node_type)?;
        let target = self.resolve_target(&evolution, target)?;

        let ids = self.store.list_ids(node_type).await?;
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = match self.store.get_record(node_type, id).await? {
                Some(record) => self.upgrade_fetched(record, &evolution, target).await?,
                None => UpgradeOutcome::skipped(node_type, id, target),
            };
            outcomes.push(outcome);
        }

        let upgraded = count_status(&outcomes, UpgradeStatus::Upgraded);
        let failed = count_status(&outcomes, UpgradeStatus::Failed);
        tracing::info!(
            node_type,
            target,
            total = outcomes.len(),
            upgraded,
            failed,
            "bulk upgrade finished"
        );
        Ok(outcomes)
    }

    fn resolve_target(
        &self,
        evolution: &SchemaEvolution,
        target: Option<u32>,
    ) -> Result<u32, ServiceError> {
        match target {
            Some(version) => {
                evolution.resolve(version)?;
                Ok(version)
            }
            None => Ok(evolution.latest()?.version),
        }
    }

    async fn upgrade_fetched(
        &self,
        record: StoredRecord,
        evolution: &SchemaEvolution,
        target: u32,
    ) -> Result<UpgradeOutcome, ServiceError> {
        let node_type = record.node_type.clone();
        let from = record.schema_version;
        if from == target {
            return Ok(UpgradeOutcome::not_needed(node_type, record.id, from));
        }

        let migrated = match evolution.migrate(&record.fields, from, target) {
            Ok(fields) => fields,
            Err(e) => {
                return Ok(UpgradeOutcome::failed(
                    node_type,
                    record.id,
                    from,
                    target,
                    e.to_string(),
                ))
            }
        };

        let target_schema = evolution.resolve(target)?;
        let normalized = match validate_record(&migrated, target_schema) {
            Ok(fields) => fields,
            Err(e) => {
                return Ok(UpgradeOutcome::failed(
                    node_type,
                    record.id,
                    from,
                    target,
                    e.to_string(),
                ))
            }
        };

        let mut updated = record;
        updated.fields = normalized;
        updated.schema_version = target;
        updated.touch();
        let id = updated.id;
        self.store.update_record(updated).await?;

        tracing::info!(node_type = %node_type, id, from, to = target, "record upgraded");
        Ok(UpgradeOutcome::upgraded(node_type, id, from, target))
    }
}

fn count_status(outcomes: &[UpgradeOutcome], status: UpgradeStatus) -> usize {
    outcomes.iter().filter(|o| o.status == status).count()
}
