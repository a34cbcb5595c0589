//! Schema Evolution
//!
//! One `SchemaEvolution` holds the ordered version history of a single node
//! type. It answers which schema is current, which schema was active at a
//! given version number or instant, and how a record moves between any two
//! registered versions.
//!
//! ## Version History Rules
//!
//! - Versions are numbered contiguously starting at 1
//! - The history is append-only: registering never rewrites an existing
//!   version, it closes the current validity window and appends
//! - Validity windows are half-open `[valid_from, valid_to)`, gapless, and
//!   only the last version is open-ended
//! - Field numbers are permanent: once a number identifies a field it can
//!   never be renamed to a different field or reused after removal
//!
//! ## Migration
//!
//! Every version carries the ordered `FieldChange` list that transforms a
//! record from its immediate predecessor. Forward migration applies those
//! lists version by version in declaration order; backward migration walks
//! the chain the other way, applying each list in reverse with inverted
//! operations. Migration is a pure transformation over field maps and never
//! performs I/O.

use crate::models::{CompatibilityMode, FieldChange, FieldMap, SchemaVersion};
use crate::schema::coercion::{can_promote, coerce, matches_declared};
use crate::schema::error::SchemaError;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::debug;

/// Append-only schema history of one node type
#[derive(Debug, Clone)]
pub struct SchemaEvolution {
    node_type: String,
    versions: Vec<SchemaVersion>,
}

impl SchemaEvolution {
    /// Create an empty history for a node type
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            versions: Vec::new(),
        }
    }

    /// Rebuild a history by replaying persisted versions through `register`
    ///
    /// Used when loading a node type's definitions from the schema catalog;
    /// every registration rule is re-checked, so a tampered or hand-edited
    /// version list is rejected rather than trusted.
    ///
    /// # Errors
    ///
    /// Returns the first registration error encountered during the replay.
    pub fn from_versions(
        node_type: impl Into<String>,
        versions: Vec<SchemaVersion>,
    ) -> Result<Self, SchemaError> {
        let mut evolution = Self::new(node_type);
        for version in versions {
            evolution.register(version)?;
        }
        Ok(evolution)
    }

    /// Node type this history describes
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// All registered versions in ascending order
    pub fn versions(&self) -> &[SchemaVersion] {
        &self.versions
    }

    /// Number of registered versions
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Current version, the one with an open validity window
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` if no version has been registered.
    pub fn latest(&self) -> Result<&SchemaVersion, SchemaError> {
        self.versions
            .last()
            .ok_or_else(|| SchemaError::unknown_node_type(&self.node_type))
    }

    /// Schema at an exact version number
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` if the number is below 1 or above the
    /// current version.
    pub fn resolve(&self, version: u32) -> Result<&SchemaVersion, SchemaError> {
        self.versions
            .iter()
            .find(|v| v.version == version)
            .ok_or_else(|| SchemaError::version_not_found(&self.node_type, version))
    }

    /// Schema whose validity window covers the given instant
    ///
    /// # Errors
    ///
    /// `SchemaError::VersionNotFound` if the instant predates the first
    /// version (windows are gapless, so anything at or after the first
    /// `valid_from` resolves).
    pub fn resolve_at(&self, at: DateTime<Utc>) -> Result<&SchemaVersion, SchemaError> {
        self.versions
            .iter()
            .find(|v| v.contains_instant(at))
            .ok_or_else(|| SchemaError::version_not_found_at(&self.node_type, at))
    }

    /// Register the next schema version
    ///
    /// The candidate must carry the next contiguous version number, a later
    /// `valid_from` than the current version, a change list that accounts
    /// for every structural difference, and changes permitted by the
    /// current version's compatibility mode. On success the current
    /// version's window is closed at the candidate's `valid_from` and the
    /// candidate becomes current. On failure the history is untouched.
    ///
    /// # Errors
    ///
    /// - `SchemaError::DuplicateVersion` when the version number is already
    ///   taken (at or below the current version)
    /// - `SchemaError::IncompatibleSchema` for every other rejected change:
    ///   gaps in numbering, field number reassignment or reuse, missing or
    ///   contradictory change entries, and compatibility violations
    pub fn register(&mut self, mut candidate: SchemaVersion) -> Result<(), SchemaError> {
        self.check_registrable(&candidate)?;

        let window_start = candidate.valid_from;
        candidate.valid_to = None;
        if let Some(current) = self.versions.last_mut() {
            current.valid_to = Some(window_start);
        }
        debug!(
            node_type = %self.node_type,
            version = candidate.version,
            fields = candidate.fields.len(),
            "registered schema version"
        );
        self.versions.push(candidate);
        Ok(())
    }

    /// Transform a field map between two registered versions
    ///
    /// Direction-agnostic: upgrades walk the chain forward applying each
    /// intermediate version's change list, downgrades walk backward
    /// applying inverted changes. `from_version == to_version` returns the
    /// input unchanged. Repeating a migration on its own output is a no-op.
    ///
    /// # Errors
    ///
    /// - `SchemaError::VersionNotFound` if either endpoint is unregistered,
    ///   or a downgrade would need to reinstate a removed field that has no
    ///   default
    /// - `SchemaError::Coercion` if a `modify_field` step cannot convert a
    ///   value (reverse promotions usually do not exist)
    pub fn migrate(
        &self,
        fields: &FieldMap,
        from_version: u32,
        to_version: u32,
    ) -> Result<FieldMap, SchemaError> {
        self.resolve(from_version)?;
        self.resolve(to_version)?;

        let mut current = fields.clone();
        if from_version == to_version {
            return Ok(current);
        }

        if to_version > from_version {
            for version in from_version + 1..=to_version {
                let source = self.resolve(version - 1)?;
                let target = self.resolve(version)?;
                current = self.apply_forward(current, source, target)?;
            }
        } else {
            for version in (to_version + 1..=from_version).rev() {
                let source = self.resolve(version)?;
                let target = self.resolve(version - 1)?;
                current = self.apply_reverse(current, source, target)?;
            }
        }

        debug!(
            node_type = %self.node_type,
            from = from_version,
            to = to_version,
            "migrated record"
        );
        Ok(current)
    }

    fn check_registrable(&self, candidate: &SchemaVersion) -> Result<(), SchemaError> {
        self.check_well_formed(candidate)?;

        let previous = match self.versions.last() {
            Some(previous) => previous,
            None => {
                if candidate.version != 1 {
                    return Err(SchemaError::incompatible(
                        &self.node_type,
                        candidate.version,
                        "the first registered version must be 1",
                    ));
                }
                return Ok(());
            }
        };

        if candidate.version <= previous.version {
            return Err(SchemaError::duplicate_version(
                &self.node_type,
                candidate.version,
            ));
        }
        if candidate.version != previous.version + 1 {
            return Err(SchemaError::incompatible(
                &self.node_type,
                candidate.version,
                format!("version numbers are contiguous, expected {}", previous.version + 1),
            ));
        }
        if candidate.valid_from <= previous.valid_from {
            return Err(SchemaError::incompatible(
                &self.node_type,
                candidate.version,
                "valid_from must be later than the current version's valid_from",
            ));
        }

        self.check_field_numbers(previous, candidate)?;
        self.check_change_list(previous, candidate)?;
        self.check_compatibility(previous, candidate)
    }

    /// Structural sanity of a single version, independent of history
    fn check_well_formed(&self, candidate: &SchemaVersion) -> Result<(), SchemaError> {
        let mut names = BTreeSet::new();
        for (number, def) in &candidate.fields {
            if *number == 0 {
                return Err(SchemaError::incompatible(
                    &self.node_type,
                    candidate.version,
                    "field numbers start at 1",
                ));
            }
            if def.field_number != *number {
                return Err(SchemaError::incompatible(
                    &self.node_type,
                    candidate.version,
                    format!(
                        "field '{}' is keyed under {} but declares field number {}",
                        def.name, number, def.field_number
                    ),
                ));
            }
            if def.name.trim().is_empty() {
                return Err(SchemaError::incompatible(
                    &self.node_type,
                    candidate.version,
                    format!("field {} has an empty name", number),
                ));
            }
            if !names.insert(def.name.as_str()) {
                return Err(SchemaError::incompatible(
                    &self.node_type,
                    candidate.version,
                    format!("duplicate field name '{}'", def.name),
                ));
            }
            if let Some(default) = &def.default {
                if !matches_declared(default, def.field_type) {
                    return Err(SchemaError::incompatible(
                        &self.node_type,
                        candidate.version,
                        format!(
                            "default for field '{}' is not a valid {}",
                            def.name, def.field_type
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Field numbers are forever: no renames, no reuse of retired numbers
    fn check_field_numbers(
        &self,
        previous: &SchemaVersion,
        candidate: &SchemaVersion,
    ) -> Result<(), SchemaError> {
        for (number, next_def) in &candidate.fields {
            match previous.field(*number) {
                Some(prev_def) => {
                    if prev_def.name != next_def.name {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!(
                                "field number {} may not be reassigned from '{}' to '{}'",
                                number, prev_def.name, next_def.name
                            ),
                        ));
                    }
                }
                None => {
                    if let Some(holder) = self.versions.iter().find_map(|v| v.field(*number)) {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!(
                                "field number {} was already used by '{}' and may not be reused",
                                number, holder.name
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// The change list must cover every structural difference and nothing
    /// that is not a difference
    fn check_change_list(
        &self,
        previous: &SchemaVersion,
        candidate: &SchemaVersion,
    ) -> Result<(), SchemaError> {
        let mut added = BTreeSet::new();
        let mut modified = BTreeSet::new();
        let mut removed = BTreeSet::new();

        for change in &candidate.upgrade_definitions {
            let number = change.field_number();
            let fresh = match change {
                FieldChange::AddField { .. } => added.insert(number),
                FieldChange::ModifyField { .. } => modified.insert(number),
                FieldChange::RemoveField { .. } => removed.insert(number),
            };
            if !fresh {
                return Err(SchemaError::incompatible(
                    &self.node_type,
                    candidate.version,
                    format!("duplicate upgrade entry for field number {}", number),
                ));
            }
            match change {
                FieldChange::AddField { .. } => {
                    if previous.field(number).is_some() || candidate.field(number).is_none() {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!("add_field {} does not describe a newly added field", number),
                        ));
                    }
                }
                FieldChange::ModifyField { .. } => {
                    if previous.field(number).is_none() || candidate.field(number).is_none() {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!(
                                "modify_field {} must reference a field present in both versions",
                                number
                            ),
                        ));
                    }
                }
                FieldChange::RemoveField { .. } => {
                    if previous.field(number).is_none() || candidate.field(number).is_some() {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!("remove_field {} does not describe a removed field", number),
                        ));
                    }
                }
            }
        }

        for (number, def) in &candidate.fields {
            match previous.field(*number) {
                None if !added.contains(number) => {
                    return Err(SchemaError::incompatible(
                        &self.node_type,
                        candidate.version,
                        format!(
                            "field {} ('{}') was added without an add_field entry",
                            number, def.name
                        ),
                    ));
                }
                Some(prev_def)
                    if prev_def.field_type != def.field_type && !modified.contains(number) =>
                {
                    return Err(SchemaError::incompatible(
                        &self.node_type,
                        candidate.version,
                        format!(
                            "field {} ('{}') changed type without a modify_field entry",
                            number, def.name
                        ),
                    ));
                }
                _ => {}
            }
        }
        for (number, def) in &previous.fields {
            if candidate.field(*number).is_none() && !removed.contains(number) {
                return Err(SchemaError::incompatible(
                    &self.node_type,
                    candidate.version,
                    format!(
                        "field {} ('{}') was removed without a remove_field entry",
                        number, def.name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Enforce the compatibility mode declared on the version being replaced
    fn check_compatibility(
        &self,
        previous: &SchemaVersion,
        candidate: &SchemaVersion,
    ) -> Result<(), SchemaError> {
        match previous.compatibility {
            CompatibilityMode::Strict => self.check_strict(previous, candidate),
            CompatibilityMode::Forward => self.check_forward(previous, candidate),
            CompatibilityMode::Backward => self.check_backward(previous, candidate),
            CompatibilityMode::Full => {
                self.check_forward(previous, candidate)?;
                self.check_backward(previous, candidate)
            }
        }
    }

    fn check_strict(
        &self,
        previous: &SchemaVersion,
        candidate: &SchemaVersion,
    ) -> Result<(), SchemaError> {
        for (number, def) in &candidate.fields {
            match previous.field(*number) {
                None => {
                    return Err(SchemaError::incompatible(
                        &self.node_type,
                        candidate.version,
                        format!(
                            "STRICT compatibility forbids adding field {} ('{}')",
                            number, def.name
                        ),
                    ));
                }
                Some(prev_def) => {
                    if prev_def.field_type != def.field_type
                        || prev_def.required != def.required
                        || prev_def.validation_mode != def.validation_mode
                    {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!(
                                "STRICT compatibility forbids changing field {} ('{}')",
                                number, def.name
                            ),
                        ));
                    }
                }
            }
        }
        for (number, def) in &previous.fields {
            if candidate.field(*number).is_none() {
                return Err(SchemaError::incompatible(
                    &self.node_type,
                    candidate.version,
                    format!(
                        "STRICT compatibility forbids removing field {} ('{}')",
                        number, def.name
                    ),
                ));
            }
        }
        Ok(())
    }

    fn check_forward(
        &self,
        previous: &SchemaVersion,
        candidate: &SchemaVersion,
    ) -> Result<(), SchemaError> {
        for (number, def) in &candidate.fields {
            match previous.field(*number) {
                None => {
                    if def.required && def.default.is_none() {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!(
                                "FORWARD compatibility requires added field {} ('{}') to be optional or carry a default",
                                number, def.name
                            ),
                        ));
                    }
                }
                Some(prev_def) => {
                    if prev_def.required && !def.required && def.default.is_none() {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!(
                                "FORWARD compatibility forbids field {} ('{}') becoming optional without a default",
                                number, def.name
                            ),
                        ));
                    }
                }
            }
        }
        for (number, prev_def) in &previous.fields {
            if prev_def.required && candidate.field(*number).is_none() {
                return Err(SchemaError::incompatible(
                    &self.node_type,
                    candidate.version,
                    format!(
                        "FORWARD compatibility forbids removing required field {} ('{}')",
                        number, prev_def.name
                    ),
                ));
            }
        }
        Ok(())
    }

    fn check_backward(
        &self,
        previous: &SchemaVersion,
        candidate: &SchemaVersion,
    ) -> Result<(), SchemaError> {
        for (number, def) in &candidate.fields {
            match previous.field(*number) {
                None => {
                    if def.required && def.default.is_none() {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!(
                                "BACKWARD compatibility requires new required field {} ('{}') to declare a default",
                                number, def.name
                            ),
                        ));
                    }
                }
                Some(prev_def) => {
                    if !can_promote(prev_def.field_type, def.field_type) {
                        return Err(SchemaError::incompatible(
                            &self.node_type,
                            candidate.version,
                            format!(
                                "BACKWARD compatibility requires field {} ('{}') to widen: {} does not promote to {}",
                                number, def.name, prev_def.field_type, def.field_type
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_forward(
        &self,
        mut fields: FieldMap,
        source: &SchemaVersion,
        target: &SchemaVersion,
    ) -> Result<FieldMap, SchemaError> {
        for change in &target.upgrade_definitions {
            match change {
                FieldChange::AddField { field_number } => {
                    let def = target
                        .field(*field_number)
                        .ok_or_else(|| self.missing_change_target(target.version, *field_number))?;
                    if !fields.contains_key(field_number) {
                        if let Some(default) = &def.default {
                            fields.insert(*field_number, default.clone());
                        }
                    }
                }
                FieldChange::ModifyField { field_number } => {
                    let old_def = source
                        .field(*field_number)
                        .ok_or_else(|| self.missing_change_target(target.version, *field_number))?;
                    let new_def = target
                        .field(*field_number)
                        .ok_or_else(|| self.missing_change_target(target.version, *field_number))?;
                    if let Some(value) = fields.get(field_number) {
                        // migrations always convert at COERCE strength, even
                        // for fields whose runtime mode is STRICT
                        let converted = coerce(value, old_def.field_type, new_def.field_type)?;
                        fields.insert(*field_number, converted);
                    }
                }
                FieldChange::RemoveField { field_number } => {
                    fields.remove(field_number);
                }
            }
        }
        Ok(fields)
    }

    /// Undo one version step: `source` is the version being left, `target`
    /// its predecessor. Changes are inverted and applied in reverse order.
    fn apply_reverse(
        &self,
        mut fields: FieldMap,
        source: &SchemaVersion,
        target: &SchemaVersion,
    ) -> Result<FieldMap, SchemaError> {
        for change in source.upgrade_definitions.iter().rev() {
            match change {
                FieldChange::AddField { field_number } => {
                    fields.remove(field_number);
                }
                FieldChange::ModifyField { field_number } => {
                    let new_def = source
                        .field(*field_number)
                        .ok_or_else(|| self.missing_change_target(source.version, *field_number))?;
                    let old_def = target
                        .field(*field_number)
                        .ok_or_else(|| self.missing_change_target(source.version, *field_number))?;
                    if let Some(value) = fields.get(field_number) {
                        let converted = coerce(value, new_def.field_type, old_def.field_type)?;
                        fields.insert(*field_number, converted);
                    }
                }
                FieldChange::RemoveField { field_number } => {
                    let def = target
                        .field(*field_number)
                        .ok_or_else(|| self.missing_change_target(source.version, *field_number))?;
                    match &def.default {
                        Some(default) => {
                            fields.insert(*field_number, default.clone());
                        }
                        None => {
                            return Err(SchemaError::version_not_found(
                                &self.node_type,
                                format!(
                                    "{} (field '{}' was removed in version {} and has no default to reinstate)",
                                    target.version, def.name, source.version
                                ),
                            ));
                        }
                    }
                }
            }
        }
        Ok(fields)
    }

    /// Registration guarantees change lists match the field tables, so this
    /// only fires for histories built by hand around `register`
    fn missing_change_target(&self, version: u32, field_number: u32) -> SchemaError {
        SchemaError::incompatible(
            &self.node_type,
            version,
            format!("upgrade definition references unknown field number {}", field_number),
        )
    }
}
