//! # catalog
//!
//! why: provide a live, mutable schema catalog that the snapshot log can read from
//! relations: implements slotlog_core::Catalog, read by the manager on every snapshot pass
//! what: InMemoryCatalog with storage group and series registration

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use slotlog_core::slot::validate_storage_group;
use slotlog_core::{Catalog, CatalogError, SchemaSet, SeriesSchema, SlotError};
use tracing::debug;

/// in-memory metadata catalog
///
/// every read takes a point-in-time view under a read lock
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    groups: RwLock<BTreeMap<String, SchemaSet>>,
    /// groups whose series reads fail, to exercise partial collection
    inconsistent: RwLock<BTreeSet<String>>,
}

impl InMemoryCatalog {
    /// create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// register a storage group; returns false if it already existed
    pub fn set_storage_group(&self, name: &str) -> Result<bool, SlotError> {
        validate_storage_group(name)?;
        let mut groups = self.groups.write();
        if groups.contains_key(name) {
            return Ok(false);
        }
        groups.insert(name.to_string(), SchemaSet::new());
        debug!(storage_group = name, "storage group created");
        Ok(true)
    }

    /// remove a storage group and all its series
    pub fn delete_storage_group(&self, name: &str) -> bool {
        let removed = self.groups.write().remove(name).is_some();
        if removed {
            debug!(storage_group = name, "storage group deleted");
        }
        removed
    }

    /// register a series under an existing storage group
    pub fn register_series(
        &self,
        storage_group: &str,
        schema: SeriesSchema,
    ) -> Result<(), CatalogError> {
        let mut groups = self.groups.write();
        let series = groups
            .get_mut(storage_group)
            .ok_or_else(|| CatalogError::StorageGroupNotFound(storage_group.to_string()))?;
        series.insert(schema);
        Ok(())
    }

    /// make series reads of `storage_group` fail (or succeed again)
    pub fn set_inconsistent(&self, storage_group: &str, inconsistent: bool) {
        let mut groups = self.inconsistent.write();
        if inconsistent {
            groups.insert(storage_group.to_string());
        } else {
            groups.remove(storage_group);
        }
    }

    pub fn storage_group_count(&self) -> usize {
        self.groups.read().len()
    }
}

impl Catalog for InMemoryCatalog {
    fn list_storage_groups(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.groups.read().keys().cloned().collect())
    }

    fn series_of(&self, storage_group: &str) -> Result<SchemaSet, CatalogError> {
        if self.inconsistent.read().contains(storage_group) {
            return Err(CatalogError::Inconsistent(format!(
                "series of {storage_group} cannot be read"
            )));
        }
        self.groups
            .read()
            .get(storage_group)
            .cloned()
            .ok_or_else(|| CatalogError::StorageGroupNotFound(storage_group.to_string()))
    }
}
