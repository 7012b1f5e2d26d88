//! # catalog
//!
//! why: group the catalog's series schemas by the slot their storage group lives in
//! relations: called by manager.rs inside the snapshot critical section
//! what: collect_slot_schemas, rebuilt from scratch on every snapshot pass

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::schema::SchemaSet;
use crate::slot::{SlotFunction, SlotId};
use crate::traits::Catalog;

/// Schema sets keyed by slot
pub type SlotSchemas = HashMap<SlotId, SchemaSet>;

/// Enumerate every storage group and union its series schemas into its slot.
///
/// The mapping is recollected in full each time instead of being maintained
/// incrementally, so storage groups removed between two passes never leave
/// stale schemas behind. Catalog failures are logged and skipped: a partial
/// mapping is returned and the next pass retries everything.
pub fn collect_slot_schemas(
    catalog: &dyn Catalog,
    slots: &dyn SlotFunction,
    epoch: u64,
) -> SlotSchemas {
    let mut slot_schemas = SlotSchemas::new();

    let groups = match catalog.list_storage_groups() {
        Ok(groups) => groups,
        Err(e) => {
            warn!(error = %e, "failed to list storage groups, no schemas collected");
            return slot_schemas;
        }
    };

    for group in groups {
        let slot = match slots.slot_of_group(&group, epoch) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(storage_group = %group, error = %e, "skipping storage group with no slot");
                continue;
            }
        };
        let schemas = slot_schemas.entry(slot).or_default();
        match catalog.series_of(&group) {
            Ok(series) => schemas.extend(series),
            Err(e) => {
                warn!(storage_group = %group, slot, error = %e, "failed to collect series");
                continue;
            }
        }
        debug!(storage_group = %group, slot, count = schemas.len(), "timeseries collected for slot");
    }

    slot_schemas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::schema::{DataType, SeriesSchema};
    use crate::slot::HashSlotFunction;

    struct FixedCatalog {
        groups: Vec<(&'static str, Vec<&'static str>)>,
        broken: Option<&'static str>,
    }

    impl Catalog for FixedCatalog {
        fn list_storage_groups(&self) -> Result<Vec<String>, CatalogError> {
            Ok(self.groups.iter().map(|(g, _)| g.to_string()).collect())
        }

        fn series_of(&self, storage_group: &str) -> Result<SchemaSet, CatalogError> {
            if self.broken == Some(storage_group) {
                return Err(CatalogError::Inconsistent(storage_group.to_string()));
            }
            let (_, series) = self
                .groups
                .iter()
                .find(|(g, _)| *g == storage_group)
                .ok_or_else(|| CatalogError::StorageGroupNotFound(storage_group.to_string()))?;
            Ok(series
                .iter()
                .map(|p| SeriesSchema::plain(*p, DataType::Double))
                .collect())
        }
    }

    #[test]
    fn schemas_are_grouped_by_slot() {
        let catalog = FixedCatalog {
            groups: vec![
                ("root.sg1", vec!["root.sg1.d1.s1", "root.sg1.d1.s2"]),
                ("root.sg2", vec!["root.sg2.d1.s1"]),
            ],
            broken: None,
        };
        let slots = HashSlotFunction::new(1);

        let collected = collect_slot_schemas(&catalog, &slots, 0);

        assert_eq!(collected.len(), 1);
        assert_eq!(collected[&0].len(), 3);
    }

    #[test]
    fn broken_group_is_skipped() {
        let catalog = FixedCatalog {
            groups: vec![
                ("root.ok", vec!["root.ok.d1.s1"]),
                ("root.bad", vec!["root.bad.d1.s1"]),
            ],
            broken: Some("root.bad"),
        };
        let slots = HashSlotFunction::new(1);

        let collected = collect_slot_schemas(&catalog, &slots, 0);

        let paths: Vec<_> = collected[&0].iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["root.ok.d1.s1"]);
    }
}
