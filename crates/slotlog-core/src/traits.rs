//! # traits
//!
//! why: keep the storage engine, catalog and applier out of the core as injected collaborators
//! relations: implemented by slotlog-storage, consumed by manager.rs, catalog.rs and log.rs
//! what: StorageEngine, Catalog and LogApplier traits

use crate::error::{ApplyError, CatalogError, FlushError};
use crate::log::LogEntry;
use crate::schema::SchemaSet;

/// durable storage engine behind the state machine
///
/// implementations may be backed by:
/// - a real tsfile engine
/// - an in-memory engine (testing)
pub trait StorageEngine: Send + Sync {
    /// block until every pending in-memory write is durable
    fn flush_all(&self) -> Result<(), FlushError>;
}

/// read-only view of the metadata catalog
pub trait Catalog: Send + Sync {
    /// names of every storage group currently registered
    fn list_storage_groups(&self) -> Result<Vec<String>, CatalogError>;

    /// schemas of every series registered under `storage_group`
    fn series_of(&self, storage_group: &str) -> Result<SchemaSet, CatalogError>;
}

/// consumer of committed log entries
pub trait LogApplier: Send + Sync {
    /// apply one committed entry to the state machine
    fn apply(&self, entry: &LogEntry) -> Result<(), ApplyError>;
}
