//! # slotlog-core
//!
//! why: keep the committed log of a header group as per-slot snapshots for catch-up and slot migration
//! relations: collaborators implemented by slotlog-storage, messages consumed by the replication layer
//! what: log buffer, slot function, schema types, snapshot types and codec, snapshot log manager

pub mod catalog;
pub mod config;
pub mod error;
pub mod log;
pub mod manager;
pub mod message;
pub mod schema;
pub mod slot;
pub mod snapshot;
pub mod traits;

pub use catalog::{collect_slot_schemas, SlotSchemas};
pub use config::SnapshotConfig;
pub use error::{
    ApplyError, CatalogError, ConfigError, FlushError, LogError, SlotError, SnapshotError,
};
pub use log::{LogBuffer, LogEntry};
pub use manager::PartitionedSnapshotLogManager;
pub use message::{HeaderId, SnapshotMessage};
pub use schema::{Compressor, DataType, Encoding, SchemaSet, SeriesSchema};
pub use slot::{HashSlotFunction, SlotFunction, SlotId, DEFAULT_SLOT_COUNT, SNAPSHOT_EPOCH};
pub use snapshot::{
    slot_snapshot_factory, PartitionedSnapshot, SlotSnapshot, Snapshot, SnapshotFactory,
};
pub use traits::{Catalog, LogApplier, StorageEngine};
