//! # snapshot
//!
//! why: bundle committed log entries per slot, with the slot's schemas, into a transferable artifact
//! relations: built by manager.rs, carried by message.rs, persisted by slotlog-storage
//! what: Snapshot trait, SlotSnapshot, PartitionedSnapshot and its wire codec

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::log::LogEntry;
use crate::schema::{SchemaSet, SeriesSchema};
use crate::slot::SlotId;

/// A per-slot snapshot kind.
///
/// The schema set is fixed when the snapshot is created; entries are only
/// ever appended.
pub trait Snapshot: Clone + Send + Sync + 'static {
    /// append a committed entry, no reordering and no deduplication
    fn add(&mut self, entry: LogEntry);

    /// schemas captured when this snapshot was created
    fn schemas(&self) -> &SchemaSet;

    /// entries in the order they were added
    fn entries(&self) -> &[LogEntry];
}

/// Builds an empty per-slot snapshot from the slot's schema set
pub type SnapshotFactory<S> = Arc<dyn Fn(SchemaSet) -> S + Send + Sync>;

/// Factory for the default [`SlotSnapshot`] kind
pub fn slot_snapshot_factory() -> SnapshotFactory<SlotSnapshot> {
    Arc::new(SlotSnapshot::new)
}

/// Default per-slot snapshot: the slot's schemas plus its committed entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    #[serde(rename = "schema_set")]
    schemas: SchemaSet,
    entries: Vec<LogEntry>,
}

impl SlotSnapshot {
    pub fn new(schemas: SchemaSet) -> Self {
        Self {
            schemas,
            entries: Vec::new(),
        }
    }

    /// Index of the newest entry held by this slot
    pub fn last_index(&self) -> Option<u64> {
        self.entries.last().map(|e| e.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode this slot alone, for single-slot transfer
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Snapshot for SlotSnapshot {
    fn add(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}

/// Point-in-time bundle of per-slot snapshots with one global log cutoff.
///
/// `last_log_id`/`last_log_term` are shared by every slot: a receiver
/// resumes log replay from `last_log_id + 1`.
#[derive(Clone)]
pub struct PartitionedSnapshot<S: Snapshot = SlotSnapshot> {
    slots: BTreeMap<SlotId, S>,
    last_log_id: u64,
    last_log_term: u64,
    factory: SnapshotFactory<S>,
}

impl<S: Snapshot> PartitionedSnapshot<S> {
    pub fn new(factory: SnapshotFactory<S>) -> Self {
        Self {
            slots: BTreeMap::new(),
            last_log_id: 0,
            last_log_term: 0,
            factory,
        }
    }

    pub fn put_snapshot(&mut self, slot: SlotId, snapshot: S) {
        self.slots.insert(slot, snapshot);
    }

    pub fn snapshot(&self, slot: SlotId) -> Option<&S> {
        self.slots.get(&slot)
    }

    /// Slots in ascending order
    pub fn slots(&self) -> impl Iterator<Item = (SlotId, &S)> {
        self.slots.iter().map(|(slot, s)| (*slot, s))
    }

    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.slots.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn last_log_id(&self) -> u64 {
        self.last_log_id
    }

    pub fn last_log_term(&self) -> u64 {
        self.last_log_term
    }

    pub fn set_last_log(&mut self, id: u64, term: u64) {
        self.last_log_id = id;
        self.last_log_term = term;
    }

    /// Factory used to rebuild per-slot snapshots of this kind
    pub fn factory(&self) -> &SnapshotFactory<S> {
        &self.factory
    }

    pub fn into_slots(self) -> BTreeMap<SlotId, S> {
        self.slots
    }

    /// Encode into the transfer wire format
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut slots = Vec::with_capacity(self.slots.len());
        for (slot, snapshot) in &self.slots {
            let slot_id = i32::try_from(*slot).map_err(|_| SnapshotError::WireOverflow {
                field: "slot_id",
                value: u64::from(*slot),
            })?;
            slots.push(SlotWire {
                slot_id,
                schema_set: snapshot.schemas().iter().cloned().collect(),
                entries: snapshot.entries().to_vec(),
            });
        }
        let wire = SnapshotWire {
            last_log_id: to_wire("last_log_id", self.last_log_id)?,
            last_log_term: to_wire("last_log_term", self.last_log_term)?,
            slots,
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    /// Decode from the transfer wire format, rebuilding slots with `factory`
    pub fn decode(bytes: &[u8], factory: SnapshotFactory<S>) -> Result<Self, SnapshotError> {
        let wire: SnapshotWire = serde_json::from_slice(bytes)?;
        let mut snapshot = Self::new(factory);
        snapshot.set_last_log(
            from_wire("last_log_id", wire.last_log_id)?,
            from_wire("last_log_term", wire.last_log_term)?,
        );

        for slot in wire.slots {
            let slot_id = SlotId::try_from(slot.slot_id).map_err(|_| {
                SnapshotError::InvalidWireValue {
                    field: "slot_id",
                    value: i64::from(slot.slot_id),
                }
            })?;
            if snapshot.slots.contains_key(&slot_id) {
                return Err(SnapshotError::InvalidWireValue {
                    field: "slot_id",
                    value: i64::from(slot.slot_id),
                });
            }
            let mut per_slot = (snapshot.factory)(slot.schema_set.into_iter().collect());
            for entry in slot.entries {
                per_slot.add(entry);
            }
            snapshot.slots.insert(slot_id, per_slot);
        }
        Ok(snapshot)
    }
}

impl Default for PartitionedSnapshot<SlotSnapshot> {
    fn default() -> Self {
        Self::new(slot_snapshot_factory())
    }
}

impl<S: Snapshot + PartialEq> PartialEq for PartitionedSnapshot<S> {
    fn eq(&self, other: &Self) -> bool {
        self.last_log_id == other.last_log_id
            && self.last_log_term == other.last_log_term
            && self.slots == other.slots
    }
}

impl<S: Snapshot + fmt::Debug> fmt::Debug for PartitionedSnapshot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionedSnapshot")
            .field("last_log_id", &self.last_log_id)
            .field("last_log_term", &self.last_log_term)
            .field("slots", &self.slots)
            .finish()
    }
}

// -- wire format --

#[derive(Serialize, Deserialize)]
struct SnapshotWire {
    last_log_id: i64,
    last_log_term: i64,
    slots: Vec<SlotWire>,
}

#[derive(Serialize, Deserialize)]
struct SlotWire {
    slot_id: i32,
    schema_set: Vec<SeriesSchema>,
    entries: Vec<LogEntry>,
}

fn to_wire(field: &'static str, value: u64) -> Result<i64, SnapshotError> {
    i64::try_from(value).map_err(|_| SnapshotError::WireOverflow { field, value })
}

fn from_wire(field: &'static str, value: i64) -> Result<u64, SnapshotError> {
    u64::try_from(value).map_err(|_| SnapshotError::InvalidWireValue { field, value })
}
