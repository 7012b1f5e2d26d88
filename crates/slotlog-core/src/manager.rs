//! # manager
//!
//! why: turn the committed prefix of the log into per-slot snapshots and serve them to peers
//! relations: owns log.rs's LogBuffer, uses catalog.rs, slot.rs and the traits.rs collaborators
//! what: PartitionedSnapshotLogManager with take/get/set snapshot under one lock

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::catalog::{collect_slot_schemas, SlotSchemas};
use crate::config::SnapshotConfig;
use crate::error::{ApplyError, ConfigError, LogError, SnapshotError};
use crate::log::{LogBuffer, LogEntry};
use crate::message::HeaderId;
use crate::schema::SchemaSet;
use crate::slot::{SlotFunction, SlotId, SNAPSHOT_EPOCH};
use crate::snapshot::{
    slot_snapshot_factory, PartitionedSnapshot, SlotSnapshot, Snapshot, SnapshotFactory,
};
use crate::traits::{Catalog, LogApplier, StorageEngine};

/// Everything guarded by the manager's single lock
struct ManagerState<S> {
    buffer: LogBuffer,
    slot_snapshots: BTreeMap<SlotId, S>,
    /// scratch mapping, rebuilt on every take_snapshot
    slot_schemas: SlotSchemas,
    last_log_id: u64,
    last_log_term: u64,
}

/// Log manager of a header group that snapshots its log per slot.
///
/// Each committed entry is folded into the snapshot of the slot it belongs
/// to; each slot snapshot carries the schemas of the storage groups in that
/// slot, captured when the slot snapshot was first created.
///
/// Committed entries are handed to the manager's [`LogApplier`] before they
/// may leave the buffer, so an entry is never drained unapplied.
///
/// `take_snapshot`, `get_snapshot` and `set_snapshot` (and every buffer
/// operation) serialize on one mutex. None of them can be cancelled, and the
/// lock acquisition never times out.
pub struct PartitionedSnapshotLogManager<S: Snapshot = SlotSnapshot> {
    header: HeaderId,
    engine: Arc<dyn StorageEngine>,
    catalog: Arc<dyn Catalog>,
    applier: Arc<dyn LogApplier>,
    slots: Arc<dyn SlotFunction>,
    factory: SnapshotFactory<S>,
    state: Mutex<ManagerState<S>>,
}

impl PartitionedSnapshotLogManager<SlotSnapshot> {
    /// Manager producing [`SlotSnapshot`]s, with the slot function sized by `config`
    pub fn with_config(
        header: HeaderId,
        config: &SnapshotConfig,
        engine: Arc<dyn StorageEngine>,
        catalog: Arc<dyn Catalog>,
        applier: Arc<dyn LogApplier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(
            header,
            engine,
            catalog,
            applier,
            Arc::new(config.slot_function()),
            slot_snapshot_factory(),
        ))
    }
}

impl<S: Snapshot> PartitionedSnapshotLogManager<S> {
    pub fn new(
        header: HeaderId,
        engine: Arc<dyn StorageEngine>,
        catalog: Arc<dyn Catalog>,
        applier: Arc<dyn LogApplier>,
        slots: Arc<dyn SlotFunction>,
        factory: SnapshotFactory<S>,
    ) -> Self {
        Self {
            header,
            engine,
            catalog,
            applier,
            slots,
            factory,
            state: Mutex::new(ManagerState {
                buffer: LogBuffer::new(),
                slot_snapshots: BTreeMap::new(),
                slot_schemas: SlotSchemas::new(),
                last_log_id: 0,
                last_log_term: 0,
            }),
        }
    }

    pub fn header(&self) -> HeaderId {
        self.header
    }

    // -- log buffer --

    /// Append one entry; entries whose slot cannot be computed are refused
    pub fn append_entry(&self, entry: LogEntry) -> Result<(), SnapshotError> {
        self.slots.slot_of_entry(&entry)?;
        self.state.lock().buffer.append(entry)?;
        Ok(())
    }

    /// Append entries in order, stopping at the first unroutable or out of sequence one
    pub fn append_entries(
        &self,
        entries: impl IntoIterator<Item = LogEntry>,
    ) -> Result<(), SnapshotError> {
        let mut state = self.state.lock();
        for entry in entries {
            self.slots.slot_of_entry(&entry)?;
            state.buffer.append(entry)?;
        }
        Ok(())
    }

    /// Raise the commit index; returns whether it moved
    pub fn advance_commit(&self, index: u64) -> bool {
        self.state.lock().buffer.advance_commit(index)
    }

    pub fn commit_index(&self) -> u64 {
        self.state.lock().buffer.commit_index()
    }

    pub fn buffered_len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Copy of the entries still waiting in the buffer
    pub fn buffered_entries(&self) -> Vec<LogEntry> {
        self.state.lock().buffer.iter().cloned().collect()
    }

    /// Drop the uncommitted suffix starting at `from_index`
    pub fn truncate_from(&self, from_index: u64) -> Result<usize, LogError> {
        self.state.lock().buffer.truncate_from(from_index)
    }

    /// Feed committed, not yet applied entries to the applier
    pub fn apply_committed(&self) -> Result<usize, ApplyError> {
        self.state.lock().buffer.apply_committed(&*self.applier)
    }

    pub fn last_applied(&self) -> u64 {
        self.state.lock().buffer.last_applied()
    }

    // -- snapshots --

    /// Fold every committed entry into its slot's snapshot.
    ///
    /// Committed entries the applier has not seen yet are applied first, then
    /// the storage engine is flushed so the schemas paired with the drained
    /// entries describe data that is already durable. An apply or flush
    /// failure aborts the pass before anything is drained. The slot schemas
    /// are recollected even when nothing is drained.
    ///
    /// Returns the number of entries drained from the buffer.
    pub fn take_snapshot(&self) -> Result<usize, SnapshotError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let applied = state.buffer.apply_committed(&*self.applier)?;
        if applied > 0 {
            debug!(
                header = self.header,
                applied,
                "applied committed entries before draining"
            );
        }

        info!(header = self.header, "taking snapshot, flushing storage engine");
        self.engine.flush_all()?;
        info!(header = self.header, "taking snapshot, storage engine is flushed");

        state.slot_schemas = collect_slot_schemas(&*self.catalog, &*self.slots, SNAPSHOT_EPOCH);

        let mut drained = 0;
        while state.buffer.has_applied_head() {
            // route before removing: an unroutable entry stays buffered
            let slot = match state.buffer.peek_first() {
                Some(entry) => self.slots.slot_of_entry(entry)?,
                None => break,
            };
            let entry = state.buffer.remove_first()?;
            state.last_log_id = entry.index;
            state.last_log_term = entry.term;

            let slot_schemas = &state.slot_schemas;
            let factory = &self.factory;
            state
                .slot_snapshots
                .entry(slot)
                .or_insert_with(|| {
                    debug!(slot, "creating slot snapshot");
                    factory(slot_schemas.get(&slot).cloned().unwrap_or_default())
                })
                .add(entry);
            drained += 1;
        }

        info!(
            header = self.header,
            drained,
            last_log_id = state.last_log_id,
            last_log_term = state.last_log_term,
            slots = state.slot_snapshots.len(),
            "snapshot is taken"
        );
        Ok(drained)
    }

    /// Point-in-time copy of every slot snapshot and the global cutoff.
    ///
    /// The returned value is independent of the manager: later passes never
    /// change it.
    pub fn get_snapshot(&self) -> PartitionedSnapshot<S> {
        let state = self.state.lock();
        let mut snapshot = PartitionedSnapshot::new(Arc::clone(&self.factory));
        for (slot, per_slot) in &state.slot_snapshots {
            snapshot.put_snapshot(*slot, per_slot.clone());
        }
        snapshot.set_last_log(state.last_log_id, state.last_log_term);
        snapshot
    }

    /// Install (replace) the snapshot of one slot.
    ///
    /// The global cutoff is left untouched; callers migrating single slots
    /// keep it consistent themselves.
    pub fn set_snapshot(&self, snapshot: S, slot: SlotId) -> Result<(), SnapshotError> {
        self.slots.check_slot(slot)?;
        let mut state = self.state.lock();
        state.slot_snapshots.insert(slot, snapshot);
        debug!(header = self.header, slot, "slot snapshot installed");
        Ok(())
    }

    /// Install a complete snapshot received from a peer.
    ///
    /// Every slot snapshot is replaced, the cutoff moves to the snapshot's and
    /// the buffer is repositioned right after it. A snapshot whose cutoff is
    /// not ahead of the current one is ignored; returns whether it was installed.
    pub fn install_snapshot(
        &self,
        snapshot: PartitionedSnapshot<S>,
    ) -> Result<bool, SnapshotError> {
        for slot in snapshot.slot_ids() {
            self.slots.check_slot(slot)?;
        }
        let (last_log_id, last_log_term) = (snapshot.last_log_id(), snapshot.last_log_term());

        let mut state = self.state.lock();
        if last_log_id <= state.last_log_id {
            debug!(
                header = self.header,
                last_log_id,
                current = state.last_log_id,
                "ignoring snapshot that is not ahead of the local cutoff"
            );
            return Ok(false);
        }

        let dropped = state.buffer.rebase_after(last_log_id, last_log_term);
        state.slot_snapshots = snapshot.into_slots();
        state.last_log_id = last_log_id;
        state.last_log_term = last_log_term;

        info!(
            header = self.header,
            last_log_id,
            last_log_term,
            dropped,
            slots = state.slot_snapshots.len(),
            "snapshot installed"
        );
        Ok(true)
    }

    /// Copy of one slot's snapshot
    pub fn slot_snapshot(&self, slot: SlotId) -> Option<S> {
        self.state.lock().slot_snapshots.get(&slot).cloned()
    }

    /// Forget a slot's snapshot, e.g. once the slot was migrated away
    pub fn reset_slot(&self, slot: SlotId) -> Option<S> {
        let removed = self.state.lock().slot_snapshots.remove(&slot);
        if removed.is_some() {
            debug!(header = self.header, slot, "slot snapshot reset");
        }
        removed
    }

    /// Schemas collected for `slot` by the latest take_snapshot
    pub fn collected_schemas(&self, slot: SlotId) -> Option<SchemaSet> {
        self.state.lock().slot_schemas.get(&slot).cloned()
    }

    pub fn last_log_id(&self) -> u64 {
        self.state.lock().last_log_id
    }

    pub fn last_log_term(&self) -> u64 {
        self.state.lock().last_log_term
    }
}
