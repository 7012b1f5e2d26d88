//! # message
//!
//! why: define the snapshot transfer messages exchanged between header group members
//! relations: carries encoded artifacts from snapshot.rs, produced/consumed around manager.rs
//! what: SnapshotMessage with PullSnapshot, PullSnapshotResponse and SendSnapshot

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::slot::SlotId;
use crate::snapshot::{PartitionedSnapshot, SlotSnapshot, Snapshot};

/// Identifier of the node heading a replication group
pub type HeaderId = u64;

/// All snapshot transfer messages between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotMessage {
    /// Ask a group member for the snapshots of some slots (slot migration)
    PullSnapshot {
        header: HeaderId,
        slots: Vec<SlotId>,
    },
    /// Encoded per-slot snapshots answering a PullSnapshot
    PullSnapshotResponse {
        snapshots: BTreeMap<SlotId, Vec<u8>>,
    },
    /// Push a whole partitioned snapshot to a lagging follower
    SendSnapshot {
        header: HeaderId,
        data: Vec<u8>,
    },
}

impl SnapshotMessage {
    /// Build a SendSnapshot carrying the encoded `snapshot`
    pub fn send<S: Snapshot>(
        header: HeaderId,
        snapshot: &PartitionedSnapshot<S>,
    ) -> Result<Self, SnapshotError> {
        Ok(Self::SendSnapshot {
            header,
            data: snapshot.encode()?,
        })
    }

    /// Answer a pull with the requested slots that `snapshot` holds.
    ///
    /// Slots the snapshot does not hold are left out of the response.
    pub fn pull_response(
        snapshot: &PartitionedSnapshot<SlotSnapshot>,
        slots: &[SlotId],
    ) -> Result<Self, SnapshotError> {
        let mut snapshots = BTreeMap::new();
        for slot in slots {
            if let Some(per_slot) = snapshot.snapshot(*slot) {
                snapshots.insert(*slot, per_slot.encode()?);
            }
        }
        Ok(Self::PullSnapshotResponse { snapshots })
    }
}
