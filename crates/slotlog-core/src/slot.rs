//! # slot
//!
//! why: route log entries and storage groups onto the fixed set of slots
//! relations: used by catalog.rs for schema grouping, manager.rs for draining
//! what: SlotId, SlotFunction trait, HashSlotFunction (crc16 based)

use crc::{Crc, CRC_16_XMODEM};

use crate::error::SlotError;
use crate::log::LogEntry;

/// Logical partition identifier
pub type SlotId = u32;

/// Default number of slots a header group partitions its key space into
pub const DEFAULT_SLOT_COUNT: u32 = 10_000;

/// Slot that entries without a storage group are routed to
pub const UNROUTED_SLOT: SlotId = 0;

/// Slot table epoch used for every storage group lookup, for entries and catalog alike
pub const SNAPSHOT_EPOCH: u64 = 0;

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Deterministic mapping from entries and storage groups to slots.
///
/// Implementations must be pure: the same input always yields the same slot.
pub trait SlotFunction: Send + Sync {
    /// number of slots; every returned slot is below this
    fn slot_count(&self) -> u32;

    /// slot of a storage group for a given epoch of the slot table
    fn slot_of_group(&self, storage_group: &str, epoch: u64) -> Result<SlotId, SlotError>;

    /// slot of a log entry, derived from its storage group at [`SNAPSHOT_EPOCH`]
    fn slot_of_entry(&self, entry: &LogEntry) -> Result<SlotId, SlotError> {
        match entry.storage_group.as_deref() {
            Some(group) => self.slot_of_group(group, SNAPSHOT_EPOCH),
            None => Ok(UNROUTED_SLOT),
        }
    }

    /// reject slots outside `[0, slot_count)`
    fn check_slot(&self, slot: SlotId) -> Result<(), SlotError> {
        let slot_count = self.slot_count();
        if slot >= slot_count {
            return Err(SlotError::OutOfRange { slot, slot_count });
        }
        Ok(())
    }
}

/// Hashes the storage group name and epoch with CRC-16/XMODEM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSlotFunction {
    slot_count: u32,
}

impl HashSlotFunction {
    /// `slot_count` of zero is clamped to one
    pub fn new(slot_count: u32) -> Self {
        Self {
            slot_count: slot_count.max(1),
        }
    }
}

impl Default for HashSlotFunction {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_COUNT)
    }
}

impl SlotFunction for HashSlotFunction {
    fn slot_count(&self) -> u32 {
        self.slot_count
    }

    fn slot_of_group(&self, storage_group: &str, epoch: u64) -> Result<SlotId, SlotError> {
        validate_storage_group(storage_group)?;
        let mut digest = CRC16.digest();
        digest.update(storage_group.as_bytes());
        digest.update(&epoch.to_le_bytes());
        Ok(u32::from(digest.finalize()) % self.slot_count)
    }
}

/// Storage group names are dot-separated paths with no empty segment
pub fn validate_storage_group(name: &str) -> Result<(), SlotError> {
    if name.trim().is_empty() || name.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(SlotError::InvalidStorageGroup(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_group_same_slot() {
        let slots = HashSlotFunction::default();
        let a = slots.slot_of_group("root.sg1", 0).unwrap();
        let b = slots.slot_of_group("root.sg1", 0).unwrap();
        assert_eq!(a, b);
        assert!(a < DEFAULT_SLOT_COUNT);
    }

    #[test]
    fn entry_slot_follows_its_storage_group() {
        let slots = HashSlotFunction::new(64);
        let entry = LogEntry::for_storage_group(1, 1, "root.sg2", vec![]);
        assert_eq!(
            slots.slot_of_entry(&entry).unwrap(),
            slots.slot_of_group("root.sg2", SNAPSHOT_EPOCH).unwrap()
        );
    }

    #[test]
    fn entry_without_group_goes_to_unrouted_slot() {
        let slots = HashSlotFunction::new(64);
        let entry = LogEntry::new(1, 1, vec![]);
        assert_eq!(slots.slot_of_entry(&entry).unwrap(), UNROUTED_SLOT);
    }

    #[test]
    fn malformed_names_are_rejected() {
        let slots = HashSlotFunction::default();
        for name in ["", "  ", "root..sg", "root.sg.", ".root"] {
            assert_eq!(
                slots.slot_of_group(name, 0).unwrap_err(),
                SlotError::InvalidStorageGroup(name.to_string())
            );
        }
    }

    #[test]
    fn check_slot_bounds() {
        let slots = HashSlotFunction::new(4);
        assert!(slots.check_slot(3).is_ok());
        assert_eq!(
            slots.check_slot(4).unwrap_err(),
            SlotError::OutOfRange {
                slot: 4,
                slot_count: 4
            }
        );
    }
}
