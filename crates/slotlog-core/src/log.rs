//! # log
//!
//! why: hold replicated entries until they are applied and folded into a snapshot
//! relations: owned by manager.rs, entries routed by slot.rs, drained into snapshot.rs
//! what: LogEntry struct, LogBuffer with commit index and applied watermark

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApplyError, LogError};
use crate::traits::LogApplier;

/// A single entry in the replicated log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The term when this entry was created
    pub term: u64,
    /// The index of this entry in the log (1-indexed)
    pub index: u64,
    /// Storage group the payload writes into, used to route the entry to a slot.
    /// `None` for entries that do not belong to any storage group.
    #[serde(default)]
    pub storage_group: Option<String>,
    /// The command to be applied to the state machine
    pub command: Vec<u8>,
}

impl LogEntry {
    /// Create a new log entry without a storage group
    pub fn new(term: u64, index: u64, command: Vec<u8>) -> Self {
        Self {
            term,
            index,
            storage_group: None,
            command,
        }
    }

    /// Create a new log entry that writes into `storage_group`
    pub fn for_storage_group(
        term: u64,
        index: u64,
        storage_group: impl Into<String>,
        command: Vec<u8>,
    ) -> Self {
        Self {
            term,
            index,
            storage_group: Some(storage_group.into()),
            command,
        }
    }
}

/// Ordered buffer of log entries awaiting application and snapshotting.
///
/// Indices are strictly increasing with no gaps. `commit_index` is the
/// watermark advanced by the consensus layer; only entries at or below it
/// may be applied or drained.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    /// index/term of the entry just before the first buffered one
    base_index: u64,
    base_term: u64,
    commit_index: u64,
    last_applied: u64,
}

impl LogBuffer {
    /// Create an empty buffer expecting index 1 next
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer positioned after an installed snapshot.
    ///
    /// Everything up to `index` counts as committed and applied.
    pub fn starting_after(index: u64, term: u64) -> Self {
        Self {
            entries: VecDeque::new(),
            base_index: index,
            base_term: term,
            commit_index: index,
            last_applied: index,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn commit_index(&self) -> u64 {
        self.commit_index
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// Index of the newest entry ever appended (or the base position)
    pub fn last_index(&self) -> u64 {
        self.entries.back().map_or(self.base_index, |e| e.index)
    }

    /// Term of the newest entry ever appended (or the base position)
    pub fn last_term(&self) -> u64 {
        self.entries.back().map_or(self.base_term, |e| e.term)
    }

    /// Index the next appended entry must carry
    pub fn next_index(&self) -> u64 {
        self.last_index() + 1
    }

    /// Append an entry; its index must be exactly `next_index()`
    pub fn append(&mut self, entry: LogEntry) -> Result<(), LogError> {
        let expected = self.next_index();
        if entry.index != expected {
            return Err(LogError::Sequencing {
                expected,
                actual: entry.index,
            });
        }
        self.entries.push_back(entry);
        Ok(())
    }

    pub fn peek_first(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// Remove the lowest-index entry.
    ///
    /// The removed position becomes the new base, so `next_index()` is
    /// unaffected even if the buffer is drained completely.
    pub fn remove_first(&mut self) -> Result<LogEntry, LogError> {
        let entry = self.entries.pop_front().ok_or(LogError::Underrun)?;
        self.base_index = entry.index;
        self.base_term = entry.term;
        Ok(entry)
    }

    /// Raise the commit index. Lower values are ignored.
    ///
    /// Returns whether the commit index moved.
    pub fn advance_commit(&mut self, index: u64) -> bool {
        if index <= self.commit_index {
            debug!(
                commit_index = self.commit_index,
                requested = index,
                "ignoring non-advancing commit index"
            );
            return false;
        }
        self.commit_index = index;
        true
    }

    /// Drop every entry with `index >= from_index`.
    ///
    /// Only the uncommitted suffix may be truncated.
    pub fn truncate_from(&mut self, from_index: u64) -> Result<usize, LogError> {
        if from_index <= self.commit_index {
            return Err(LogError::TruncateCommitted {
                index: from_index,
                commit_index: self.commit_index,
            });
        }
        let before = self.entries.len();
        self.entries.retain(|e| e.index < from_index);
        Ok(before - self.entries.len())
    }

    /// Whether the first entry exists and is at or below the commit index
    pub fn has_committed_head(&self) -> bool {
        self.entries
            .front()
            .is_some_and(|e| e.index <= self.commit_index)
    }

    /// Whether the first entry exists, is committed and was handed to the applier
    pub fn has_applied_head(&self) -> bool {
        self.entries
            .front()
            .is_some_and(|e| e.index <= self.commit_index.min(self.last_applied))
    }

    /// Reposition the buffer right after an installed snapshot ending at `index`.
    ///
    /// Entries up to `index` are dropped, newer ones stay buffered as long as
    /// they still follow on without a gap. Returns how many entries were dropped.
    pub fn rebase_after(&mut self, index: u64, term: u64) -> usize {
        let mut rebased = Self::starting_after(index, term);
        rebased.commit_index = self.commit_index.max(index);
        rebased.last_applied = self.last_applied.max(index);

        let mut dropped = 0;
        for entry in self.entries.drain(..) {
            if entry.index <= index || rebased.append(entry).is_err() {
                dropped += 1;
            }
        }
        rebased.last_applied = rebased.last_applied.min(rebased.last_index());
        *self = rebased;
        dropped
    }

    /// Hand entries in `(last_applied, commit_index]` to `applier`, in order.
    ///
    /// Entries that were already drained are skipped; entries stay buffered
    /// after being applied. Stops at the first failing entry.
    pub fn apply_committed(&mut self, applier: &dyn LogApplier) -> Result<usize, ApplyError> {
        let mut applied = 0;
        for entry in &self.entries {
            if entry.index <= self.last_applied {
                continue;
            }
            if entry.index > self.commit_index {
                break;
            }
            applier.apply(entry)?;
            self.last_applied = entry.index;
            applied += 1;
        }
        Ok(applied)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u64) -> LogEntry {
        LogEntry::new(1, index, vec![index as u8])
    }

    #[test]
    fn append_requires_consecutive_indices() {
        let mut buffer = LogBuffer::new();
        buffer.append(entry(1)).unwrap();
        buffer.append(entry(2)).unwrap();

        let err = buffer.append(entry(4)).unwrap_err();
        assert_eq!(
            err,
            LogError::Sequencing {
                expected: 3,
                actual: 4
            }
        );
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn remove_first_keeps_next_index() {
        let mut buffer = LogBuffer::new();
        buffer.append(entry(1)).unwrap();
        buffer.remove_first().unwrap();

        assert!(buffer.is_empty());
        assert_eq!(buffer.next_index(), 2);
        assert_eq!(buffer.remove_first().unwrap_err(), LogError::Underrun);
    }

    #[test]
    fn applied_head_waits_for_the_applier() {
        let mut buffer = LogBuffer::new();
        buffer.append(entry(1)).unwrap();
        buffer.advance_commit(1);

        assert!(buffer.has_committed_head());
        assert!(!buffer.has_applied_head());
    }

    #[test]
    fn rebase_after_keeps_the_newer_suffix() {
        let mut buffer = LogBuffer::new();
        for index in 1..=5 {
            buffer.append(entry(index)).unwrap();
        }
        buffer.advance_commit(2);

        assert_eq!(buffer.rebase_after(3, 1), 3);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.peek_first().unwrap().index, 4);
        assert_eq!(buffer.commit_index(), 3);
        assert_eq!(buffer.last_applied(), 3);
        assert_eq!(buffer.next_index(), 6);
    }

    #[test]
    fn rebase_beyond_the_buffer_empties_it() {
        let mut buffer = LogBuffer::new();
        buffer.append(entry(1)).unwrap();

        assert_eq!(buffer.rebase_after(10, 2), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.next_index(), 11);
        assert_eq!(buffer.last_term(), 2);
    }

    #[test]
    fn commit_index_never_decreases() {
        let mut buffer = LogBuffer::new();
        assert!(buffer.advance_commit(5));
        assert!(!buffer.advance_commit(3));
        assert_eq!(buffer.commit_index(), 5);
    }
}
