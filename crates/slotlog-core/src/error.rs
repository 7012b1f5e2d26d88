//! # error
//!
//! why: give every failure class of the snapshot log its own typed error
//! relations: returned by log.rs, slot.rs, snapshot.rs, manager.rs and the collaborator traits
//! what: LogError, SlotError, SnapshotError plus collaborator errors (flush, catalog, apply, config)

use thiserror::Error;

use crate::slot::SlotId;

/// Errors raised by the log buffer.
///
/// Both variants are programming-error class: they mean the producer of
/// log entries broke the ordering contract, not that something transient
/// went wrong.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    /// an appended entry does not directly follow the last one
    #[error("log sequencing error: expected index {expected}, got {actual}")]
    Sequencing { expected: u64, actual: u64 },

    /// remove_first on an empty buffer
    #[error("log buffer underrun: no entry to remove")]
    Underrun,

    /// attempt to truncate entries that are already committed
    #[error("cannot truncate from index {index}: commit index is {commit_index}")]
    TruncateCommitted { index: u64, commit_index: u64 },
}

/// Errors raised by slot computation and slot validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("invalid storage group name: {0:?}")]
    InvalidStorageGroup(String),

    #[error("slot {slot} is out of range (slot count {slot_count})")]
    OutOfRange { slot: SlotId, slot_count: u32 },
}

/// Failure of the storage engine's durable flush.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("flush i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage engine error: {0}")]
    Engine(String),
}

/// Failure while reading the schema catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("storage group not found: {0}")]
    StorageGroupNotFound(String),

    #[error("inconsistent catalog state: {0}")]
    Inconsistent(String),
}

/// Failure reported by a log applier.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("failed to apply log entry {index}: {reason}")]
pub struct ApplyError {
    pub index: u64,
    pub reason: String,
}

impl ApplyError {
    pub fn new(index: u64, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by snapshot operations and the transfer codec.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// durable flush failed; no in-memory state was touched
    #[error("snapshot aborted, flush failed: {0}")]
    Flush(#[from] FlushError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// a value does not fit the signed width used on the wire
    #[error("{field} value {value} does not fit the wire format")]
    WireOverflow { field: &'static str, value: u64 },

    /// a decoded value is negative or otherwise invalid
    #[error("invalid wire value for {field}: {value}")]
    InvalidWireValue { field: &'static str, value: i64 },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
