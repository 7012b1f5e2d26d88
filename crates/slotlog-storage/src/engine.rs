//! # engine
//!
//! why: stand in for the durable storage engine and the state machine applier
//! relations: implement slotlog_core::StorageEngine and slotlog_core::LogApplier
//! what: InMemoryEngine (flush accounting, failure injection), InMemoryApplier

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use slotlog_core::{ApplyError, FlushError, LogApplier, LogEntry, StorageEngine};
use tracing::debug;

/// in-memory storage engine
///
/// tracks writes that are pending versus durable; flush_all makes every
/// pending write durable
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    pending: AtomicU64,
    durable: AtomicU64,
    flushes: AtomicU64,
    fail_next_flush: AtomicBool,
}

impl InMemoryEngine {
    /// create an engine with no writes
    pub fn new() -> Self {
        Self::default()
    }

    /// record a write that is not durable yet
    pub fn record_write(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn pending_writes(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn durable_writes(&self) -> u64 {
        self.durable.load(Ordering::SeqCst)
    }

    /// number of successful flushes so far
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// make the next flush_all fail once
    pub fn fail_next_flush(&self) {
        self.fail_next_flush.store(true, Ordering::SeqCst);
    }
}

impl StorageEngine for InMemoryEngine {
    fn flush_all(&self) -> Result<(), FlushError> {
        if self.fail_next_flush.swap(false, Ordering::SeqCst) {
            return Err(FlushError::Engine("injected flush failure".into()));
        }
        let flushed = self.pending.swap(0, Ordering::SeqCst);
        self.durable.fetch_add(flushed, Ordering::SeqCst);
        self.flushes.fetch_add(1, Ordering::SeqCst);
        debug!(flushed, "in-memory engine flushed");
        Ok(())
    }
}

/// applier that records every entry it is given
#[derive(Debug, Default)]
pub struct InMemoryApplier {
    applied: Mutex<Vec<LogEntry>>,
    fail_at: Option<u64>,
}

impl InMemoryApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// applier that rejects the entry at `index`
    pub fn failing_at(index: u64) -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
            fail_at: Some(index),
        }
    }

    /// indices applied so far, in order
    pub fn applied_indices(&self) -> Vec<u64> {
        self.applied.lock().iter().map(|e| e.index).collect()
    }
}

impl LogApplier for InMemoryApplier {
    fn apply(&self, entry: &LogEntry) -> Result<(), ApplyError> {
        if self.fail_at == Some(entry.index) {
            return Err(ApplyError::new(entry.index, "rejected by applier"));
        }
        self.applied.lock().push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_makes_pending_writes_durable() {
        let engine = InMemoryEngine::new();
        engine.record_write();
        engine.record_write();

        engine.flush_all().unwrap();

        assert_eq!(engine.pending_writes(), 0);
        assert_eq!(engine.durable_writes(), 2);
        assert_eq!(engine.flush_count(), 1);
    }

    #[test]
    fn injected_failure_fires_once() {
        let engine = InMemoryEngine::new();
        engine.record_write();
        engine.fail_next_flush();

        assert!(engine.flush_all().is_err());
        assert_eq!(engine.pending_writes(), 1);
        assert!(engine.flush_all().is_ok());
        assert_eq!(engine.durable_writes(), 1);
    }
}
