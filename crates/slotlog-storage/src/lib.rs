//! # slotlog-storage
//!
//! why: provide durable persistence for partitioned snapshots and reference collaborators using standard rust fs apis
//! relations: implements the slotlog-core collaborator traits, stores artifacts built by its manager
//! what: SnapshotStore trait, FileSnapshotStore, InMemorySnapshotStore, in-memory catalog/engine/applier

pub mod catalog;
pub mod engine;

pub use catalog::InMemoryCatalog;
pub use engine::{InMemoryApplier, InMemoryEngine};

use slotlog_core::{PartitionedSnapshot, Snapshot, SnapshotConfig, SnapshotError, SnapshotFactory};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// summary of a stored snapshot, readable without decoding the snapshot itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SnapshotMeta {
    pub last_log_id: u64,
    pub last_log_term: u64,
    pub slot_count: usize,
}

impl SnapshotMeta {
    /// summary of `snapshot`
    pub fn of<S: Snapshot>(snapshot: &PartitionedSnapshot<S>) -> Self {
        Self {
            last_log_id: snapshot.last_log_id(),
            last_log_term: snapshot.last_log_term(),
            slot_count: snapshot.len(),
        }
    }
}

/// trait for durable storage of the latest partitioned snapshot
///
/// this abstraction allows the same code to work with:
/// - real filesystem (native)
/// - in-memory (testing)
pub trait SnapshotStore {
    /// persist encoded snapshot bytes together with their summary
    fn write_snapshot(&mut self, data: &[u8], meta: &SnapshotMeta) -> io::Result<()>;

    /// load the encoded snapshot bytes, if any were saved
    fn read_snapshot(&self) -> io::Result<Option<Vec<u8>>>;

    /// load the summary of the saved snapshot, if any
    fn read_meta(&self) -> io::Result<Option<SnapshotMeta>>;

    /// clear all persisted state
    fn clear(&mut self) -> io::Result<()>;

    /// encode and persist `snapshot`, replacing the previous one
    fn save<S: Snapshot>(&mut self, snapshot: &PartitionedSnapshot<S>) -> io::Result<()> {
        let data = snapshot.encode().map_err(invalid_data)?;
        self.write_snapshot(&data, &SnapshotMeta::of(snapshot))
    }

    /// load and decode the saved snapshot, rebuilding slots with `factory`
    fn load<S: Snapshot>(
        &self,
        factory: SnapshotFactory<S>,
    ) -> io::Result<Option<PartitionedSnapshot<S>>> {
        match self.read_snapshot()? {
            Some(data) => PartitionedSnapshot::decode(&data, factory)
                .map(Some)
                .map_err(invalid_data),
            None => Ok(None),
        }
    }
}

fn invalid_data(e: SnapshotError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

// -- file storage implementation --

/// file-based snapshot store using std::fs
///
/// stores the snapshot in a directory with:
/// - snapshot.json: the encoded partitioned snapshot
/// - meta.json: cutoff and slot count of that snapshot
pub struct FileSnapshotStore {
    /// directory path for storing snapshot files
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// create a new store at the given directory
    /// creates the directory if it doesn't exist
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// open the store configured by `snapshot_dir`, if one is configured
    pub fn from_config(config: &SnapshotConfig) -> io::Result<Option<Self>> {
        config
            .snapshot_dir
            .as_ref()
            .map(|dir| Self::new(dir.clone()))
            .transpose()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// get the path to the snapshot file
    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.json")
    }

    /// get the path to the metadata file
    fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.json")
    }

    /// atomic write: write to temp file, fsync, then rename over `target`
    fn write_atomic(&self, tmp_name: &str, target: PathBuf, bytes: &[u8]) -> io::Result<()> {
        let temp_path = self.dir.join(tmp_name);
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, target)
    }

    fn read_file(path: PathBuf) -> io::Result<Option<Vec<u8>>> {
        if !path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(Some(contents))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn write_snapshot(&mut self, data: &[u8], meta: &SnapshotMeta) -> io::Result<()> {
        let meta_json = serde_json::to_vec_pretty(meta)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // snapshot first: a meta.json never describes a snapshot that is not on disk
        self.write_atomic("snapshot.tmp", self.snapshot_path(), data)?;
        self.write_atomic("meta.tmp", self.meta_path(), &meta_json)?;

        info!(
            dir = %self.dir.display(),
            last_log_id = meta.last_log_id,
            slots = meta.slot_count,
            "snapshot persisted"
        );
        Ok(())
    }

    fn read_snapshot(&self) -> io::Result<Option<Vec<u8>>> {
        Self::read_file(self.snapshot_path())
    }

    fn read_meta(&self) -> io::Result<Option<SnapshotMeta>> {
        match Self::read_file(self.meta_path())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            None => Ok(None),
        }
    }

    fn clear(&mut self) -> io::Result<()> {
        remove_if_exists(self.meta_path())?;
        remove_if_exists(self.snapshot_path())?;
        debug!(dir = %self.dir.display(), "snapshot store cleared");
        Ok(())
    }
}

fn remove_if_exists(path: PathBuf) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// -- in-memory storage implementation --

/// in-memory snapshot store for testing
///
/// stores the snapshot in memory, no persistence across restarts
#[derive(Default)]
pub struct InMemorySnapshotStore {
    data: Option<Vec<u8>>,
    meta: Option<SnapshotMeta>,
}

impl InMemorySnapshotStore {
    /// create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn write_snapshot(&mut self, data: &[u8], meta: &SnapshotMeta) -> io::Result<()> {
        self.data = Some(data.to_vec());
        self.meta = Some(*meta);
        Ok(())
    }

    fn read_snapshot(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.data.clone())
    }

    fn read_meta(&self) -> io::Result<Option<SnapshotMeta>> {
        Ok(self.meta)
    }

    fn clear(&mut self) -> io::Result<()> {
        self.data = None;
        self.meta = None;
        Ok(())
    }
}
