//! # config
//!
//! why: collect the tunables of a header group's snapshot log in one place
//! relations: consumed by manager.rs, sizes slot.rs's HashSlotFunction
//! what: SnapshotConfig with defaults, json loading and validation

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::slot::{HashSlotFunction, DEFAULT_SLOT_COUNT};

/// Configuration of the partitioned snapshot log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// number of slots the key space is split into
    pub slot_count: u32,
    /// where snapshots are persisted, if anywhere
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            snapshot_dir: None,
        }
    }
}

impl SnapshotConfig {
    /// Load a config from a json file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_count == 0 {
            return Err(ConfigError::Invalid("slot_count must be positive".into()));
        }
        if i32::try_from(self.slot_count).is_err() {
            return Err(ConfigError::Invalid(format!(
                "slot_count {} does not fit a wire slot id",
                self.slot_count
            )));
        }
        Ok(())
    }

    /// Slot function sized by this config
    pub fn slot_function(&self) -> HashSlotFunction {
        HashSlotFunction::new(self.slot_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = SnapshotConfig::default();
        assert_eq!(config.slot_count, 10_000);
        assert_eq!(config.snapshot_dir, None);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: SnapshotConfig = serde_json::from_str(r#"{"slot_count": 16}"#).unwrap();
        assert_eq!(config.slot_count, 16);
        assert_eq!(config.snapshot_dir, None);
    }

    #[test]
    fn zero_slot_count_is_invalid() {
        let config = SnapshotConfig {
            slot_count: 0,
            ..SnapshotConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
