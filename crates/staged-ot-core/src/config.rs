//! Store configuration

use crate::store::FileStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Environment variable naming the state directory
pub const STATE_DIR_ENV: &str = "OT_STATE_DIR";

/// Environment variable enabling fsync before each snapshot rename
pub const STATE_SYNC_ENV: &str = "OT_STATE_SYNC";

pub const DEFAULT_STATE_DIR: &str = "./state";

/// Where and how snapshots are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one file per (role, party)
    pub state_dir: PathBuf,

    /// Flush each snapshot to disk before it replaces the previous one
    #[serde(default)]
    pub sync_writes: bool,
}

impl StoreConfig {
    /// Create a new config for `state_dir` without fsync
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            sync_writes: false,
        }
    }

    /// Set whether each write is flushed before the rename
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Read `OT_STATE_DIR` and `OT_STATE_SYNC`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let state_dir = lookup(STATE_DIR_ENV).unwrap_or_else(|| DEFAULT_STATE_DIR.to_string());
        let sync_writes = match lookup(STATE_SYNC_ENV) {
            Some(value) => parse_flag(STATE_SYNC_ENV, &value)?,
            None => false,
        };
        Ok(Self {
            state_dir: PathBuf::from(state_dir),
            sync_writes,
        })
    }

    /// Create the state directory if needed and open a store on it
    pub fn open(&self) -> Result<FileStore> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("state directory is empty".into()));
        }
        fs::create_dir_all(&self.state_dir).map_err(|e| Error::storage(&self.state_dir, e))?;
        if !self.state_dir.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "{} is not a directory",
                self.state_dir.display()
            )));
        }

        info!(
            state_dir = %self.state_dir.display(),
            sync_writes = self.sync_writes,
            "Opened state store"
        );
        Ok(FileStore::new(&self.state_dir).with_sync_writes(self.sync_writes))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_DIR)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::InvalidConfig(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}
