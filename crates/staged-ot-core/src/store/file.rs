//! File-system snapshot store

use super::{state_file_name, StateStore};
use crate::{Error, PartyId, Result, Role};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores each snapshot at `{state_dir}/{rolePrefix}{partyId}.bin`
///
/// Writes go to a sibling `.tmp` file that is renamed over the target, so a
/// reader sees either the old snapshot or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    state_dir: PathBuf,
    sync_writes: bool,
}

impl FileStore {
    /// Use an existing directory
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            sync_writes: false,
        }
    }

    /// Flush snapshot contents to disk before renaming them into place
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Directory holding the snapshot files
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Full path of the snapshot for (role, party)
    pub fn path_for(&self, role: Role, party: &PartyId) -> PathBuf {
        self.state_dir.join(state_file_name(role, party))
    }

    fn write_atomically(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            if self.sync_writes {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            e
        })
    }
}

impl StateStore for FileStore {
    fn save(&self, role: Role, party: &PartyId, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(role, party);
        self.write_atomically(&path, bytes)
            .map_err(|e| Error::storage(&path, e))?;
        debug!(path = %path.display(), len = bytes.len(), "Snapshot written");
        Ok(())
    }

    fn load(&self, role: Role, party: &PartyId) -> Result<Vec<u8>> {
        let path = self.path_for(role, party);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::missing(role, party)),
            Err(e) => Err(Error::storage(&path, e)),
        }
    }

    fn delete(&self, role: Role, party: &PartyId) -> Result<bool> {
        let path = self.path_for(role, party);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Snapshot deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::storage(&path, e)),
        }
    }

    fn exists(&self, role: Role, party: &PartyId) -> Result<bool> {
        let path = self.path_for(role, party);
        path.try_exists().map_err(|e| Error::storage(&path, e))
    }
}
