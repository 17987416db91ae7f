//! In-memory snapshot store for testing and embedding

use super::StateStore;
use crate::{Error, PartyId, Result, Role};
use dashmap::DashMap;
use std::sync::Arc;

/// In-process snapshot store
///
/// Clones share the same map, so a clone handed to each driver behaves like
/// a common state directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// (role, party) -> snapshot bytes
    snapshots: Arc<DashMap<(Role, PartyId), Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot is stored
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn save(&self, role: Role, party: &PartyId, bytes: &[u8]) -> Result<()> {
        self.snapshots.insert((role, party.clone()), bytes.to_vec());
        Ok(())
    }

    fn load(&self, role: Role, party: &PartyId) -> Result<Vec<u8>> {
        self.snapshots
            .get(&(role, party.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::missing(role, party))
    }

    fn delete(&self, role: Role, party: &PartyId) -> Result<bool> {
        Ok(self.snapshots.remove(&(role, party.clone())).is_some())
    }

    fn exists(&self, role: Role, party: &PartyId) -> Result<bool> {
        Ok(self.snapshots.contains_key(&(role, party.clone())))
    }
}
