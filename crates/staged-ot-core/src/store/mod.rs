//! Persistence of actor state between stages
//!
//! A [`StateStore`] holds at most one snapshot per (role, party). It does
//! no locking: callers must not drive the same (role, party) from two
//! places at once.

pub mod envelope;
pub mod file;
pub mod memory;

pub use envelope::{StateEnvelope, StateKind};
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::{PartyId, Result, Role};
use std::sync::Arc;

/// Byte-level snapshot storage keyed by (role, party)
pub trait StateStore: Send + Sync {
    /// Write a full snapshot, replacing any previous one for the key
    fn save(&self, role: Role, party: &PartyId, bytes: &[u8]) -> Result<()>;

    /// Read the current snapshot, or fail with `MissingState`
    fn load(&self, role: Role, party: &PartyId) -> Result<Vec<u8>>;

    /// Remove the snapshot; returns whether one existed
    fn delete(&self, role: Role, party: &PartyId) -> Result<bool>;

    fn exists(&self, role: Role, party: &PartyId) -> Result<bool>;
}

/// Storage name of a snapshot: `{rolePrefix}{partyId}.bin`
pub fn state_file_name(role: Role, party: &PartyId) -> String {
    format!("{}{}.bin", role.file_prefix(), party)
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn save(&self, role: Role, party: &PartyId, bytes: &[u8]) -> Result<()> {
        (**self).save(role, party, bytes)
    }

    fn load(&self, role: Role, party: &PartyId) -> Result<Vec<u8>> {
        (**self).load(role, party)
    }

    fn delete(&self, role: Role, party: &PartyId) -> Result<bool> {
        (**self).delete(role, party)
    }

    fn exists(&self, role: Role, party: &PartyId) -> Result<bool> {
        (**self).exists(role, party)
    }
}

impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    fn save(&self, role: Role, party: &PartyId, bytes: &[u8]) -> Result<()> {
        (**self).save(role, party, bytes)
    }

    fn load(&self, role: Role, party: &PartyId) -> Result<Vec<u8>> {
        (**self).load(role, party)
    }

    fn delete(&self, role: Role, party: &PartyId) -> Result<bool> {
        (**self).delete(role, party)
    }

    fn exists(&self, role: Role, party: &PartyId) -> Result<bool> {
        (**self).exists(role, party)
    }
}
