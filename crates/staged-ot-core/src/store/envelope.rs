//! Framing of persisted actor snapshots
//!
//! Each snapshot is stored as a bincode-encoded [`StateEnvelope`]: a format
//! version, the kind of actor inside, the party it belongs to, and a BLAKE3
//! digest of the payload. This catches truncated or swapped files. It is
//! not a MAC and does not stop someone with write access to the store.

use crate::oblivious::Snapshot;
use crate::{Error, PartyId, Result, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Current envelope format version
pub const ENVELOPE_VERSION: u16 = 1;

/// Which actor a snapshot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// Sender between `setup1` and `setup2`
    BaseOtReceiver,
    /// Base OT sender between its rounds
    BaseOtSender,
    /// Sender after `setup2`
    ExtensionSender,
    /// Receiver after `setup`
    ExtensionReceiver,
}

impl StateKind {
    /// Role under whose key this kind is stored
    pub fn role(&self) -> Role {
        match self {
            StateKind::BaseOtReceiver | StateKind::ExtensionSender => Role::Sender,
            StateKind::BaseOtSender | StateKind::ExtensionReceiver => Role::Receiver,
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateKind::BaseOtReceiver => "base OT receiver",
            StateKind::BaseOtSender => "base OT sender",
            StateKind::ExtensionSender => "extension sender",
            StateKind::ExtensionReceiver => "extension receiver",
        };
        f.write_str(name)
    }
}

/// A sealed actor snapshot
#[derive(Serialize, Deserialize)]
pub struct StateEnvelope {
    version: u16,
    kind: StateKind,
    party: String,
    digest: [u8; 32],
    payload: Vec<u8>,
}

impl StateEnvelope {
    /// Serialize `state` and bind it to `party`
    pub fn seal<T: Snapshot>(party: &PartyId, state: &T) -> Result<Self> {
        let payload = bincode::serde::encode_to_vec(state, bincode::config::standard())?;
        Ok(Self {
            version: ENVELOPE_VERSION,
            kind: T::KIND,
            party: party.to_string(),
            digest: *blake3::hash(&payload).as_bytes(),
            payload,
        })
    }

    /// Encode the envelope for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Decode stored bytes, checking version, party binding and digest
    pub fn from_bytes(bytes: &[u8], party: &PartyId) -> Result<Self> {
        let (envelope, read): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| Error::CorruptState(e.to_string()))?;

        if read != bytes.len() {
            return Err(Error::CorruptState(format!(
                "{} trailing bytes after envelope",
                bytes.len() - read
            )));
        }
        if envelope.version != ENVELOPE_VERSION {
            return Err(Error::CorruptState(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }
        if envelope.party != party.as_str() {
            return Err(Error::CorruptState(format!(
                "snapshot belongs to party {:?}, not {:?}",
                envelope.party,
                party.as_str()
            )));
        }
        if *blake3::hash(&envelope.payload).as_bytes() != envelope.digest {
            return Err(Error::CorruptState("payload digest mismatch".into()));
        }

        Ok(envelope)
    }

    /// Which actor the payload holds
    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Restore the actor inside
    pub fn open<T: Snapshot>(&self) -> Result<T> {
        if self.kind != T::KIND {
            return Err(Error::CorruptState(format!(
                "expected {} snapshot, found {}",
                T::KIND,
                self.kind
            )));
        }
        let (state, read): (T, usize) =
            bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
                .map_err(|e| Error::CorruptState(e.to_string()))?;
        if read != self.payload.len() {
            return Err(Error::CorruptState("trailing bytes after snapshot".into()));
        }
        Ok(state)
    }
}

impl Drop for StateEnvelope {
    fn drop(&mut self) {
        self.payload.zeroize();
    }
}
