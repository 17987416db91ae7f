//! Oblivious Transfer (OT) engines
//!
//! The drivers only see the capability traits defined here:
//! - base OT, run from either sub-role in two rounds
//! - OT extension, bootstrapped from base OT keys and run once per batch
//!
//! Every actor is also a [`Snapshot`] so it can be persisted between
//! rounds. The bundled engines are:
//! - Endemic OT (base OT, receiver speaks first)
//! - IKNP (semi-honest OT extension)

pub mod bits;
pub mod endemic_ot;
pub mod iknp;

pub use endemic_ot::{EndemicReceiver, EndemicSender};
pub use iknp::{IknpReceiver, IknpSender};

use crate::store::StateKind;
use crate::{ChoiceVector, OtKey, OtKeyPair, Result};
use rand::{CryptoRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};

/// Number of base OTs, and the width of the extension matrix
pub const BASE_OT_COUNT: usize = 128;

/// Actor state that can be written to and restored from storage
pub trait Snapshot: Serialize + DeserializeOwned {
    /// Tag recorded alongside the serialized state
    const KIND: StateKind;
}

/// Base OT receiver: holds choice bits, learns one key per instance
pub trait BaseOtReceiver: Snapshot + Sized {
    /// Commit to `choices` and produce the first message
    fn round_one<R: RngCore + CryptoRng>(choices: Vec<bool>, rng: &mut R)
        -> Result<(Self, Vec<u8>)>;

    /// Consume the sender's message and derive one key per choice
    fn round_two(self, message: &[u8]) -> Result<Vec<OtKey>>;

    fn choices(&self) -> &[bool];
}

/// Base OT sender: learns both keys of every instance
pub trait BaseOtSender: Snapshot + Sized {
    /// Start `count` instances and produce the sender's message
    fn round_one<R: RngCore + CryptoRng>(count: usize, rng: &mut R) -> Result<(Self, Vec<u8>)>;

    /// Consume the receiver's message and derive the key pairs
    fn round_two(self, message: &[u8]) -> Result<Vec<OtKeyPair>>;
}

/// Extension sender, seeded by the base OT receiver's keys and choices
pub trait ExtensionSender: Snapshot + Sized {
    fn from_base(keys: Vec<OtKey>, choices: Vec<bool>) -> Result<Self>;

    /// Derive `count` key pairs from the receiver's batch message
    fn send(&mut self, message: &[u8], count: usize) -> Result<Vec<OtKeyPair>>;
}

/// Extension receiver, seeded by the base OT sender's key pairs
pub trait ExtensionReceiver: Snapshot + Sized {
    fn from_base(pairs: Vec<OtKeyPair>) -> Result<Self>;

    /// Derive one key per choice and the message the sender needs
    fn receive(&mut self, choices: &ChoiceVector) -> Result<(Vec<u8>, Vec<OtKey>)>;
}
