//! Core types for the staged OT handshake

use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::oblivious::bits;
use crate::{Error, Result};

/// Longest accepted party identifier, in bytes
pub const MAX_PARTY_ID_LEN: usize = 128;

/// Identifier namespacing one party's session state ("bank ID")
///
/// The identifier ends up inside a file name, so it is restricted to ASCII
/// alphanumerics, `-`, `_` and `.`, and may not start with a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartyId(String);

impl PartyId {
    /// Validate and wrap a party identifier
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidPartyId("empty identifier".into()));
        }
        if id.len() > MAX_PARTY_ID_LEN {
            return Err(Error::InvalidPartyId(format!(
                "identifier longer than {} bytes",
                MAX_PARTY_ID_LEN
            )));
        }
        if id.starts_with('.') {
            return Err(Error::InvalidPartyId(format!("{:?} starts with a dot", id)));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(Error::InvalidPartyId(format!(
                "{:?} contains disallowed character {:?}",
                id, c
            )));
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PartyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for PartyId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<PartyId> for String {
    fn from(id: PartyId) -> Self {
        id.0
    }
}

/// Which side of the overall OT a driver plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Holds key pairs; learns nothing about the choices
    Sender,
    /// Holds choice bits; learns one key of each pair
    Receiver,
}

impl Role {
    /// Fixed prefix of this role's state file names
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Role::Sender => "senderState",
            Role::Receiver => "recverState",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => f.write_str("sender"),
            Role::Receiver => f.write_str("receiver"),
        }
    }
}

/// Opaque protocol message passed between the two parties
///
/// Produced by one driver call and delivered verbatim by the caller's
/// transport to the matching call on the other side.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage(Vec<u8>);

impl ProtocolMessage {
    /// Wrap raw bytes received from the transport
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw message bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the message, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the message has no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ProtocolMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ProtocolMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.0[..self.0.len().min(8)];
        write!(f, "ProtocolMessage({} bytes, {}..)", self.0.len(), hex::encode(head))
    }
}

/// Receiver's selection bits, one per OT instance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChoiceVector(Vec<bool>);

impl ChoiceVector {
    /// Create a new choice vector from bits
    pub fn new(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    /// Uniformly random choices
    pub fn random<R: Rng + CryptoRng>(len: usize, rng: &mut R) -> Self {
        Self((0..len).map(|_| rng.gen()).collect())
    }

    /// Choices `0, 1, 0, 1, ...`
    pub fn alternating(len: usize) -> Self {
        Self((0..len).map(|i| i % 2 == 1).collect())
    }

    /// Number of choices
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no choices
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Choice `index`, if in range
    pub fn get(&self, index: usize) -> Option<bool> {
        self.0.get(index).copied()
    }

    /// Choices as a bool slice
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Iterate over the choices in order
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    /// Pack into bytes, least significant bit first
    pub fn to_packed(&self) -> Vec<u8> {
        bits::pack(&self.0)
    }
}

impl From<Vec<bool>> for ChoiceVector {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl FromIterator<bool> for ChoiceVector {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Length of an OT key in bytes
pub const KEY_LEN: usize = 32;

/// One secret OT key
///
/// Compared in constant time and wiped on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct OtKey([u8; KEY_LEN]);

impl OtKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for OtKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for OtKey {}

impl fmt::Debug for OtKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtKey(..)")
    }
}

/// The sender's two keys for one OT instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtKeyPair {
    pub zero: OtKey,
    pub one: OtKey,
}

impl OtKeyPair {
    /// Create a new pair from the keys for choice 0 and choice 1
    pub fn new(zero: OtKey, one: OtKey) -> Self {
        Self { zero, one }
    }

    /// The key a receiver with this choice bit learns
    pub fn select(&self, choice: bool) -> &OtKey {
        if choice {
            &self.one
        } else {
            &self.zero
        }
    }
}
