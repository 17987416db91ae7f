//! Error types for staged OT operations

use crate::types::Role;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for staged OT operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving an OT session
///
/// None of these are retried internally. A failed stage leaves the stored
/// state as it was before the call, except for `setup2` once it has
/// consumed the Setup1 state.
#[derive(Debug, Error)]
pub enum Error {
    /// The stage requires a persisted actor state that does not exist
    #[error("No {role} state for party {party}")]
    MissingState { role: Role, party: String },

    /// Choice vector length disagrees with the requested instance count
    #[error("Size mismatch: expected {expected} instances, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Reading or writing the storage medium failed
    #[error("Storage failure at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An incoming protocol message could not be consumed
    #[error("Protocol decode failure: {0}")]
    ProtocolDecode(String),

    /// A persisted snapshot failed its integrity checks
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    /// Party identifier cannot be used as a storage key
    #[error("Invalid party ID: {0}")]
    InvalidPartyId(String),

    /// A batch must contain at least one instance
    #[error("Invalid instance count: {0}")]
    InvalidInstanceCount(usize),

    /// Invalid store configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn missing(role: Role, party: &crate::PartyId) -> Self {
        Error::MissingState {
            role,
            party: party.to_string(),
        }
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(e: bincode::error::EncodeError) -> Self {
        Error::Serialization(e.to_string())
    }
}
