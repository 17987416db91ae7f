//! # Staged OT
//!
//! Resumable two-party oblivious-transfer handshake with persisted state.
//!
//! Each party runs as a sequence of independent calls. Between calls all
//! protocol state is written to a [`StateStore`], keyed by role and
//! party id, so a stage can run in a different process from the one
//! before it.
//!
//! - 128 base OTs (Endemic OT over secp256k1) seed the session
//! - IKNP extension then produces any number of 32-byte key batches
//!
//! ## Example
//!
//! ```rust,ignore
//! use staged_ot_core::{ChoiceVector, MemoryStore, PartyId, ReceiverDriver, SenderDriver};
//!
//! let store = MemoryStore::new();
//! let sender = SenderDriver::new(store.clone());
//! let receiver = ReceiverDriver::new(store);
//! let party = PartyId::new("acct-1")?;
//!
//! let m1 = sender.setup1(&party)?;
//! let m2 = receiver.setup(&party, &m1)?;
//! sender.setup2(&party, &m2)?;
//!
//! let choices = ChoiceVector::alternating(128);
//! let (m3, keys) = receiver.generate_keys(&party, &choices, 128)?;
//! let pairs = sender.generate_keys(&party, &m3, 128)?;
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod oblivious;
pub mod store;
pub mod types;

pub use config::StoreConfig;
pub use driver::{ReceiverDriver, SenderDriver, Stage};
pub use error::{Error, Result};
pub use oblivious::BASE_OT_COUNT;
pub use store::{FileStore, MemoryStore, StateStore};
pub use types::{ChoiceVector, OtKey, OtKeyPair, PartyId, ProtocolMessage, Role, KEY_LEN};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
