//! Receiver side of the staged handshake

use super::{load_state, save_state, stage_of, Stage};
use crate::oblivious::{
    BaseOtSender, EndemicSender, ExtensionReceiver, IknpReceiver, BASE_OT_COUNT,
};
use crate::store::StateStore;
use crate::{ChoiceVector, Error, OtKey, PartyId, ProtocolMessage, Result, Role};
use rand::rngs::OsRng;
use std::marker::PhantomData;
use tracing::{debug, info, instrument, warn};

/// Drives the receiver role: one `setup`, then any number of
/// `generate_keys` batches.
///
/// In the base OT the receiver plays *sender*. Calls for the same party
/// must not overlap.
pub struct ReceiverDriver<S, B = EndemicSender, E = IknpReceiver> {
    store: S,
    _engines: PhantomData<fn() -> (B, E)>,
}

impl<S: StateStore> ReceiverDriver<S> {
    /// Receiver using the bundled Endemic OT and IKNP engines
    pub fn new(store: S) -> Self {
        Self::with_engines(store)
    }
}

impl<S, B, E> ReceiverDriver<S, B, E>
where
    S: StateStore,
    B: BaseOtSender,
    E: ExtensionReceiver,
{
    /// Receiver using caller-chosen engines
    pub fn with_engines(store: S) -> Self {
        Self {
            store,
            _engines: PhantomData,
        }
    }

    /// Backing snapshot store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run both base OT rounds against the sender's `setup1` message
    ///
    /// Returns the message the sender needs for `setup2`. The receiver is
    /// ready as soon as this returns.
    #[instrument(skip_all, fields(party = %party))]
    pub fn setup(&self, party: &PartyId, message: &ProtocolMessage) -> Result<ProtocolMessage> {
        if self.store.exists(Role::Receiver, party)? {
            warn!("Replacing existing receiver state");
        }

        debug!("Base OT round 1");
        let (sender, reply) = B::round_one(BASE_OT_COUNT, &mut OsRng)?;

        debug!(message_len = message.len(), "Base OT round 2");
        let pairs = sender.round_two(message.as_bytes())?;
        let receiver = E::from_base(pairs)?;
        save_state(&self.store, party, &receiver)?;

        info!(reply_len = reply.len(), "Receiver setup complete, ready for key generation");
        Ok(ProtocolMessage::new(reply))
    }

    /// Derive one key per choice bit and the message for the sender's
    /// matching `generate_keys`
    #[instrument(skip_all, fields(party = %party, num_instances = num_instances))]
    pub fn generate_keys(
        &self,
        party: &PartyId,
        choices: &ChoiceVector,
        num_instances: usize,
    ) -> Result<(ProtocolMessage, Vec<OtKey>)> {
        if choices.len() != num_instances {
            return Err(Error::SizeMismatch {
                expected: num_instances,
                actual: choices.len(),
            });
        }
        if num_instances == 0 {
            return Err(Error::InvalidInstanceCount(num_instances));
        }

        let mut receiver: E = load_state(&self.store, party)?;

        debug!("Extension round");
        let (message, keys) = receiver.receive(choices)?;
        if keys.len() != num_instances {
            return Err(Error::SizeMismatch {
                expected: num_instances,
                actual: keys.len(),
            });
        }
        save_state(&self.store, party, &receiver)?;

        info!(message_len = message.len(), "Receiver keys generated");
        Ok((ProtocolMessage::new(message), keys))
    }

    /// Where the party's receiver session currently stands
    pub fn stage(&self, party: &PartyId) -> Result<Stage> {
        stage_of(&self.store, Role::Receiver, party)
    }

    /// Drop the party's receiver state; returns whether there was any
    #[instrument(skip_all, fields(party = %party))]
    pub fn retire(&self, party: &PartyId) -> Result<bool> {
        let existed = self.store.delete(Role::Receiver, party)?;
        info!(existed, "Receiver session retired");
        Ok(existed)
    }
}
