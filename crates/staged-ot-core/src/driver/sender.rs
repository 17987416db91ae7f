//! Sender side of the staged handshake

use super::{load_state, save_state, stage_of, Stage};
use crate::oblivious::{
    BaseOtReceiver, EndemicReceiver, ExtensionSender, IknpSender, BASE_OT_COUNT,
};
use crate::store::StateStore;
use crate::{Error, OtKeyPair, PartyId, ProtocolMessage, Result, Role};
use rand::rngs::OsRng;
use rand::Rng;
use std::marker::PhantomData;
use tracing::{debug, error, info, instrument, warn};

/// Drives the sender role: `setup1`, `setup2`, then any number of
/// `generate_keys` batches.
///
/// In the base OT the sender plays *receiver*, as usual for OT extension.
/// Calls for the same party must not overlap.
pub struct SenderDriver<S, B = EndemicReceiver, E = IknpSender> {
    store: S,
    _engines: PhantomData<fn() -> (B, E)>,
}

impl<S: StateStore> SenderDriver<S> {
    /// Sender using the bundled Endemic OT and IKNP engines
    pub fn new(store: S) -> Self {
        Self::with_engines(store)
    }
}

impl<S, B, E> SenderDriver<S, B, E>
where
    S: StateStore,
    B: BaseOtReceiver,
    E: ExtensionSender,
{
    /// Sender using caller-chosen engines
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

    /// Start base OT with fresh random choices; returns the message for
    /// the receiver's `setup`
    #[instrument(skip_all, fields(party = %party))]
    pub fn setup1(&self, party: &PartyId) -> Result<ProtocolMessage> {
        if self.store.exists(Role::Sender, party)? {
            warn!("Discarding existing sender state, restarting setup");
        }

        let mut rng = OsRng;
        let choices: Vec<bool> = (0..BASE_OT_COUNT).map(|_| rng.gen()).collect();

        debug!("Base OT round 1");
        let (receiver, message) = B::round_one(choices, &mut rng)?;
        save_state(&self.store, party, &receiver)?;

        info!(message_len = message.len(), "Sender setup stage 1 complete");
        Ok(ProtocolMessage::new(message))
    }

    /// Finish base OT with the receiver's reply and become ready
    ///
    /// The stage 1 state is deleted before the reply is processed. If this
    /// call fails after that point the session is lost and must be set up
    /// again from `setup1`.
    #[instrument(skip_all, fields(party = %party))]
    pub fn setup2(&self, party: &PartyId, message: &ProtocolMessage) -> Result<()> {
        let receiver: B = load_state(&self.store, party)?;
        self.store.delete(Role::Sender, party)?;

        if let Err(e) = self.finish_setup(party, receiver, message) {
            error!(error = %e, "Sender setup stage 2 failed, session state lost");
            return Err(e);
        }

        info!("Sender setup complete, ready for key generation");
        Ok(())
    }

    fn finish_setup(&self, party: &PartyId, receiver: B, message: &ProtocolMessage) -> Result<()> {
        let choices = receiver.choices().to_vec();

        debug!("Base OT round 2");
        let keys = receiver.round_two(message.as_bytes())?;
        let sender = E::from_base(keys, choices)?;

        save_state(&self.store, party, &sender)
    }

    /// Derive `num_instances` key pairs from the receiver's batch message
    ///
    /// Each call consumes one batch; the same message is not accepted twice.
    #[instrument(skip_all, fields(party = %party, num_instances = num_instances))]
    pub fn generate_keys(
        &self,
        party: &PartyId,
        message: &ProtocolMessage,
        num_instances: usize,
    ) -> Result<Vec<OtKeyPair>> {
        if num_instances == 0 {
            return Err(Error::InvalidInstanceCount(num_instances));
        }

        let mut sender: E = load_state(&self.store, party)?;

        debug!(message_len = message.len(), "Extension round");
        let pairs = sender.send(message.as_bytes(), num_instances)?;
        if pairs.len() != num_instances {
            return Err(Error::SizeMismatch {
                expected: num_instances,
                actual: pairs.len(),
            });
        }
        save_state(&self.store, party, &sender)?;

        info!("Sender keys generated");
        Ok(pairs)
    }

    /// Where the party's sender session currently stands
    pub fn stage(&self, party: &PartyId) -> Result<Stage> {
        stage_of(&self.store, Role::Sender, party)
    }

    /// Drop the party's sender state; returns whether there was any
    #[instrument(skip_all, fields(party = %party))]
    pub fn retire(&self, party: &PartyId) -> Result<bool> {
        let existed = self.store.delete(Role::Sender, party)?;
        info!(existed, "Sender session retired");
        Ok(existed)
    }
}
