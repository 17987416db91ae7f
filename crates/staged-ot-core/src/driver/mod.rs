//! Staged handshake drivers
//!
//! Each driver call is one stage of the session:
//!
//! 1. `SenderDriver::setup1` → M1
//! 2. `ReceiverDriver::setup(M1)` → M2
//! 3. `SenderDriver::setup2(M2)`
//! 4. `ReceiverDriver::generate_keys(choices)` → M3, receiver keys
//! 5. `SenderDriver::generate_keys(M3)` → sender key pairs
//!
//! Steps 4 and 5 can be repeated for further batches. Between stages all
//! state lives in the [`StateStore`]; nothing is kept in memory.

mod receiver;
mod sender;

pub use receiver::ReceiverDriver;
pub use sender::SenderDriver;

use crate::oblivious::Snapshot;
use crate::store::{StateEnvelope, StateKind, StateStore};
use crate::{Error, PartyId, Result, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Progress of one (role, party) session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Nothing stored
    Uninitialized,
    /// Base OT started but not finished
    BaseSetupInProgress,
    /// Extension actor stored, key generation possible
    ExtensionReady,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Uninitialized => f.write_str("uninitialized"),
            Stage::BaseSetupInProgress => f.write_str("base setup in progress"),
            Stage::ExtensionReady => f.write_str("extension ready"),
        }
    }
}

/// Load the stored actor of type `T`
///
/// A snapshot of a different kind counts as missing: the stage being run
/// has not had its prerequisite.
fn load_state<S: StateStore, T: Snapshot>(store: &S, party: &PartyId) -> Result<T> {
    let role = T::KIND.role();
    let bytes = store.load(role, party)?;
    let envelope = StateEnvelope::from_bytes(&bytes, party)?;

    if envelope.kind() != T::KIND {
        warn!(
            expected = %T::KIND,
            found = %envelope.kind(),
            "Stored state is from a different stage"
        );
        return Err(Error::missing(role, party));
    }
    envelope.open()
}

fn save_state<S: StateStore, T: Snapshot>(store: &S, party: &PartyId, state: &T) -> Result<()> {
    let bytes = StateEnvelope::seal(party, state)?.to_bytes()?;
    store.save(T::KIND.role(), party, &bytes)
}

fn stage_of<S: StateStore>(store: &S, role: Role, party: &PartyId) -> Result<Stage> {
    let bytes = match store.load(role, party) {
        Ok(bytes) => bytes,
        Err(Error::MissingState { .. }) => return Ok(Stage::Uninitialized),
        Err(e) => return Err(e),
    };

    let stage = match StateEnvelope::from_bytes(&bytes, party)?.kind() {
        StateKind::BaseOtReceiver | StateKind::BaseOtSender => Stage::BaseSetupInProgress,
        StateKind::ExtensionSender | StateKind::ExtensionReceiver => Stage::ExtensionReady,
    };
    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::file::tests::temp_store;
    use crate::store::MemoryStore;
    use crate::{ChoiceVector, OtKey, OtKeyPair, ProtocolMessage};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn party(id: &str) -> PartyId {
        PartyId::new(id).unwrap()
    }

    /// Stages 1-3 for one party
    fn setup<S: StateStore>(
        sender: &SenderDriver<S>,
        receiver: &ReceiverDriver<S>,
        party: &PartyId,
    ) {
        let m1 = sender.setup1(party).unwrap();
        let m2 = receiver.setup(party, &m1).unwrap();
        sender.setup2(party, &m2).unwrap();
    }

    /// Stages 4-5 for one batch
    fn batch<S: StateStore>(
        sender: &SenderDriver<S>,
        receiver: &ReceiverDriver<S>,
        party: &PartyId,
        choices: &ChoiceVector,
    ) -> (Vec<OtKey>, Vec<OtKeyPair>) {
        let n = choices.len();
        let (m3, keys) = receiver.generate_keys(party, choices, n).unwrap();
        let pairs = sender.generate_keys(party, &m3, n).unwrap();
        (keys, pairs)
    }

    fn assert_correlated(choices: &ChoiceVector, keys: &[OtKey], pairs: &[OtKeyPair]) {
        assert_eq!(keys.len(), choices.len());
        assert_eq!(pairs.len(), choices.len());
        for (i, choice) in choices.iter().enumerate() {
            assert_eq!(&keys[i], pairs[i].select(choice), "instance {}", i);
            assert_ne!(&keys[i], pairs[i].select(!choice), "instance {}", i);
        }
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(64)]
    #[case(500)]
    fn test_full_handshake(#[case] n: usize) {
        init_tracing();
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store);
        let id = party("acct-1");

        setup(&sender, &receiver, &id);
        let mut rng = ChaCha20Rng::seed_from_u64(n as u64);
        let choices = ChoiceVector::random(n, &mut rng);
        let (keys, pairs) = batch(&sender, &receiver, &id, &choices);

        assert_correlated(&choices, &keys, &pairs);
    }

    #[test]
    fn test_acct_scenario_on_disk() {
        init_tracing();
        let store = temp_store();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store.clone());
        let id = party("acct-1");

        setup(&sender, &receiver, &id);
        assert_eq!(sender.stage(&id).unwrap(), Stage::ExtensionReady);
        assert_eq!(receiver.stage(&id).unwrap(), Stage::ExtensionReady);

        let choices = ChoiceVector::alternating(128);
        let (keys, pairs) = batch(&sender, &receiver, &id, &choices);
        assert_correlated(&choices, &keys, &pairs);

        // second batch reuses the ready state, no new setup
        let choices = ChoiceVector::alternating(10);
        let (keys, pairs) = batch(&sender, &receiver, &id, &choices);
        assert_correlated(&choices, &keys, &pairs);

        assert!(store.path_for(Role::Sender, &id).is_file());
        assert!(store.path_for(Role::Receiver, &id).is_file());
    }

    #[test]
    fn test_each_stage_in_a_fresh_driver() {
        // every call gets new driver values, as separate processes would
        let store = temp_store();
        let id = party("bank-7");

        let m1 = SenderDriver::new(store.clone()).setup1(&id).unwrap();
        let m2 = ReceiverDriver::new(store.clone()).setup(&id, &m1).unwrap();
        SenderDriver::new(store.clone()).setup2(&id, &m2).unwrap();

        let choices = ChoiceVector::alternating(33);
        let (m3, keys) = ReceiverDriver::new(store.clone())
            .generate_keys(&id, &choices, 33)
            .unwrap();
        let pairs = SenderDriver::new(store).generate_keys(&id, &m3, 33).unwrap();

        assert_correlated(&choices, &keys, &pairs);
    }

    #[test]
    fn test_setup2_replaces_stage1_state() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store.clone());
        let id = party("acct-1");

        let m1 = sender.setup1(&id).unwrap();
        let before = store.load(Role::Sender, &id).unwrap();
        let m2 = receiver.setup(&id, &m1).unwrap();
        sender.setup2(&id, &m2).unwrap();

        let after = store.load(Role::Sender, &id).unwrap();
        assert_ne!(before, after);
        assert_eq!(
            StateEnvelope::from_bytes(&after, &id).unwrap().kind(),
            StateKind::ExtensionSender
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_second_stage_calls_need_first_stage() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store.clone());
        let id = party("acct-1");
        let junk = ProtocolMessage::new(vec![0u8; 64]);

        assert!(matches!(
            sender.setup2(&id, &junk),
            Err(Error::MissingState { .. })
        ));
        assert!(matches!(
            sender.generate_keys(&id, &junk, 4),
            Err(Error::MissingState { .. })
        ));
        assert!(matches!(
            receiver.generate_keys(&id, &ChoiceVector::alternating(4), 4),
            Err(Error::MissingState { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_repeated_setup2_keeps_ready_state() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store);
        let id = party("acct-1");

        let m1 = sender.setup1(&id).unwrap();
        let m2 = receiver.setup(&id, &m1).unwrap();
        sender.setup2(&id, &m2).unwrap();

        assert!(matches!(
            sender.setup2(&id, &m2),
            Err(Error::MissingState { .. })
        ));
        let choices = ChoiceVector::alternating(8);
        let (keys, pairs) = batch(&sender, &receiver, &id, &choices);
        assert_correlated(&choices, &keys, &pairs);
    }

    /// Counts every store access
    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    impl StateStore for CountingStore {
        fn save(&self, role: Role, party: &PartyId, bytes: &[u8]) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.save(role, party, bytes)
        }

        fn load(&self, role: Role, party: &PartyId) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.load(role, party)
        }

        fn delete(&self, role: Role, party: &PartyId) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(role, party)
        }

        fn exists(&self, role: Role, party: &PartyId) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.exists(role, party)
        }
    }

    #[test]
    fn test_size_mismatch_checked_first() {
        let store = CountingStore {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        };
        let receiver = ReceiverDriver::new(&store);
        let id = party("acct-1");

        let err = receiver
            .generate_keys(&id, &ChoiceVector::alternating(9), 10)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                expected: 10,
                actual: 9
            }
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_size_mismatch_on_ready_session() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store.clone());
        let id = party("acct-1");
        setup(&sender, &receiver, &id);
        let ready = store.load(Role::Receiver, &id).unwrap();

        assert!(matches!(
            receiver.generate_keys(&id, &ChoiceVector::alternating(5), 6),
            Err(Error::SizeMismatch { .. })
        ));
        assert_eq!(store.load(Role::Receiver, &id).unwrap(), ready);
    }

    #[test]
    fn test_sender_count_must_match_message() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store);
        let id = party("acct-1");
        setup(&sender, &receiver, &id);

        let choices = ChoiceVector::alternating(12);
        let (m3, keys) = receiver.generate_keys(&id, &choices, 12).unwrap();
        assert!(matches!(
            sender.generate_keys(&id, &m3, 13),
            Err(Error::SizeMismatch { .. })
        ));

        // a failed call does not advance the sender
        let pairs = sender.generate_keys(&id, &m3, 12).unwrap();
        assert_correlated(&choices, &keys, &pairs);
    }

    #[test]
    fn test_replayed_batch_message_rejected() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store);
        let id = party("acct-1");
        setup(&sender, &receiver, &id);

        let choices = ChoiceVector::alternating(20);
        let (m3, _) = receiver.generate_keys(&id, &choices, 20).unwrap();
        sender.generate_keys(&id, &m3, 20).unwrap();
        assert!(matches!(
            sender.generate_keys(&id, &m3, 20),
            Err(Error::ProtocolDecode(_))
        ));

        let (keys, pairs) = batch(&sender, &receiver, &id, &choices);
        assert_correlated(&choices, &keys, &pairs);
    }

    #[test]
    fn test_corrupt_state_rejected() {
        let store = temp_store();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store.clone());
        let id = party("acct-1");
        setup(&sender, &receiver, &id);

        let path = store.path_for(Role::Receiver, &id);
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            receiver.generate_keys(&id, &ChoiceVector::alternating(4), 4),
            Err(Error::CorruptState(_))
        ));
        assert!(matches!(receiver.stage(&id), Err(Error::CorruptState(_))));
    }

    #[test]
    fn test_state_files_not_interchangeable() {
        let store = temp_store();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store.clone());
        let a = party("acct-a");
        let b = party("acct-b");
        setup(&sender, &receiver, &a);
        setup(&sender, &receiver, &b);

        std::fs::copy(
            store.path_for(Role::Sender, &a),
            store.path_for(Role::Sender, &b),
        )
        .unwrap();
        assert!(matches!(sender.stage(&b), Err(Error::CorruptState(_))));
    }

    #[test]
    fn test_parties_isolated_across_threads() {
        init_tracing();
        let store = temp_store();
        let sender = SenderDriver::new(&store);
        let receiver = ReceiverDriver::new(&store);

        std::thread::scope(|scope| {
            for (id, n) in [("acct-1", 40), ("acct-2", 70)] {
                let sender = &sender;
                let receiver = &receiver;
                scope.spawn(move || {
                    let id = party(id);
                    setup(sender, receiver, &id);
                    for round in 0..3 {
                        let mut rng = ChaCha20Rng::seed_from_u64(round);
                        let choices = ChoiceVector::random(n, &mut rng);
                        let (keys, pairs) = batch(sender, receiver, &id, &choices);
                        assert_correlated(&choices, &keys, &pairs);
                    }
                });
            }
        });

        for id in ["acct-1", "acct-2"] {
            assert_eq!(sender.stage(&party(id)).unwrap(), Stage::ExtensionReady);
            assert_eq!(receiver.stage(&party(id)).unwrap(), Stage::ExtensionReady);
        }
    }

    #[test]
    fn test_session_keys_differ_between_parties() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store);
        let choices = ChoiceVector::alternating(16);

        let a = party("acct-1");
        let b = party("acct-2");
        setup(&sender, &receiver, &a);
        setup(&sender, &receiver, &b);
        let (keys_a, _) = batch(&sender, &receiver, &a, &choices);
        let (keys_b, _) = batch(&sender, &receiver, &b, &choices);

        for (ka, kb) in keys_a.iter().zip(&keys_b) {
            assert_ne!(ka, kb);
        }
    }

    #[test]
    fn test_restart_setup_after_loss() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store);
        let id = party("acct-1");

        sender.setup1(&id).unwrap();
        assert!(sender.setup2(&id, &ProtocolMessage::new(vec![7; 5])).is_err());
        assert_eq!(sender.stage(&id).unwrap(), Stage::Uninitialized);

        setup(&sender, &receiver, &id);
        let choices = ChoiceVector::alternating(9);
        let (keys, pairs) = batch(&sender, &receiver, &id, &choices);
        assert_correlated(&choices, &keys, &pairs);
    }

    #[test]
    fn test_compact_point_tags_rejected() {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store.clone());
        let id = party("acct-1");

        let mut m1 = sender.setup1(&id).unwrap().into_bytes();
        m1[0] = 0x05;
        assert!(matches!(
            receiver.setup(&id, &ProtocolMessage::new(m1)),
            Err(Error::ProtocolDecode(_))
        ));
        assert_eq!(receiver.stage(&id).unwrap(), Stage::Uninitialized);

        let m1 = sender.setup1(&id).unwrap();
        let mut m2 = receiver.setup(&id, &m1).unwrap().into_bytes();
        m2[0] = 0x05;
        assert!(matches!(
            sender.setup2(&id, &ProtocolMessage::new(m2)),
            Err(Error::ProtocolDecode(_))
        ));
        assert_eq!(sender.stage(&id).unwrap(), Stage::Uninitialized);
    }

    #[rstest]
    #[case::truncated(false)]
    #[case::compact_tag(true)]
    fn test_failed_setup_keeps_ready_receiver(#[case] tag_only: bool) {
        let store = MemoryStore::new();
        let sender = SenderDriver::new(store.clone());
        let receiver = ReceiverDriver::new(store.clone());
        let id = party("acct-1");
        setup(&sender, &receiver, &id);
        let ready = store.load(Role::Receiver, &id).unwrap();

        let mut bad = sender.setup1(&id).unwrap().into_bytes();
        if tag_only {
            bad[0] = 0x05;
        } else {
            bad.truncate(bad.len() - 1);
        }
        assert!(matches!(
            receiver.setup(&id, &ProtocolMessage::new(bad)),
            Err(Error::ProtocolDecode(_))
        ));
        assert_eq!(store.load(Role::Receiver, &id).unwrap(), ready);
        assert_eq!(receiver.stage(&id).unwrap(), Stage::ExtensionReady);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::ExtensionReady.to_string(), "extension ready");
    }
}
