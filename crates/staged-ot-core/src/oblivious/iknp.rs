//! IKNP OT extension
//!
//! Semi-honest OT extension from https://www.iacr.org/archive/crypto2003/27290145/27290145.pdf.
//! The extension sender plays base OT receiver with a random choice
//! string `s`; the extension receiver plays base OT sender. Each batch
//! expands the base keys with ChaCha20 (stream id = batch number) and
//! breaks the correlation with BLAKE3.
//!
//! Batch message layout: `batch: u64 LE || count: u32 LE || u_0 || ... || u_127`,
//! with every column `u_i` packed to `ceil(count / 8)` bytes.

use crate::oblivious::bits::{pack, packed_len, transpose, xor_inplace};
use crate::oblivious::{ExtensionReceiver, ExtensionSender, Snapshot, BASE_OT_COUNT};
use crate::store::StateKind;
use crate::{ChoiceVector, Error, OtKey, OtKeyPair, Result};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bytes preceding the columns in a batch message
pub const HEADER_LEN: usize = 12;

const HASH_CONTEXT: &str = "staged-ot 2024 iknp row hash";

/// Extension sender, ready to serve batches
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IknpSender {
    /// Base OT choice string `s`
    choices: Vec<bool>,
    /// Base keys `k_{s_i}`
    seeds: Vec<[u8; 32]>,
    batch: u64,
}

/// Extension receiver, ready to request batches
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IknpReceiver {
    seeds0: Vec<[u8; 32]>,
    seeds1: Vec<[u8; 32]>,
    batch: u64,
}

impl Snapshot for IknpSender {
    const KIND: StateKind = StateKind::ExtensionSender;
}

impl Snapshot for IknpReceiver {
    const KIND: StateKind = StateKind::ExtensionReceiver;
}

impl IknpSender {
    /// Number of batches served so far
    pub fn batch(&self) -> u64 {
        self.batch
    }
}

impl IknpReceiver {
    /// Number of batches requested so far
    pub fn batch(&self) -> u64 {
        self.batch
    }
}

impl ExtensionSender for IknpSender {
    fn from_base(keys: Vec<OtKey>, choices: Vec<bool>) -> Result<Self> {
        check_base_width(keys.len())?;
        check_base_width(choices.len())?;

        Ok(Self {
            choices,
            seeds: keys.iter().map(|k| *k.as_bytes()).collect(),
            batch: 0,
        })
    }

    fn send(&mut self, message: &[u8], count: usize) -> Result<Vec<OtKeyPair>> {
        if count == 0 {
            return Err(Error::InvalidInstanceCount(count));
        }
        let (batch, announced, body) = split_message(message)?;

        if batch != self.batch {
            return Err(Error::ProtocolDecode(format!(
                "expected batch {}, message is for batch {}",
                self.batch, batch
            )));
        }
        if announced != count {
            return Err(Error::SizeMismatch {
                expected: count,
                actual: announced,
            });
        }

        let width = packed_len(count);
        if body.len() != BASE_OT_COUNT * width {
            return Err(Error::ProtocolDecode(format!(
                "batch body must be {} bytes, got {}",
                BASE_OT_COUNT * width,
                body.len()
            )));
        }

        // q_i = G(k_{s_i}) ^ s_i * u_i = t_i ^ s_i * r
        let columns: Vec<Vec<u8>> = self
            .seeds
            .iter()
            .zip(&self.choices)
            .zip(body.chunks_exact(width))
            .map(|((seed, choice), u)| {
                let mut q = expand(seed, batch, width);
                if *choice {
                    xor_inplace(&mut q, u);
                }
                q
            })
            .collect();

        let delta = pack(&self.choices);
        let pairs = transpose(&columns, count)
            .into_iter()
            .enumerate()
            .map(|(j, mut row)| {
                let zero = hash_row(batch, j, &row);
                xor_inplace(&mut row, &delta);
                OtKeyPair::new(zero, hash_row(batch, j, &row))
            })
            .collect();

        self.batch += 1;
        Ok(pairs)
    }
}

impl ExtensionReceiver for IknpReceiver {
    fn from_base(pairs: Vec<OtKeyPair>) -> Result<Self> {
        check_base_width(pairs.len())?;

        Ok(Self {
            seeds0: pairs.iter().map(|p| *p.zero.as_bytes()).collect(),
            seeds1: pairs.iter().map(|p| *p.one.as_bytes()).collect(),
            batch: 0,
        })
    }

    fn receive(&mut self, choices: &ChoiceVector) -> Result<(Vec<u8>, Vec<OtKey>)> {
        let count = choices.len();
        let announced =
            u32::try_from(count).map_err(|_| Error::InvalidInstanceCount(count))?;
        if count == 0 {
            return Err(Error::InvalidInstanceCount(count));
        }

        let width = packed_len(count);
        let r = choices.to_packed();
        let batch = self.batch;

        let mut message = Vec::with_capacity(HEADER_LEN + BASE_OT_COUNT * width);
        message.extend_from_slice(&batch.to_le_bytes());
        message.extend_from_slice(&announced.to_le_bytes());

        // u_i = G(k0_i) ^ G(k1_i) ^ r
        let mut columns = Vec::with_capacity(BASE_OT_COUNT);
        for (seed0, seed1) in self.seeds0.iter().zip(&self.seeds1) {
            let t = expand(seed0, batch, width);
            let mut u = expand(seed1, batch, width);
            xor_inplace(&mut u, &t);
            xor_inplace(&mut u, &r);
            message.extend_from_slice(&u);
            columns.push(t);
        }

        let keys = transpose(&columns, count)
            .iter()
            .enumerate()
            .map(|(j, row)| hash_row(batch, j, row))
            .collect();

        self.batch += 1;
        Ok((message, keys))
    }
}

fn check_base_width(actual: usize) -> Result<()> {
    if actual != BASE_OT_COUNT {
        return Err(Error::SizeMismatch {
            expected: BASE_OT_COUNT,
            actual,
        });
    }
    Ok(())
}

fn split_message(message: &[u8]) -> Result<(u64, usize, &[u8])> {
    if message.len() < HEADER_LEN {
        return Err(Error::ProtocolDecode(format!(
            "batch message shorter than its {}-byte header",
            HEADER_LEN
        )));
    }
    let (header, body) = message.split_at(HEADER_LEN);

    let mut batch = [0u8; 8];
    batch.copy_from_slice(&header[..8]);
    let mut count = [0u8; 4];
    count.copy_from_slice(&header[8..]);

    Ok((
        u64::from_le_bytes(batch),
        u32::from_le_bytes(count) as usize,
        body,
    ))
}

fn expand(seed: &[u8; 32], batch: u64, len: usize) -> Vec<u8> {
    let mut prg = ChaCha20Rng::from_seed(*seed);
    prg.set_stream(batch);
    let mut out = vec![0u8; len];
    prg.fill_bytes(&mut out);
    out
}

fn hash_row(batch: u64, index: usize, row: &[u8]) -> OtKey {
    let mut hasher = blake3::Hasher::new_derive_key(HASH_CONTEXT);
    hasher.update(&batch.to_le_bytes());
    hasher.update(&(index as u64).to_le_bytes());
    hasher.update(row);
    OtKey::from_bytes(*hasher.finalize().as_bytes())
}
