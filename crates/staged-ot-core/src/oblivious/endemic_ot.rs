//! Endemic OT implementation
//!
//! Base oblivious transfer protocol from https://eprint.iacr.org/2019/706.pdf,
//! instantiated over secp256k1 with hash-to-curve. The receiver speaks
//! first, which lets the overall sender open the handshake.

use crate::oblivious::{BaseOtReceiver, BaseOtSender, Snapshot};
use crate::store::StateKind;
use crate::{Error, OtKey, OtKeyPair, Result, KEY_LEN};
use k256::{
    elliptic_curve::{
        bigint::U256,
        hash2curve::{ExpandMsgXmd, GroupDigest},
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Field, Group,
    },
    AffinePoint, EncodedPoint, ProjectivePoint, Scalar, Secp256k1,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a compressed SEC1 point
pub const POINT_LEN: usize = 33;

const HASH_DST: &[u8] = b"staged-ot:endemic:h2c:secp256k1_XMD:SHA-256_SSWU_RO_";
const KDF_DOMAIN: &[u8] = b"staged-ot:endemic:kdf";

/// Endemic OT receiver between its two rounds
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct EndemicReceiver {
    choices: Vec<bool>,
    /// One secret scalar per instance
    secrets: Vec<[u8; 32]>,
}

/// Endemic OT sender between its two rounds
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct EndemicSender {
    count: usize,
    secret: [u8; 32],
    /// Compressed `a·G`, bound into every derived key
    public: Vec<u8>,
}

impl Snapshot for EndemicReceiver {
    const KIND: StateKind = StateKind::BaseOtReceiver;
}

impl Snapshot for EndemicSender {
    const KIND: StateKind = StateKind::BaseOtSender;
}

impl BaseOtReceiver for EndemicReceiver {
    fn round_one<R: RngCore + CryptoRng>(
        choices: Vec<bool>,
        rng: &mut R,
    ) -> Result<(Self, Vec<u8>)> {
        let mut message = Vec::with_capacity(choices.len() * 2 * POINT_LEN);
        let mut secrets = Vec::with_capacity(choices.len());

        for (i, choice) in choices.iter().enumerate() {
            let secret = Scalar::random(&mut *rng);
            let target = ProjectivePoint::GENERATOR * secret;

            // r_{1-c} is uniform, r_c is fixed so that r_c + H(r_{1-c}) = b·G
            let other = encode_point(&ProjectivePoint::random(&mut *rng))?;
            let chosen = encode_point(&(target - hash_point(i as u32, &other)?))?;

            if *choice {
                message.extend_from_slice(&other);
                message.extend_from_slice(&chosen);
            } else {
                message.extend_from_slice(&chosen);
                message.extend_from_slice(&other);
            }
            secrets.push(scalar_bytes(&secret));
        }

        Ok((Self { choices, secrets }, message))
    }

    fn round_two(self, message: &[u8]) -> Result<Vec<OtKey>> {
        if message.len() != POINT_LEN {
            return Err(Error::ProtocolDecode(format!(
                "base OT sender message must be {} bytes, got {}",
                POINT_LEN,
                message.len()
            )));
        }
        let sender_public = decode_point(message)?;

        let keys = self
            .secrets
            .iter()
            .enumerate()
            .map(|(i, secret)| {
                let shared = sender_public * scalar_from_bytes(secret);
                derive_key(i as u32, message, &shared)
            })
            .collect();

        Ok(keys)
    }

    fn choices(&self) -> &[bool] {
        &self.choices
    }
}

impl BaseOtSender for EndemicSender {
    fn round_one<R: RngCore + CryptoRng>(count: usize, rng: &mut R) -> Result<(Self, Vec<u8>)> {
        let secret = Scalar::random(&mut *rng);
        let public = encode_point(&(ProjectivePoint::GENERATOR * secret))?.to_vec();

        let sender = Self {
            count,
            secret: scalar_bytes(&secret),
            public: public.clone(),
        };
        Ok((sender, public))
    }

    fn round_two(self, message: &[u8]) -> Result<Vec<OtKeyPair>> {
        let expected = self.count * 2 * POINT_LEN;
        if message.len() != expected {
            return Err(Error::ProtocolDecode(format!(
                "base OT receiver message must be {} bytes, got {}",
                expected,
                message.len()
            )));
        }

        let secret = scalar_from_bytes(&self.secret);
        let mut pairs = Vec::with_capacity(self.count);

        for (i, chunk) in message.chunks_exact(2 * POINT_LEN).enumerate() {
            let index = i as u32;
            let (r0, r1) = chunk.split_at(POINT_LEN);

            let b0 = decode_point(r0)? + hash_point(index, r1)?;
            let b1 = decode_point(r1)? + hash_point(index, r0)?;

            pairs.push(OtKeyPair::new(
                derive_key(index, &self.public, &(b0 * secret)),
                derive_key(index, &self.public, &(b1 * secret)),
            ));
        }

        Ok(pairs)
    }
}

fn scalar_bytes(scalar: &Scalar) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&scalar.to_bytes());
    out
}

fn scalar_from_bytes(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&(*bytes).into())
}

fn encode_point(point: &ProjectivePoint) -> Result<[u8; POINT_LEN]> {
    let encoded = point.to_affine().to_encoded_point(true);
    if encoded.len() != POINT_LEN {
        return Err(Error::Crypto("cannot encode the identity point".into()));
    }
    let mut out = [0u8; POINT_LEN];
    out.copy_from_slice(encoded.as_bytes());
    Ok(out)
}

fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    let encoded =
        EncodedPoint::from_bytes(bytes).map_err(|e| Error::ProtocolDecode(e.to_string()))?;
    // only compressed points are ever sent
    if !encoded.is_compressed() {
        return Err(Error::ProtocolDecode(format!(
            "expected a compressed point, got {:?} tag",
            encoded.tag()
        )));
    }
    let affine_opt = AffinePoint::from_encoded_point(&encoded);
    let affine: AffinePoint = Option::<AffinePoint>::from(affine_opt)
        .ok_or_else(|| Error::ProtocolDecode("Invalid curve point".into()))?;
    Ok(ProjectivePoint::from(affine))
}

/// Instance-tweaked hash onto the curve
fn hash_point(index: u32, point: &[u8]) -> Result<ProjectivePoint> {
    let tweak = index.to_le_bytes();
    Secp256k1::hash_from_bytes::<ExpandMsgXmd<Sha256>>(&[&tweak[..], point], &[HASH_DST])
        .map_err(|e| Error::Crypto(e.to_string()))
}

fn derive_key(index: u32, sender_public: &[u8], shared: &ProjectivePoint) -> OtKey {
    let shared = shared.to_affine().to_encoded_point(true);

    let mut hasher = Sha256::new();
    hasher.update(KDF_DOMAIN);
    hasher.update(index.to_le_bytes());
    hasher.update(sender_public);
    hasher.update(shared.as_bytes());

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&hasher.finalize());
    OtKey::from_bytes(key)
}
