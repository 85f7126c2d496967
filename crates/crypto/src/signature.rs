use std::{fmt, ops::Neg};

use bls12_381_plus::{G1Affine, G1Projective, G2Affine, G2Prepared, Gt, multi_miller_loop};
use elliptic_curve::hash2curve::ExpandMsgXmd;
use group::{Curve, Group};
use sha2::Sha256;

use crate::{errors::CryptoError, keys::PublicKey};

/// Domain separation tags. Message signatures and proofs of possession hash
/// into disjoint domains so a proof can never be replayed as a signature.
pub mod dst {
    pub const MESSAGE: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_POP_";
    pub const PROOF_OF_POSSESSION: &[u8] = b"BLS_POP_BLS12381G1_XMD:SHA-256_SSWU_RO_POP_";
}

pub(crate) fn hash_to_point(message: &[u8], dst: &[u8]) -> G1Projective {
    G1Projective::hash::<ExpandMsgXmd<Sha256>>(message, dst)
}

/// Checks `e(signature, g2) == e(H(message), public_key)`.
pub(crate) fn pairing_check(
    message: &[u8],
    dst: &[u8],
    signature: &G1Affine,
    public_key: &G2Affine,
) -> bool {
    let hashed = hash_to_point(message, dst).to_affine();
    let g2_neg = G2Prepared::from(G2Affine::generator().neg());
    let pk_prepared = G2Prepared::from(*public_key);

    multi_miller_loop(&[(signature, &g2_neg), (&hashed, &pk_prepared)]).final_exponentiation()
        == Gt::identity()
}

/// A G1 signature, either a single signer's or a group sum of several.
#[derive(Clone, Copy)]
pub struct Signature(pub(crate) G1Affine);

impl Signature {
    pub const BYTES: usize = 48;

    pub(crate) fn from_point(point: G1Projective) -> Self {
        Self(point.to_affine())
    }

    /// The empty aggregate. Never a valid proof for any signer set.
    #[must_use]
    pub fn identity() -> Self {
        Self(G1Affine::identity())
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        bool::from(self.0.is_identity())
    }

    /// Group addition of `self` and `other`.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        Self::from_point(G1Projective::from(self.0) + G1Projective::from(other.0))
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        self.0.to_compressed()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let compressed: [u8; Self::BYTES] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        let point = Option::<G1Affine>::from(G1Affine::from_compressed(&compressed))
            .ok_or(CryptoError::InvalidSignature)?;
        if bool::from(point.is_identity()) {
            return Err(CryptoError::InvalidSignature);
        }
        Ok(Self(point))
    }

    /// Single-signer verification under the message domain.
    #[must_use]
    pub fn verify(&self, message: &[u8], public_key: &PublicKey) -> bool {
        !self.is_identity() && pairing_check(message, dst::MESSAGE, &self.0, &public_key.0)
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = hex::encode(self.to_bytes());
        write!(f, "Signature({}..)", &encoded[..12])
    }
}

crate::impl_serde_bytes!(Signature);

/// A self-signature over the signer's compressed public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProofOfPossession(pub(crate) Signature);

impl ProofOfPossession {
    pub const BYTES: usize = Signature::BYTES;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Signature::from_bytes(bytes).map(Self)
    }
}

impl fmt::Debug for ProofOfPossession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = hex::encode(self.to_bytes());
        write!(f, "ProofOfPossession({}..)", &encoded[..12])
    }
}

crate::impl_serde_bytes!(ProofOfPossession);

/// Group sum of `signatures`. Associative and commutative, so contributions
/// may be folded in any order at any hop. The empty sum is the identity.
pub fn aggregate<'a, I>(signatures: I) -> Signature
where
    I: IntoIterator<Item = &'a Signature>,
{
    let sum = signatures
        .into_iter()
        .fold(G1Projective::identity(), |acc, signature| {
            acc + G1Projective::from(signature.0)
        });
    Signature::from_point(sum)
}

/// Same-message aggregate verification against the group sum of
/// `public_keys`. Every key must already have passed its proof of possession.
#[must_use]
pub fn verify_aggregate(message: &[u8], signature: &Signature, public_keys: &[PublicKey]) -> bool {
    if signature.is_identity() {
        return false;
    }
    let Some(aggregate_key) = PublicKey::aggregate(public_keys) else {
        return false;
    };
    pairing_check(message, dst::MESSAGE, &signature.0, &aggregate_key.0)
}
