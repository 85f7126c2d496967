use std::fmt;

use bls12_381_plus::{G2Affine, G2Projective, Scalar};
use ff::Field;
use group::{Curve, Group};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::{
    errors::CryptoError,
    signature::{ProofOfPossession, Signature, dst, hash_to_point, pairing_check},
};

const SEED_DST: &[u8] = b"COLLABFED_KEYGEN_SEED_V1";

/// A scalar in `[1, r-1]`. Not `Clone`, not serialisable, redacted in `Debug`.
pub struct SecretKey(Scalar);

impl SecretKey {
    fn from_wide(bytes: &[u8; 64]) -> Result<Self, CryptoError> {
        let scalar = Scalar::from_bytes_wide(bytes);
        if bool::from(scalar.is_zero()) {
            return Err(CryptoError::ZeroSecretKey);
        }
        Ok(Self(scalar))
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey((G2Projective::generator() * self.0).to_affine())
    }

    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.sign_in_domain(message, dst::MESSAGE)
    }

    fn sign_in_domain(&self, message: &[u8], dst: &[u8]) -> Signature {
        Signature::from_point(hash_to_point(message, dst) * self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A G2 public key, `secret · g2`.
#[derive(Clone, Copy)]
pub struct PublicKey(pub(crate) G2Affine);

impl PublicKey {
    pub const BYTES: usize = 96;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        self.0.to_compressed()
    }

    /// Rejects malformed encodings, points outside the prime-order subgroup
    /// and the identity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let compressed: [u8; Self::BYTES] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let point = Option::<G2Affine>::from(G2Affine::from_compressed(&compressed))
            .ok_or(CryptoError::InvalidPublicKey)?;
        if bool::from(point.is_identity()) {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(Self(point))
    }

    #[must_use]
    pub fn verify_proof_of_possession(&self, proof: &ProofOfPossession) -> bool {
        !proof.0.is_identity()
            && pairing_check(
                &self.to_bytes(),
                dst::PROOF_OF_POSSESSION,
                &proof.0.0,
                &self.0,
            )
    }

    /// Group sum of `keys`; `None` for an empty slice or an identity sum.
    #[must_use]
    pub fn aggregate(keys: &[Self]) -> Option<Self> {
        if keys.is_empty() {
            return None;
        }
        let sum = keys
            .iter()
            .fold(G2Projective::identity(), |acc, key| {
                acc + G2Projective::from(key.0)
            });
        if bool::from(sum.is_identity()) {
            return None;
        }
        Some(Self(sum.to_affine()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = hex::encode(self.to_bytes());
        write!(f, "PublicKey({}..)", &encoded[..12])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

crate::impl_serde_bytes!(PublicKey);

pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Samples a secret from the OS entropy source and proves possession of it.
    pub fn generate() -> Result<(Self, ProofOfPossession), CryptoError> {
        Self::generate_with(&mut OsRng)
    }

    pub fn generate_with<R: TryRngCore + ?Sized>(
        rng: &mut R,
    ) -> Result<(Self, ProofOfPossession), CryptoError> {
        let mut wide = [0u8; 64];
        loop {
            rng.try_fill_bytes(&mut wide)
                .map_err(|e| CryptoError::EntropyFailure(e.to_string()))?;
            match SecretKey::from_wide(&wide) {
                Ok(secret) => {
                    wide.fill(0);
                    return Ok(Self::from_secret(secret));
                }
                Err(CryptoError::ZeroSecretKey) => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Deterministic derivation for reproducible simulations. Equal seeds give
    /// equal keys; never use a guessable seed outside a simulation.
    pub fn from_seed(seed: &[u8]) -> Result<(Self, ProofOfPossession), CryptoError> {
        let mut wide = [0u8; 64];
        let first = Sha256::new()
            .chain_update(SEED_DST)
            .chain_update((seed.len() as u64).to_le_bytes())
            .chain_update(seed)
            .finalize();
        let second = Sha256::new()
            .chain_update(SEED_DST)
            .chain_update(first)
            .finalize();
        wide[..32].copy_from_slice(&first);
        wide[32..].copy_from_slice(&second);

        let secret = SecretKey::from_wide(&wide)?;
        wide.fill(0);
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> (Self, ProofOfPossession) {
        let public = secret.public_key();
        let proof = ProofOfPossession(
            secret.sign_in_domain(&public.to_bytes(), dst::PROOF_OF_POSSESSION),
        );
        (Self { secret, public }, proof)
    }

    #[must_use]
    pub const fn public_key(&self) -> PublicKey {
        self.public
    }

    #[must_use]
    pub const fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.secret.sign(message)
    }

    #[must_use]
    pub fn prove_possession(&self) -> ProofOfPossession {
        ProofOfPossession(
            self.secret
                .sign_in_domain(&self.public.to_bytes(), dst::PROOF_OF_POSSESSION),
        )
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("secret", &self.secret)
            .field("public", &self.public)
            .finish()
    }
}
