use std::error::Error;

use derive_more::Display;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[display("Entropy source failed: {_0}")]
    EntropyFailure(String),

    #[display("Secret key reduced to zero")]
    ZeroSecretKey,

    #[display("Invalid or malformed public key")]
    InvalidPublicKey,

    #[display("Invalid or malformed signature")]
    InvalidSignature,

    #[display("Proof of possession rejected for {_0}")]
    InvalidProofOfPossession(String),

    #[display("Public key already registered under {_0}")]
    DuplicatePublicKey(String),
}

impl Error for CryptoError {}
