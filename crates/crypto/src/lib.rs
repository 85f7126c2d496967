//! BLS12-381 primitives for same-message multi-signatures.
//!
//! Public keys live in G2, signatures in G1. Every key must prove possession
//! of its secret before it is trusted in an aggregate; [`KeyRegistry`]
//! enforces that.

pub mod errors;
pub mod keys;
pub mod registry;
pub mod signature;

pub use errors::CryptoError;
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use registry::KeyRegistry;
pub use signature::{ProofOfPossession, Signature, aggregate, verify_aggregate};

/// Hex strings for human-readable formats, raw compressed bytes otherwise.
#[macro_export]
macro_rules! impl_serde_bytes {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let bytes = self.to_bytes();
                if serializer.is_human_readable() {
                    serializer.serialize_str(&hex::encode(bytes))
                } else {
                    serializer.serialize_bytes(&bytes)
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct BytesVisitor;

                impl<'de> serde::de::Visitor<'de> for BytesVisitor {
                    type Value = $ty;

                    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        write!(f, "a compressed {} encoding", stringify!($ty))
                    }

                    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
                        let bytes = hex::decode(value).map_err(E::custom)?;
                        <$ty>::from_bytes(&bytes).map_err(E::custom)
                    }

                    fn visit_bytes<E: serde::de::Error>(self, value: &[u8]) -> Result<Self::Value, E> {
                        <$ty>::from_bytes(value).map_err(E::custom)
                    }

                    fn visit_seq<A: serde::de::SeqAccess<'de>>(
                        self,
                        mut seq: A,
                    ) -> Result<Self::Value, A::Error> {
                        let mut bytes = Vec::new();
                        while let Some(byte) = seq.next_element::<u8>()? {
                            bytes.push(byte);
                        }
                        <$ty>::from_bytes(&bytes).map_err(serde::de::Error::custom)
                    }
                }

                if deserializer.is_human_readable() {
                    deserializer.deserialize_str(BytesVisitor)
                } else {
                    deserializer.deserialize_bytes(BytesVisitor)
                }
            }
        }
    };
}
