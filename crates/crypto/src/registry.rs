use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::{
    errors::CryptoError,
    keys::PublicKey,
    signature::{ProofOfPossession, Signature, verify_aggregate},
};

/// Public keys that passed proof-of-possession, indexed by signer id.
///
/// A key is trusted only after [`KeyRegistry::register`] verified its proof.
/// An id whose proof failed stays excluded until it registers again with a
/// valid one.
#[derive(Clone, Debug)]
pub struct KeyRegistry<Id: Ord> {
    trusted: BTreeMap<Id, PublicKey>,
    excluded: BTreeSet<Id>,
}

impl<Id: Ord> Default for KeyRegistry<Id> {
    fn default() -> Self {
        Self {
            trusted: BTreeMap::new(),
            excluded: BTreeSet::new(),
        }
    }
}

impl<Id: Ord + Clone + fmt::Display> KeyRegistry<Id> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: Id,
        public_key: PublicKey,
        proof: &ProofOfPossession,
    ) -> Result<(), CryptoError> {
        if !public_key.verify_proof_of_possession(proof) {
            self.trusted.remove(&id);
            let reason = id.to_string();
            self.excluded.insert(id);
            return Err(CryptoError::InvalidProofOfPossession(reason));
        }

        // The same key under two ids would let one signature count twice.
        if let Some((owner, _)) = self
            .trusted
            .iter()
            .find(|(owner, key)| **key == public_key && **owner != id)
        {
            return Err(CryptoError::DuplicatePublicKey(owner.to_string()));
        }

        self.excluded.remove(&id);
        self.trusted.insert(id, public_key);
        Ok(())
    }

    pub fn deregister(&mut self, id: &Id) -> Option<PublicKey> {
        self.trusted.remove(id)
    }

    #[must_use]
    pub fn is_trusted(&self, id: &Id) -> bool {
        self.trusted.contains_key(id)
    }

    #[must_use]
    pub fn is_excluded(&self, id: &Id) -> bool {
        self.excluded.contains(id)
    }

    #[must_use]
    pub fn public_key(&self, id: &Id) -> Option<&PublicKey> {
        self.trusted.get(id)
    }

    pub fn trusted_ids(&self) -> impl Iterator<Item = &Id> {
        self.trusted.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trusted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trusted.is_empty()
    }

    /// Sum of the trusted keys of `ids`. `None` if the set is empty, contains
    /// a duplicate, or names an id without a trusted key.
    pub fn aggregate_public_key<'a, I>(&self, ids: I) -> Option<PublicKey>
    where
        I: IntoIterator<Item = &'a Id>,
        Id: 'a,
    {
        let keys = self.collect_keys(ids)?;
        PublicKey::aggregate(&keys)
    }

    /// True iff `signature` is the same-message aggregate of exactly the
    /// trusted signers named by `signer_ids`.
    pub fn verify_aggregate<'a, I>(&self, message: &[u8], signature: &Signature, signer_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a Id>,
        Id: 'a,
    {
        self.collect_keys(signer_ids)
            .is_some_and(|keys| verify_aggregate(message, signature, &keys))
    }

    fn collect_keys<'a, I>(&self, ids: I) -> Option<Vec<PublicKey>>
    where
        I: IntoIterator<Item = &'a Id>,
        Id: 'a,
    {
        let mut seen = BTreeSet::new();
        let mut keys = Vec::new();
        for id in ids {
            if !seen.insert(id) {
                return None;
            }
            keys.push(*self.trusted.get(id)?);
        }
        if keys.is_empty() {
            return None;
        }
        Some(keys)
    }
}
