use std::collections::BTreeSet;

use crypto::{KeyRegistry, Signature};
use serde::{Deserialize, Serialize};

use crate::{errors::NodeError, ids::NodeId};

/// A single node's signature or the already-folded result of its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialContribution {
    pub node_id: NodeId,
    pub signature: Signature,
    pub covered_signer_ids: BTreeSet<NodeId>,
}

impl PartialContribution {
    #[must_use]
    pub fn leaf(node_id: NodeId, signature: Signature) -> Self {
        Self {
            node_id,
            signature,
            covered_signer_ids: BTreeSet::from([node_id]),
        }
    }

    #[must_use]
    pub fn coverage(&self) -> usize {
        self.covered_signer_ids.len()
    }
}

/// The final multi-signature. `signer_ids` names exactly the nodes whose
/// signatures were summed into `signature`, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSignature {
    signature: Signature,
    signer_ids: BTreeSet<NodeId>,
}

impl AggregateSignature {
    #[must_use]
    pub const fn new(signature: Signature, signer_ids: BTreeSet<NodeId>) -> Self {
        Self {
            signature,
            signer_ids,
        }
    }

    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub const fn signer_ids(&self) -> &BTreeSet<NodeId> {
        &self.signer_ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signer_ids.len()
    }

    /// True for the identity signature or an empty signer set: "no
    /// contribution", never a valid zero-signer proof.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signer_ids.is_empty() || self.signature.is_identity()
    }

    #[must_use]
    pub fn verify(&self, message: &[u8], registry: &KeyRegistry<NodeId>) -> bool {
        !self.is_empty() && registry.verify_aggregate(message, &self.signature, &self.signer_ids)
    }

    /// `(signature bytes, ascending signer ids)` for anchoring.
    pub fn encode(&self) -> Result<Vec<u8>, NodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| NodeError::Error(format!("Failed to encode aggregate: {e}")))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NodeError> {
        let (aggregate, _) =
            bincode::serde::decode_from_slice::<Self, _>(bytes, bincode::config::standard())
                .map_err(|e| NodeError::Error(format!("Failed to decode aggregate: {e}")))?;
        Ok(aggregate)
    }
}

impl From<PartialContribution> for AggregateSignature {
    fn from(contribution: PartialContribution) -> Self {
        Self::new(contribution.signature, contribution.covered_signer_ids)
    }
}
