use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use crypto::Signature;
use node::SimulatedNetwork;
use types::{
    NodeId,
    errors::NetworkError,
    network::Network,
    network_event::DirectMessage,
};

/// How a compromised node rewrites the contributions it sends upward.
#[derive(Debug, Clone)]
pub enum Tamper {
    /// Keeps the claimed coverage but swaps the signature.
    ReplaceSignature(Signature),
    /// Adds a signer the node never collected.
    ClaimSigner(NodeId),
    /// Never sends the contribution.
    Drop,
}

/// [`SimulatedNetwork`] with per-sender tampering and a per-kind message
/// counter. Clones share rules and counters.
#[derive(Debug, Clone)]
pub struct TamperingNetwork {
    inner: SimulatedNetwork,
    rules: Arc<Mutex<HashMap<NodeId, Tamper>>>,
    sent: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl TamperingNetwork {
    pub fn new(inner: SimulatedNetwork) -> Self {
        Self {
            inner,
            rules: Arc::new(Mutex::new(HashMap::new())),
            sent: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn tamper(&self, node_id: NodeId, tamper: Tamper) {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_id, tamper);
    }

    /// Messages of `kind` handed to the network so far, tampered or not.
    pub fn sent(&self, kind: &str) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .copied()
            .unwrap_or(0)
    }
}

impl Network for TamperingNetwork {
    fn send_direct_message(
        &self,
        from: NodeId,
        to: NodeId,
        mut message: DirectMessage,
    ) -> Result<(), NetworkError> {
        *self
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(message.kind())
            .or_default() += 1;

        let rule = self
            .rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&from)
            .cloned();
        if let (Some(rule), DirectMessage::Contribution { contribution, .. }) = (rule, &mut message)
        {
            match rule {
                Tamper::ReplaceSignature(signature) => contribution.signature = signature,
                Tamper::ClaimSigner(node_id) => {
                    contribution.covered_signer_ids.insert(node_id);
                }
                Tamper::Drop => return Ok(()),
            }
        }

        self.inner.send_direct_message(from, to, message)
    }
}
