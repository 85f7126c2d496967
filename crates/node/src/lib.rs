use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard},
};

use crypto::{KeyPair, KeyRegistry, ProofOfPossession, PublicKey, Signature};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use topology::Topology;
use types::{NodeId, PartialContribution, RequestId, network::Network};

pub mod anchor;
pub mod collection;
pub mod config;
pub mod federation;
pub mod logging;
pub mod main_loop;
pub mod network;
pub mod session;
pub mod signature_cache;

#[cfg(test)]
mod tests;

pub use anchor::{Endorsement, EndorsementLedger, ResultAnchor};
pub use collection::PendingCollection;
pub use config::FederationConfig;
pub use federation::Federation;
pub use network::SimulatedNetwork;
pub use session::{CollectionSession, SessionConfig, SessionHandle};
pub use signature_cache::SignatureCache;

pub type SharedRegistry = Arc<RwLock<KeyRegistry<NodeId>>>;

pub(crate) struct InFlight {
    pub(crate) contributions: UnboundedSender<(NodeId, PartialContribution)>,
    pub(crate) cancel: CancellationToken,
}

/// One federation member. Cheap to clone; clones share the same state, so
/// the main loop and the sessions driving this node see the same in-flight
/// requests.
#[derive(Clone)]
pub struct FederationNode<N: Network> {
    pub node_id: NodeId,
    keypair: Arc<KeyPair>,
    proof: ProofOfPossession,
    pub topology: Arc<Topology>,
    registry: SharedRegistry,
    pub network_handle: N,
    pub(crate) in_flight: Arc<Mutex<HashMap<RequestId, InFlight>>>,
    /// Cancels that overtook their request on the way from the parent.
    pub(crate) early_cancels: Arc<Mutex<VecDeque<RequestId>>>,
    signatures: Arc<Mutex<SignatureCache>>,
    pub(crate) shutdown: CancellationToken,
}

impl<N: Network> FederationNode<N> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: NodeId,
        keypair: KeyPair,
        proof: ProofOfPossession,
        topology: Arc<Topology>,
        registry: SharedRegistry,
        network_handle: N,
        signature_cache_capacity: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            node_id,
            keypair: Arc::new(keypair),
            proof,
            topology,
            registry,
            network_handle,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            early_cancels: Arc::new(Mutex::new(VecDeque::new())),
            signatures: Arc::new(Mutex::new(SignatureCache::new(signature_cache_capacity))),
            shutdown,
        }
    }

    /// The key peers must verify against `proof_of_possession` before
    /// trusting it.
    #[must_use]
    pub fn current_public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    #[must_use]
    pub const fn proof_of_possession(&self) -> &ProofOfPossession {
        &self.proof
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, KeyRegistry<NodeId>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signs `message` for `request_id` at most once. A repeated request id
    /// gets the first signature back, whatever message it carries.
    pub fn sign_once(&self, request_id: RequestId, message: &[u8]) -> Signature {
        if let Some(signature) = self.cached_signature(&request_id) {
            tracing::debug!("{} reusing signature for {request_id}", self.node_id);
            return signature;
        }

        // Signing happens outside the lock; a concurrent signer for the same
        // id loses to whichever entry landed first.
        let signature = self.keypair.sign(message);
        self.signatures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, signature)
    }

    #[must_use]
    pub fn cached_signature(&self, request_id: &RequestId) -> Option<Signature> {
        self.signatures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_id)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_in_flight(&self, request_id: &RequestId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(request_id)
    }
}

impl<N: Network> std::fmt::Debug for FederationNode<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationNode")
            .field("node_id", &self.node_id)
            .field("public_key", &self.current_public_key())
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}
