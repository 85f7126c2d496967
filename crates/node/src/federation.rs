use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};

use crypto::{CryptoError, KeyPair, KeyRegistry, ProofOfPossession, PublicKey};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use topology::Topology;
use tracing::{info, warn};
use types::{
    NodeId, SessionReport, SignatureRequest,
    errors::{CollectionError, NodeError},
    network::Network,
};

use crate::{
    FederationNode, SharedRegistry, anchor::ResultAnchor, config::FederationConfig,
    network::SimulatedNetwork, session::{CollectionSession, SessionConfig},
};

/// Every node of a topology, keyed, registered and running its main loop
/// over a [`SimulatedNetwork`].
pub struct Federation<N: Network = SimulatedNetwork> {
    topology: Arc<Topology>,
    simulated: SimulatedNetwork,
    registry: SharedRegistry,
    nodes: BTreeMap<NodeId, FederationNode<N>>,
    anchor: Arc<dyn ResultAnchor>,
    session_config: SessionConfig,
    quorum: usize,
    shutdown: CancellationToken,
    loops: Vec<JoinHandle<()>>,
}

impl Federation<SimulatedNetwork> {
    /// Must be called from within a tokio runtime.
    pub fn launch(
        topology: Topology,
        config: &FederationConfig,
        anchor: Arc<dyn ResultAnchor>,
    ) -> Result<Self, NodeError> {
        Self::launch_with_network(topology, config, anchor, |network| network)
    }
}

impl<N: Network> Federation<N> {
    /// Like [`Federation::launch`], with every node sending through
    /// `wrap(simulated)` instead of the bare simulated network.
    pub fn launch_with_network<F>(
        topology: Topology,
        config: &FederationConfig,
        anchor: Arc<dyn ResultAnchor>,
        wrap: F,
    ) -> Result<Self, NodeError>
    where
        F: FnOnce(SimulatedNetwork) -> N,
    {
        let topology = Arc::new(topology);
        let simulated = SimulatedNetwork::new(topology.clone());
        let network = wrap(simulated.clone());
        let registry: SharedRegistry = Arc::new(RwLock::new(KeyRegistry::new()));
        let shutdown = CancellationToken::new();

        let mut nodes = BTreeMap::new();
        let mut loops = Vec::with_capacity(topology.len());
        for node_id in topology.nodes() {
            let (keypair, proof) = match &config.key_seed {
                Some(seed) => KeyPair::from_seed(format!("{seed}/{node_id}").as_bytes())?,
                None => KeyPair::generate()?,
            };
            registry
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .register(node_id, keypair.public_key(), &proof)?;

            let node = FederationNode::new(
                node_id,
                keypair,
                proof,
                topology.clone(),
                registry.clone(),
                network.clone(),
                config.signature_cache_capacity,
                shutdown.child_token(),
            );
            let inbox = simulated.register_inbox(node_id);
            loops.push(tokio::spawn(node.clone().start(inbox)));
            nodes.insert(node_id, node);
        }
        info!(
            "Federation of {} nodes launched, root {}, depth {}",
            topology.len(),
            topology.root(),
            topology.depth()
        );

        Ok(Self {
            quorum: config.quorum_for(topology.len()),
            session_config: config.session_config(),
            topology,
            simulated,
            registry,
            nodes,
            anchor,
            shutdown,
            loops,
        })
    }

    #[must_use]
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    #[must_use]
    pub const fn default_quorum(&self) -> usize {
        self.quorum
    }

    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&FederationNode<N>> {
        self.nodes.get(node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FederationNode<N>> {
        self.nodes.values()
    }

    /// A snapshot of the PoP registry.
    #[must_use]
    pub fn registry(&self) -> KeyRegistry<NodeId> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-registers `node_id`. A failed proof excludes the node from every
    /// later aggregate until a valid proof is registered.
    pub fn register(
        &self,
        node_id: NodeId,
        public_key: PublicKey,
        proof: &ProofOfPossession,
    ) -> Result<(), CryptoError> {
        let result = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(node_id, public_key, proof);
        if let Err(e) = &result {
            warn!("Registration of {node_id} rejected: {e}");
        }
        result
    }

    pub fn isolate(&self, node_id: NodeId) {
        self.simulated.isolate(node_id);
    }

    pub fn reconnect(&self, node_id: NodeId) {
        self.simulated.reconnect(node_id);
    }

    pub fn session(&self, request: SignatureRequest) -> Result<CollectionSession<N>, CollectionError> {
        let root = self
            .nodes
            .get(&self.topology.root())
            .cloned()
            .ok_or_else(|| CollectionError::Rejected("root node is not running".into()))?;
        CollectionSession::new(
            request,
            self.topology.clone(),
            root,
            self.registry(),
            self.anchor.clone(),
            self.session_config,
        )
    }

    /// Runs one session to completion.
    pub async fn collect(&self, request: SignatureRequest) -> Result<SessionReport, CollectionError> {
        Ok(self.session(request)?.run().await)
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.simulated.shutdown();
        for result in join_all(self.loops).await {
            if let Err(e) = result {
                warn!("Node main loop ended abnormally: {e}");
            }
        }
        info!("Federation shut down");
    }
}
