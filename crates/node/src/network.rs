use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use topology::Topology;
use tracing::debug;
use types::{
    NodeId, direct_message_metrics,
    errors::NetworkError,
    network::Network,
    network_event::{DirectMessage, NetworkEvent},
};

/// In-process transport along topology edges. Every message is delivered
/// into the receiver's inbox after the link's latency has elapsed.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    topology: Arc<Topology>,
    inboxes: Arc<RwLock<HashMap<NodeId, UnboundedSender<NetworkEvent>>>>,
    isolated: Arc<RwLock<HashSet<NodeId>>>,
}

impl SimulatedNetwork {
    #[must_use]
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            inboxes: Arc::new(RwLock::new(HashMap::new())),
            isolated: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Opens the inbox of `node`. A second call replaces the first inbox.
    pub fn register_inbox(&self, node: NodeId) -> UnboundedReceiver<NetworkEvent> {
        let (tx, rx) = unbounded_channel();
        self.inboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node, tx);
        rx
    }

    /// Silently drops all traffic to and from `node` until reconnected.
    pub fn isolate(&self, node: NodeId) {
        debug!("Isolating {node}");
        self.isolated
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node);
    }

    pub fn reconnect(&self, node: NodeId) {
        debug!("Reconnecting {node}");
        self.isolated
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&node);
    }

    #[must_use]
    pub fn is_isolated(&self, node: &NodeId) -> bool {
        self.isolated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(node)
    }

    /// Pushes `Shutdown` into every open inbox.
    pub fn shutdown(&self) {
        let inboxes = self.inboxes.read().unwrap_or_else(PoisonError::into_inner);
        for inbox in inboxes.values() {
            let _ = inbox.send(NetworkEvent::Shutdown);
        }
    }
}

impl Network for SimulatedNetwork {
    fn send_direct_message(
        &self,
        from: NodeId,
        to: NodeId,
        message: DirectMessage,
    ) -> Result<(), NetworkError> {
        let latency = self
            .topology
            .link_latency(&from, &to)
            .ok_or(NetworkError::NotAdjacent { from, to })?;

        let inbox = self
            .inboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&to)
            .cloned()
            .ok_or(NetworkError::UnknownNode(to))?;
        if inbox.is_closed() {
            return Err(NetworkError::Disconnected(to));
        }

        if self.is_isolated(&from) || self.is_isolated(&to) {
            debug!(
                "Dropping {} for {} from {from} to {to}",
                message.kind(),
                message.request_id()
            );
            return Ok(());
        }

        direct_message_metrics!(message.kind());
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            if inbox
                .send(NetworkEvent::MessageEvent((from, message)))
                .is_err()
            {
                debug!("Inbox of {to} closed before delivery");
            }
        });
        Ok(())
    }
}
