use std::sync::PoisonError;

use tokio::{sync::mpsc::UnboundedReceiver, time::Instant};
use tracing::{debug, info, warn};
use types::{
    errors::NodeError,
    network::Network,
    network_event::{DirectMessage, NetworkEvent},
};

use crate::{FederationNode, collection::instant_after};

impl<N: Network> FederationNode<N> {
    pub async fn start(self, mut events: UnboundedReceiver<NetworkEvent>) {
        info!("{} main loop started", self.node_id);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    None | Some(NetworkEvent::Shutdown) => break,
                    Some(event) => {
                        if let Err(e) = self.handle(event) {
                            warn!("{} rejected message: {e}", self.node_id);
                        }
                    }
                },
            }
        }

        self.stop_in_flight();
        info!("{} main loop stopped", self.node_id);
    }

    pub fn handle(&self, event: NetworkEvent) -> Result<(), NodeError> {
        let NetworkEvent::MessageEvent((from, message)) = event else {
            return Ok(());
        };
        debug!(
            "{} received {} for {} from {from}",
            self.node_id,
            message.kind(),
            message.request_id()
        );

        match message {
            DirectMessage::CollectionRequest {
                request_id,
                message,
                budget,
            } => {
                self.expect_parent(from)?;
                let latency = self
                    .topology
                    .link_latency(&self.node_id, &from)
                    .unwrap_or_default();
                let now = Instant::now();
                let respond_by = instant_after(now.checked_sub(latency).unwrap_or(now), budget);

                // Registered before the next event is handled, so a cancel
                // right behind the request finds it.
                let pending = match self.disseminate(
                    request_id,
                    message,
                    respond_by,
                    self.shutdown.child_token(),
                ) {
                    Ok(pending) => pending,
                    Err(NodeError::Cancelled(request_id)) => {
                        debug!("{} was told to drop {request_id} before it arrived", self.node_id);
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                };

                let node = self.clone();
                tokio::spawn(async move {
                    match node.answer_parent(from, pending).await {
                        Ok(()) => {}
                        Err(NodeError::Cancelled(request_id)) => {
                            debug!("{} stopped collecting {request_id}", node.node_id);
                        }
                        Err(e) => warn!("{} failed to serve {request_id}: {e}", node.node_id),
                    }
                });
            }
            DirectMessage::Contribution {
                request_id,
                contribution,
            } => {
                if !self.route_contribution(from, request_id, contribution) {
                    debug!(
                        "{} dropping late contribution from {from} for {request_id}",
                        self.node_id
                    );
                }
            }
            DirectMessage::CancelCollection { request_id } => {
                self.expect_parent(from)?;
                if !self.cancel_collection(&request_id) {
                    debug!("{} has nothing to cancel for {request_id}", self.node_id);
                }
            }
        }
        Ok(())
    }

    fn expect_parent(&self, from: types::NodeId) -> Result<(), NodeError> {
        if self.topology.parent(&self.node_id) == Some(from) {
            Ok(())
        } else {
            Err(NodeError::NotParent {
                from,
                node: self.node_id,
            })
        }
    }

    fn stop_in_flight(&self) {
        let in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for request in in_flight.values() {
            request.cancel.cancel();
        }
    }
}
