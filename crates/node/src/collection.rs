use std::{collections::BTreeSet, sync::PoisonError, time::Duration};

use crypto::Signature;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use types::{
    NodeId, PartialContribution, RequestId, contribution_metrics,
    errors::{CollectionError, NodeError},
    network::Network,
    network_event::DirectMessage,
};

use crate::{FederationNode, InFlight};

/// Taken off every hop on top of the link latency, so a child that answers
/// at its own respond-by instant still reaches its parent in time.
pub const HOP_MARGIN: Duration = Duration::from_millis(2);

/// Longest a deadline or budget may reach into the future.
pub const MAX_WAIT: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// How many cancels for not yet seen requests a node remembers.
const EARLY_CANCEL_MEMORY: usize = 256;

/// `start + wait`, with `wait` capped at [`MAX_WAIT`].
#[must_use]
pub fn instant_after(start: Instant, wait: Duration) -> Instant {
    start + wait.min(MAX_WAIT)
}

/// A request this node has fanned out and not yet folded.
#[derive(Debug)]
pub struct PendingCollection {
    request_id: RequestId,
    message: Vec<u8>,
    respond_by: Instant,
    awaiting: BTreeSet<NodeId>,
    skipped: BTreeSet<NodeId>,
    contributions: UnboundedReceiver<(NodeId, PartialContribution)>,
    cancel: CancellationToken,
}

impl PendingCollection {
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub const fn respond_by(&self) -> Instant {
        self.respond_by
    }

    /// Children the request was sent to.
    #[must_use]
    pub const fn awaiting(&self) -> &BTreeSet<NodeId> {
        &self.awaiting
    }

    /// Children left out because their window had already closed or the
    /// request could not be sent to them.
    #[must_use]
    pub const fn skipped(&self) -> &BTreeSet<NodeId> {
        &self.skipped
    }
}

impl<N: Network> FederationNode<N> {
    /// Registers `request_id` as in flight and forwards it to every child
    /// that still has time to answer before `respond_by`. Fails with
    /// `Cancelled` when the parent already cancelled `request_id`.
    pub fn disseminate(
        &self,
        request_id: RequestId,
        message: Vec<u8>,
        respond_by: Instant,
        cancel: CancellationToken,
    ) -> Result<PendingCollection, NodeError> {
        let (contributions_tx, contributions) = mpsc::unbounded_channel();
        {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if in_flight.contains_key(&request_id) {
                return Err(NodeError::DuplicateRequest(request_id));
            }
            let mut early_cancels = self
                .early_cancels
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(position) = early_cancels.iter().position(|id| *id == request_id) {
                early_cancels.remove(position);
                return Err(NodeError::Cancelled(request_id));
            }
            drop(early_cancels);
            in_flight.insert(
                request_id,
                InFlight {
                    contributions: contributions_tx,
                    cancel: cancel.clone(),
                },
            );
        }

        let now = Instant::now();
        let mut awaiting = BTreeSet::new();
        let mut skipped = BTreeSet::new();
        for child in self.topology.children(&self.node_id) {
            let latency = self
                .topology
                .link_latency(&self.node_id, child)
                .unwrap_or_default();
            let Some(child_respond_by) = respond_by
                .checked_sub(latency + HOP_MARGIN)
                .filter(|instant| *instant > now)
            else {
                warn!(
                    "{}: {} for {request_id}, no time left to ask it",
                    self.node_id,
                    CollectionError::SubtreeTimeout(*child)
                );
                skipped.insert(*child);
                continue;
            };

            let request = DirectMessage::CollectionRequest {
                request_id,
                message: message.clone(),
                budget: child_respond_by - now,
            };
            match self
                .network_handle
                .send_direct_message(self.node_id, *child, request)
            {
                Ok(()) => {
                    awaiting.insert(*child);
                }
                Err(e) => {
                    warn!("{} could not reach {child} for {request_id}: {e}", self.node_id);
                    skipped.insert(*child);
                }
            }
        }
        debug!(
            "{} disseminated {request_id} to {} children",
            self.node_id,
            awaiting.len()
        );

        Ok(PendingCollection {
            request_id,
            message,
            respond_by,
            awaiting,
            skipped,
            contributions,
            cancel,
        })
    }

    /// Folds child contributions until every awaited child has answered or
    /// `respond_by` passes, then adds this node's own signature. Children
    /// still outstanding at the deadline are told to stop.
    pub async fn collect(&self, pending: PendingCollection) -> Result<PartialContribution, NodeError> {
        let PendingCollection {
            request_id,
            message,
            respond_by,
            mut awaiting,
            skipped: _,
            mut contributions,
            cancel,
        } = pending;

        let mut folded = Signature::identity();
        let mut covered = BTreeSet::new();
        let deadline = sleep_until(respond_by);
        tokio::pin!(deadline);

        while !awaiting.is_empty() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.forward_cancel(request_id, &awaiting);
                    self.finish(&request_id);
                    return Err(NodeError::Cancelled(request_id));
                }
                () = &mut deadline => {
                    for child in &awaiting {
                        warn!("{}: {} for {request_id}", self.node_id, CollectionError::SubtreeTimeout(*child));
                        contribution_metrics!(child, "timeout");
                    }
                    self.forward_cancel(request_id, &awaiting);
                    break;
                }
                received = contributions.recv() => {
                    let Some((from, contribution)) = received else {
                        break;
                    };
                    if !awaiting.contains(&from) {
                        debug!("{} ignoring unsolicited contribution from {from} for {request_id}", self.node_id);
                        continue;
                    }
                    awaiting.remove(&from);
                    match self.check_contribution(from, &contribution, &covered) {
                        Ok(()) => {
                            folded = folded.combine(&contribution.signature);
                            covered.extend(contribution.covered_signer_ids);
                            contribution_metrics!(from, "accepted");
                        }
                        Err(reason) => {
                            warn!("{} discarding contribution from {from} for {request_id}: {reason}", self.node_id);
                            contribution_metrics!(from, "rejected");
                        }
                    }
                }
            }
        }

        if self.registry().is_trusted(&self.node_id) {
            folded = folded.combine(&self.sign_once(request_id, &message));
            covered.insert(self.node_id);
        } else {
            warn!("{} is not trusted, relaying without signing {request_id}", self.node_id);
        }
        self.finish(&request_id);

        Ok(PartialContribution {
            node_id: self.node_id,
            signature: folded,
            covered_signer_ids: covered,
        })
    }

    /// Folds an already disseminated request received from `parent` and
    /// sends the result back up.
    pub async fn answer_parent(
        &self,
        parent: NodeId,
        pending: PendingCollection,
    ) -> Result<(), NodeError> {
        let request_id = pending.request_id();
        let contribution = self.collect(pending).await?;
        debug!(
            "{} answering {request_id} covering {} signers",
            self.node_id,
            contribution.coverage()
        );
        self.network_handle.send_direct_message(
            self.node_id,
            parent,
            DirectMessage::Contribution {
                request_id,
                contribution,
            },
        )?;
        Ok(())
    }

    /// Returns false when `request_id` is not in flight here. The cancel is
    /// then remembered, so a request arriving after it is not served.
    pub fn cancel_collection(&self, request_id: &RequestId) -> bool {
        let in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(request) = in_flight.get(request_id) {
            request.cancel.cancel();
            return true;
        }

        let mut early_cancels = self
            .early_cancels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !early_cancels.contains(request_id) {
            if early_cancels.len() >= EARLY_CANCEL_MEMORY {
                early_cancels.pop_front();
            }
            early_cancels.push_back(*request_id);
        }
        false
    }

    /// Hands a child's contribution to the task collecting `request_id`.
    /// Returns false when nothing is waiting for it any more.
    pub fn route_contribution(
        &self,
        from: NodeId,
        request_id: RequestId,
        contribution: PartialContribution,
    ) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request_id)
            .is_some_and(|in_flight| in_flight.contributions.send((from, contribution)).is_ok())
    }

    fn check_contribution(
        &self,
        from: NodeId,
        contribution: &PartialContribution,
        folded: &BTreeSet<NodeId>,
    ) -> Result<(), String> {
        if contribution.node_id != from {
            return Err(format!("claims to be from {}", contribution.node_id));
        }
        if contribution.covered_signer_ids.is_empty() || contribution.signature.is_identity() {
            return Err("covers no signers".to_string());
        }

        let subtree = self.topology.subtree(&from);
        if let Some(outsider) = contribution
            .covered_signer_ids
            .iter()
            .find(|id| !subtree.contains(id))
        {
            return Err(format!("{outsider} is outside the subtree of {from}"));
        }

        let registry = self.registry();
        if let Some(untrusted) = contribution
            .covered_signer_ids
            .iter()
            .find(|id| !registry.is_trusted(id))
        {
            return Err(format!("{untrusted} has no verified proof of possession"));
        }

        if let Some(duplicate) = contribution.covered_signer_ids.intersection(folded).next() {
            return Err(format!("{duplicate} is already folded"));
        }
        Ok(())
    }

    fn forward_cancel(&self, request_id: RequestId, children: &BTreeSet<NodeId>) {
        for child in children {
            if let Err(e) = self.network_handle.send_direct_message(
                self.node_id,
                *child,
                DirectMessage::CancelCollection { request_id },
            ) {
                debug!("{} could not cancel {request_id} at {child}: {e}", self.node_id);
            }
        }
    }

    fn finish(&self, request_id: &RequestId) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(request_id);
    }
}
