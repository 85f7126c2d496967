//! One attestation round driven from the topology root.
//!
//! The session walks `INIT -> DISSEMINATING -> COLLECTING -> AGGREGATING` and
//! ends in exactly one terminal status. The root is asked to answer
//! `finalize_margin` before the global deadline so that subtree timeouts
//! settle first; the deadline itself discards whatever was collected.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use crypto::KeyRegistry;
use tokio::{
    sync::watch,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use topology::Topology;
use tracing::{debug, error, info, warn};
use types::{
    AggregateSignature, NodeId, PartialContribution, SessionReport, SessionStatus,
    SignatureRequest, coverage_metrics,
    errors::{CollectionError, NodeError},
    network::Network,
    session_outcome_metrics,
};

use crate::{FederationNode, anchor::ResultAnchor, collection::instant_after};

pub const DEFAULT_FINALIZE_MARGIN: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub finalize_margin: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            finalize_margin: DEFAULT_FINALIZE_MARGIN,
        }
    }
}

/// Lets the session owner watch progress and stop the round.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cancel: CancellationToken,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}

enum Outcome {
    Collected(Result<PartialContribution, NodeError>),
    Interrupted(SessionStatus, CollectionError),
}

pub struct CollectionSession<N: Network> {
    request: SignatureRequest,
    topology: Arc<Topology>,
    root: FederationNode<N>,
    registry: KeyRegistry<NodeId>,
    anchor: Arc<dyn ResultAnchor>,
    config: SessionConfig,
    cancel: CancellationToken,
    status: watch::Sender<SessionStatus>,
}

impl<N: Network> std::fmt::Debug for CollectionSession<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionSession")
            .field("request", &self.request)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<N: Network> CollectionSession<N> {
    pub fn new(
        request: SignatureRequest,
        topology: Arc<Topology>,
        root: FederationNode<N>,
        registry: KeyRegistry<NodeId>,
        anchor: Arc<dyn ResultAnchor>,
        config: SessionConfig,
    ) -> Result<Self, CollectionError> {
        if request.quorum() == 0 {
            return Err(CollectionError::Rejected("quorum must be at least 1".into()));
        }
        if request.quorum() > topology.len() {
            return Err(CollectionError::Rejected(format!(
                "quorum {} exceeds the {} nodes of the topology",
                request.quorum(),
                topology.len()
            )));
        }
        if root.node_id != topology.root() {
            return Err(CollectionError::Rejected(format!(
                "{} is not the topology root {}",
                root.node_id,
                topology.root()
            )));
        }

        let (status, _) = watch::channel(SessionStatus::Init);
        Ok(Self {
            request,
            topology,
            root,
            registry,
            anchor,
            config,
            cancel: CancellationToken::new(),
            status,
        })
    }

    #[must_use]
    pub const fn request(&self) -> &SignatureRequest {
        &self.request
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            cancel: self.cancel.clone(),
            status: self.status.subscribe(),
        }
    }

    /// Drives the round to a terminal status and hands the outcome to the
    /// anchor.
    pub async fn run(self) -> SessionReport {
        let report = self.drive().await;
        // A rejected start shares its request id with a session that is
        // still running; that session anchors the outcome.
        if !matches!(report.failure, Some(CollectionError::Rejected(_))) {
            self.deliver(&report).await;
        }
        report
    }

    async fn drive(&self) -> SessionReport {
        let started = Instant::now();
        let request_id = self.request.request_id();
        let deadline = instant_after(started, self.request.deadline());
        let respond_by = deadline
            .checked_sub(self.config.finalize_margin)
            .map_or(started, |instant| instant.max(started));
        info!(
            "Session {request_id} started: quorum {} of {}, deadline {:?}",
            self.request.quorum(),
            self.topology.len(),
            self.request.deadline()
        );

        if self.cancel.is_cancelled() {
            return self.conclude(
                started,
                SessionStatus::Cancelled,
                None,
                BTreeSet::new(),
                Some(CollectionError::Cancelled),
            );
        }

        self.advance(SessionStatus::Disseminating);
        let collection_token = self.cancel.child_token();
        let pending = match self.root.disseminate(
            request_id,
            self.request.message().to_vec(),
            respond_by,
            collection_token.clone(),
        ) {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Session {request_id} could not start: {e}");
                return self.conclude(
                    started,
                    SessionStatus::Cancelled,
                    None,
                    BTreeSet::new(),
                    Some(CollectionError::Rejected(e.to_string())),
                );
            }
        };

        self.advance(SessionStatus::Collecting);
        let collect = self.root.collect(pending);
        tokio::pin!(collect);
        let outcome = tokio::select! {
            biased;
            () = sleep_until(deadline) => {
                Outcome::Interrupted(SessionStatus::Timeout, CollectionError::SessionTimeout)
            }
            () = self.cancel.cancelled() => {
                Outcome::Interrupted(SessionStatus::Cancelled, CollectionError::Cancelled)
            }
            result = &mut collect => Outcome::Collected(result),
        };

        let contribution = match outcome {
            Outcome::Interrupted(status, reason) => {
                collection_token.cancel();
                // Runs the root's cancellation path, which tells its children.
                let _ = collect.await;
                return self.conclude(started, status, None, BTreeSet::new(), Some(reason));
            }
            Outcome::Collected(Err(e)) => {
                warn!("Session {request_id} collection stopped: {e}");
                return self.conclude(
                    started,
                    SessionStatus::Cancelled,
                    None,
                    BTreeSet::new(),
                    Some(CollectionError::Cancelled),
                );
            }
            Outcome::Collected(Ok(contribution)) => contribution,
        };

        self.advance(SessionStatus::Aggregating);
        let aggregate = AggregateSignature::from(contribution);
        let signer_ids = aggregate.signer_ids().clone();
        coverage_metrics!(signer_ids.len(), self.topology.len());

        if signer_ids.len() < self.request.quorum() {
            let reason = CollectionError::QuorumNotMet {
                collected: signer_ids.len(),
                quorum: self.request.quorum(),
            };
            warn!("Session {request_id}: {reason}");
            return self.conclude(
                started,
                SessionStatus::PartialQuorumFailed,
                None,
                signer_ids,
                Some(reason),
            );
        }

        if !aggregate.verify(self.request.message(), &self.registry) {
            error!(
                "Session {request_id}: aggregate over {} signers failed verification",
                signer_ids.len()
            );
            return self.conclude(
                started,
                SessionStatus::IntegrityFailed,
                None,
                signer_ids,
                Some(CollectionError::AggregateVerificationFailure),
            );
        }

        self.conclude(
            started,
            SessionStatus::Verified,
            Some(aggregate),
            signer_ids,
            None,
        )
    }

    fn advance(&self, next: SessionStatus) {
        let current = *self.status.borrow();
        if current.can_transition_to(next) {
            self.status.send_replace(next);
            debug!("Session {} {current} -> {next}", self.request.request_id());
        } else {
            warn!(
                "Session {} refused transition {current} -> {next}",
                self.request.request_id()
            );
        }
    }

    fn conclude(
        &self,
        started: Instant,
        status: SessionStatus,
        aggregate: Option<AggregateSignature>,
        signer_ids: BTreeSet<NodeId>,
        failure: Option<CollectionError>,
    ) -> SessionReport {
        self.advance(status);
        let request_id = self.request.request_id();
        let elapsed = started.elapsed();

        let missing: BTreeSet<NodeId> = self
            .topology
            .nodes()
            .filter(|node| !signer_ids.contains(node))
            .collect();
        // Topmost missing nodes: everything below them is missing too.
        let subtree_timeouts = missing
            .iter()
            .copied()
            .filter(|node| {
                self.topology
                    .parent(node)
                    .is_some_and(|parent| !missing.contains(&parent))
            })
            .collect();

        info!("Session {request_id} finished {status} after {elapsed:?}");
        session_outcome_metrics!(status, elapsed);

        SessionReport {
            request_id,
            status,
            aggregate,
            signer_ids,
            missing,
            subtree_timeouts,
            failure,
            elapsed,
        }
    }

    async fn deliver(&self, report: &SessionReport) {
        let delivered = match (&report.aggregate, &report.failure) {
            (Some(aggregate), _) => {
                self.anchor
                    .anchor_verified(report.request_id, self.request.message(), aggregate)
                    .await
            }
            (None, Some(reason)) => self.anchor.anchor_failure(report.request_id, reason).await,
            (None, None) => Ok(()),
        };
        if let Err(e) = delivered {
            error!("Anchoring {} failed: {e}", report.request_id);
        }
    }
}
