use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use topology::Topology;
use tracing::{debug, info};
use types::{AggregateSignature, NodeId, RequestId, errors::CollectionError, errors::NodeError};

/// Receives the outcome of every finished collection round. Implementations
/// must tolerate the same `request_id` being delivered more than once.
#[async_trait]
pub trait ResultAnchor: Send + Sync {
    async fn anchor_verified(
        &self,
        request_id: RequestId,
        message: &[u8],
        aggregate: &AggregateSignature,
    ) -> Result<(), NodeError>;

    async fn anchor_failure(
        &self,
        request_id: RequestId,
        reason: &CollectionError,
    ) -> Result<(), NodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    pub request_id: RequestId,
    pub message_hex: String,
    pub count: usize,
    pub signers: Vec<NodeId>,
    pub signer_bitmap: Vec<u8>,
    pub signature_hex: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    endorsements: BTreeMap<RequestId, Endorsement>,
    failures: BTreeMap<RequestId, CollectionError>,
}

/// In-memory record of endorsed responses. The first delivery for a
/// request id wins; later ones are ignored.
#[derive(Debug, Clone)]
pub struct EndorsementLedger {
    topology: Arc<Topology>,
    state: Arc<Mutex<LedgerState>>,
}

impl EndorsementLedger {
    #[must_use]
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            state: Arc::new(Mutex::new(LedgerState::default())),
        }
    }

    #[must_use]
    pub fn endorsement(&self, request_id: &RequestId) -> Option<Endorsement> {
        self.lock().endorsements.get(request_id).cloned()
    }

    #[must_use]
    pub fn failure(&self, request_id: &RequestId) -> Option<CollectionError> {
        self.lock().failures.get(request_id).cloned()
    }

    #[must_use]
    pub fn endorsements(&self) -> Vec<Endorsement> {
        self.lock().endorsements.values().cloned().collect()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<(RequestId, CollectionError)> {
        self.lock()
            .failures
            .iter()
            .map(|(id, reason)| (*id, reason.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_recorded(state: &LedgerState, request_id: &RequestId) -> bool {
        state.endorsements.contains_key(request_id) || state.failures.contains_key(request_id)
    }
}

#[async_trait]
impl ResultAnchor for EndorsementLedger {
    async fn anchor_verified(
        &self,
        request_id: RequestId,
        message: &[u8],
        aggregate: &AggregateSignature,
    ) -> Result<(), NodeError> {
        let mut state = self.lock();
        if Self::is_recorded(&state, &request_id) {
            debug!("Endorsement for {request_id} already recorded");
            return Ok(());
        }

        let endorsement = Endorsement {
            request_id,
            message_hex: hex::encode(message),
            count: aggregate.len(),
            signers: aggregate.signer_ids().iter().copied().collect(),
            signer_bitmap: self.topology.signer_bitmap(aggregate.signer_ids()),
            signature_hex: hex::encode(aggregate.signature().to_bytes()),
        };
        info!(
            "Endorsed {request_id} with {} signers",
            endorsement.count
        );
        state.endorsements.insert(request_id, endorsement);
        Ok(())
    }

    async fn anchor_failure(
        &self,
        request_id: RequestId,
        reason: &CollectionError,
    ) -> Result<(), NodeError> {
        let mut state = self.lock();
        if Self::is_recorded(&state, &request_id) {
            debug!("Outcome for {request_id} already recorded");
            return Ok(());
        }
        state.failures.insert(request_id, reason.clone());
        Ok(())
    }
}
