use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use node::ResultAnchor;
use types::{
    AggregateSignature, NodeId, RequestId,
    errors::{CollectionError, NodeError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Verified {
        request_id: RequestId,
        message: Vec<u8>,
        signer_ids: BTreeSet<NodeId>,
    },
    Failed {
        request_id: RequestId,
        reason: CollectionError,
    },
}

impl Delivery {
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::Verified { request_id, .. } | Self::Failed { request_id, .. } => *request_id,
        }
    }
}

/// Remembers every delivery in arrival order, duplicates included.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnchor {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl RecordingAnchor {
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn deliveries_for(&self, request_id: RequestId) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|delivery| delivery.request_id() == request_id)
            .collect()
    }

    fn record(&self, delivery: Delivery) {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delivery);
    }
}

#[async_trait]
impl ResultAnchor for RecordingAnchor {
    async fn anchor_verified(
        &self,
        request_id: RequestId,
        message: &[u8],
        aggregate: &AggregateSignature,
    ) -> Result<(), NodeError> {
        self.record(Delivery::Verified {
            request_id,
            message: message.to_vec(),
            signer_ids: aggregate.signer_ids().clone(),
        });
        Ok(())
    }

    async fn anchor_failure(
        &self,
        request_id: RequestId,
        reason: &CollectionError,
    ) -> Result<(), NodeError> {
        self.record(Delivery::Failed {
            request_id,
            reason: reason.clone(),
        });
        Ok(())
    }
}

/// An anchor whose backing store is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingAnchor;

#[async_trait]
impl ResultAnchor for FailingAnchor {
    async fn anchor_verified(
        &self,
        request_id: RequestId,
        _message: &[u8],
        _aggregate: &AggregateSignature,
    ) -> Result<(), NodeError> {
        Err(NodeError::Error(format!("ledger offline, dropped {request_id}")))
    }

    async fn anchor_failure(
        &self,
        request_id: RequestId,
        _reason: &CollectionError,
    ) -> Result<(), NodeError> {
        Err(NodeError::Error(format!("ledger offline, dropped {request_id}")))
    }
}
