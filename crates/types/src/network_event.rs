use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    contribution::PartialContribution,
    errors::NodeError,
    ids::{NodeId, RequestId},
};

/// Messages exchanged along topology edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectMessage {
    /// Parent to child. `budget` is measured from the moment the parent sent
    /// the request to the moment the child's contribution must be sent back.
    CollectionRequest {
        request_id: RequestId,
        message: Vec<u8>,
        budget: Duration,
    },
    /// Child to parent.
    Contribution {
        request_id: RequestId,
        contribution: PartialContribution,
    },
    /// Parent to child.
    CancelCollection { request_id: RequestId },
}

impl DirectMessage {
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::CollectionRequest { request_id, .. }
            | Self::Contribution { request_id, .. }
            | Self::CancelCollection { request_id } => *request_id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CollectionRequest { .. } => "collection_request",
            Self::Contribution { .. } => "contribution",
            Self::CancelCollection { .. } => "cancel_collection",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, NodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| NodeError::Error(format!("Failed to encode message: {e}")))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NodeError> {
        bincode::serde::decode_from_slice::<Self, _>(bytes, bincode::config::standard())
            .map(|(message, _)| message)
            .map_err(|e| NodeError::Error(format!("Failed to decode message: {e}")))
    }
}

#[derive(Debug, Clone)]
pub enum NetworkEvent {
    MessageEvent((NodeId, DirectMessage)),
    Shutdown,
}
