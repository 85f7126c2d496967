use std::error::Error;

use crypto::CryptoError;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, RequestId};

#[derive(Debug, Display, Clone)]
pub enum NodeError {
    #[display("Node {_0} is not part of the topology")]
    UnknownNode(NodeId),

    #[display("Request {_0} is already being collected")]
    DuplicateRequest(RequestId),

    #[display("Collection for request {_0} was cancelled")]
    Cancelled(RequestId),

    #[display("{from} is not the parent of {node}")]
    NotParent { from: NodeId, node: NodeId },

    #[display("Crypto error: {_0}")]
    Crypto(CryptoError),

    #[display("Network error: {_0}")]
    Network(NetworkError),

    #[display("Config error: {_0}")]
    Config(String),

    Error(String),
}

impl From<CryptoError> for NodeError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

impl From<NetworkError> for NodeError {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

impl Error for NodeError {}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[display("{from} and {to} share no topology link")]
    NotAdjacent { from: NodeId, to: NodeId },

    #[display("No inbox registered for {_0}")]
    UnknownNode(NodeId),

    #[display("{_0} is disconnected")]
    Disconnected(NodeId),

    #[display("Failed to send message: {_0}")]
    SendError(String),
}

impl Error for NetworkError {}

/// Terminal failure reasons of a collection round, as handed to the anchor.
#[derive(Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionError {
    #[display("Entropy source failed: {_0}")]
    EntropyFailure(String),

    #[display("Proof of possession rejected for {_0}")]
    InvalidProofOfPossession(NodeId),

    #[display("Subtree rooted at {_0} did not answer in time")]
    SubtreeTimeout(NodeId),

    #[display("Quorum not met: {collected} of {quorum} signers")]
    QuorumNotMet { collected: usize, quorum: usize },

    #[display("Aggregate signature failed verification")]
    AggregateVerificationFailure,

    #[display("Session deadline exceeded")]
    SessionTimeout,

    #[display("Session cancelled")]
    Cancelled,

    #[display("Request rejected: {_0}")]
    Rejected(String),
}

impl CollectionError {
    /// Fatal errors indicate broken keys or corrupted contributions rather
    /// than missing coverage.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EntropyFailure(_)
                | Self::InvalidProofOfPossession(_)
                | Self::AggregateVerificationFailure
        )
    }
}

impl Error for CollectionError {}
