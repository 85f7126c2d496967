use std::{collections::BTreeSet, fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    contribution::AggregateSignature,
    errors::CollectionError,
    ids::{NodeId, RequestId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Init,
    Disseminating,
    Collecting,
    Aggregating,
    Verified,
    PartialQuorumFailed,
    Timeout,
    IntegrityFailed,
    Cancelled,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Verified
                | Self::PartialQuorumFailed
                | Self::Timeout
                | Self::IntegrityFailed
                | Self::Cancelled
        )
    }

    /// Legal edges of the collection state machine. Timeout and cancellation
    /// may interrupt any non-terminal state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Init, Self::Disseminating)
            | (Self::Disseminating, Self::Collecting)
            | (Self::Collecting, Self::Aggregating)
            | (
                Self::Aggregating,
                Self::Verified | Self::PartialQuorumFailed | Self::IntegrityFailed,
            ) => true,
            (current, Self::Timeout | Self::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Disseminating => "DISSEMINATING",
            Self::Collecting => "COLLECTING",
            Self::Aggregating => "AGGREGATING",
            Self::Verified => "VERIFIED",
            Self::PartialQuorumFailed => "PARTIAL_QUORUM_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::IntegrityFailed => "INTEGRITY_FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Outcome of one collection round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub request_id: RequestId,
    pub status: SessionStatus,
    /// Present only when `status` is `Verified`.
    pub aggregate: Option<AggregateSignature>,
    pub signer_ids: BTreeSet<NodeId>,
    pub missing: BTreeSet<NodeId>,
    /// Topmost nodes of the subtrees that were excluded from the aggregate.
    pub subtree_timeouts: Vec<NodeId>,
    pub failure: Option<CollectionError>,
    pub elapsed: Duration,
}

impl SessionReport {
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self.status, SessionStatus::Verified)
    }
}
