use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::RequestId;

/// One attestation round: who must sign what, how many, by when.
/// Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    request_id: RequestId,
    message: Vec<u8>,
    quorum: usize,
    deadline: Duration,
}

impl SignatureRequest {
    pub fn new(message: impl Into<Vec<u8>>, quorum: usize, deadline: Duration) -> Self {
        Self::with_id(RequestId::new(), message, quorum, deadline)
    }

    pub fn with_id(
        request_id: RequestId,
        message: impl Into<Vec<u8>>,
        quorum: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            request_id,
            message: message.into(),
            quorum,
            deadline,
        }
    }

    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    #[must_use]
    pub const fn quorum(&self) -> usize {
        self.quorum
    }

    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }
}
