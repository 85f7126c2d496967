use std::collections::{HashMap, VecDeque};

use crypto::Signature;
use types::RequestId;

pub const DEFAULT_SIGNATURE_CACHE_CAPACITY: usize = 1024;

/// Own signatures by request id. Oldest entries are evicted first once
/// `capacity` is reached.
#[derive(Debug)]
pub struct SignatureCache {
    capacity: usize,
    order: VecDeque<RequestId>,
    entries: HashMap<RequestId, Signature>,
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_CACHE_CAPACITY)
    }
}

impl SignatureCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn get(&self, request_id: &RequestId) -> Option<Signature> {
        self.entries.get(request_id).copied()
    }

    /// Remembers `signature` for `request_id` unless an entry already
    /// exists, and returns the entry that is kept.
    pub fn insert(&mut self, request_id: RequestId, signature: Signature) -> Signature {
        if let Some(existing) = self.get(&request_id) {
            return existing;
        }

        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        self.order.push_back(request_id);
        self.entries.insert(request_id, signature);
        signature
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
