use std::fmt::Debug;

use crate::{errors::NetworkError, ids::NodeId, network_event::DirectMessage};

/// Point-to-point delivery along topology edges.
pub trait Network: Clone + Debug + Send + Sync + 'static {
    fn send_direct_message(
        &self,
        from: NodeId,
        to: NodeId,
        message: DirectMessage,
    ) -> Result<(), NetworkError>;
}
