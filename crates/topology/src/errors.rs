use std::error::Error;

use derive_more::Display;
use types::NodeId;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[display("A topology needs at least one node")]
    Empty,

    #[display("Branching factor must be at least 1, got {_0}")]
    InvalidBranching(u32),

    #[display("{_0} cannot be its own parent")]
    SelfLink(NodeId),

    #[display("Root {_0} cannot have a parent")]
    RootHasParent(NodeId),

    #[display("{_0} has more than one parent")]
    MultipleParents(NodeId),

    #[display("Nodes unreachable from the root: {_0:?}")]
    Unreachable(Vec<NodeId>),
}

impl Error for TopologyError {}
