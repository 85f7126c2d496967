use std::time::Duration;

use serde::{Deserialize, Serialize};
use types::NodeId;

use crate::{Topology, TopologyBuilder, errors::TopologyError};

impl Topology {
    /// `CM1 -> CM2 -> ... -> CMn`, rooted at `CM1`.
    pub fn chain(nodes: u32, latency: Duration) -> Result<Self, TopologyError> {
        Self::m_ary(nodes, 1, latency)
    }

    /// Complete `branching`-ary tree over `CM1..=CMn` in heap order: the
    /// parent of `CMk` is `CM((k - 2) / branching + 1)`.
    pub fn m_ary(nodes: u32, branching: u32, latency: Duration) -> Result<Self, TopologyError> {
        if nodes == 0 {
            return Err(TopologyError::Empty);
        }
        if branching == 0 {
            return Err(TopologyError::InvalidBranching(branching));
        }
        let mut builder = TopologyBuilder::new(NodeId(1));
        for k in 2..=nodes {
            builder.add_link(NodeId((k - 2) / branching + 1), NodeId(k), latency);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub parent: NodeId,
    pub child: NodeId,
    pub latency_ms: u64,
}

/// Declarative topology, as written in the federation config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TopologySpec {
    Chain {
        nodes: u32,
        latency_ms: u64,
    },
    Tree {
        nodes: u32,
        branching: u32,
        latency_ms: u64,
    },
    Explicit {
        root: NodeId,
        links: Vec<LinkSpec>,
    },
}

impl Default for TopologySpec {
    fn default() -> Self {
        Self::Chain {
            nodes: 5,
            latency_ms: 50,
        }
    }
}

impl TopologySpec {
    pub fn build(&self) -> Result<Topology, TopologyError> {
        match self {
            Self::Chain { nodes, latency_ms } => {
                Topology::chain(*nodes, Duration::from_millis(*latency_ms))
            }
            Self::Tree {
                nodes,
                branching,
                latency_ms,
            } => Topology::m_ary(*nodes, *branching, Duration::from_millis(*latency_ms)),
            Self::Explicit { root, links } => links
                .iter()
                .fold(TopologyBuilder::new(*root), |builder, link| {
                    builder.link(
                        link.parent,
                        link.child,
                        Duration::from_millis(link.latency_ms),
                    )
                })
                .build(),
        }
    }

    /// Upper bound on node count, known before building.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Self::Chain { nodes, .. } | Self::Tree { nodes, .. } => *nodes as usize,
            Self::Explicit { links, .. } => links.len() + 1,
        }
    }
}
