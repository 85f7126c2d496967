//! Immutable rooted trees of federation nodes. A chain is the degenerate
//! tree with branching factor 1.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use types::NodeId;

pub mod builder;
pub mod errors;
pub mod shapes;

pub use builder::TopologyBuilder;
pub use errors::TopologyError;
pub use shapes::{LinkSpec, TopologySpec};

static NO_CHILDREN: BTreeSet<NodeId> = BTreeSet::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement {
    pub(crate) parent: Option<(NodeId, Duration)>,
    pub(crate) children: BTreeSet<NodeId>,
    pub(crate) depth: usize,
    pub(crate) root_latency: Duration,
}

/// Exactly one root, no cycles, every node reachable from the root.
/// Guaranteed by [`TopologyBuilder::build`], the only constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    root: NodeId,
    nodes: BTreeMap<NodeId, Placement>,
}

impl Topology {
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// All nodes, ascending.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    #[must_use]
    pub fn children(&self, node: &NodeId) -> &BTreeSet<NodeId> {
        self.nodes
            .get(node)
            .map_or(&NO_CHILDREN, |placement| &placement.children)
    }

    #[must_use]
    pub fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes
            .get(node)
            .and_then(|placement| placement.parent)
            .map(|(parent, _)| parent)
    }

    #[must_use]
    pub fn is_leaf(&self, node: &NodeId) -> bool {
        self.children(node).is_empty()
    }

    /// Simulated latency of the edge between `a` and `b`, in either
    /// direction. `None` unless the two are parent and child.
    #[must_use]
    pub fn link_latency(&self, a: &NodeId, b: &NodeId) -> Option<Duration> {
        let up = |child: &NodeId, parent: &NodeId| {
            self.nodes
                .get(child)
                .and_then(|placement| placement.parent)
                .filter(|(p, _)| p == parent)
                .map(|(_, latency)| latency)
        };
        up(a, b).or_else(|| up(b, a))
    }

    #[must_use]
    pub fn depth_of(&self, node: &NodeId) -> Option<usize> {
        self.nodes.get(node).map(|placement| placement.depth)
    }

    /// Number of edges on the longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.nodes
            .values()
            .map(|placement| placement.depth)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn latency_to_root(&self, node: &NodeId) -> Option<Duration> {
        self.nodes.get(node).map(|placement| placement.root_latency)
    }

    /// One-way latency from the root to its farthest node. A fully
    /// responsive round needs at least twice this.
    #[must_use]
    pub fn critical_path_latency(&self) -> Duration {
        self.nodes
            .values()
            .map(|placement| placement.root_latency)
            .max()
            .unwrap_or_default()
    }

    /// `node` and all of its descendants.
    #[must_use]
    pub fn subtree(&self, node: &NodeId) -> BTreeSet<NodeId> {
        let mut members = BTreeSet::new();
        if !self.contains(node) {
            return members;
        }
        let mut stack = vec![*node];
        while let Some(current) = stack.pop() {
            members.insert(current);
            stack.extend(self.children(&current).iter().copied());
        }
        members
    }

    /// Index of `node` in ascending id order.
    #[must_use]
    pub fn position(&self, node: &NodeId) -> Option<usize> {
        self.nodes.keys().position(|candidate| candidate == node)
    }

    /// One bit per topology node in ascending id order, least significant bit
    /// first. Ids outside the topology are ignored.
    #[must_use]
    pub fn signer_bitmap(&self, signer_ids: &BTreeSet<NodeId>) -> Vec<u8> {
        let mut bitmap = vec![0u8; self.nodes.len().div_ceil(8)];
        for (index, node) in self.nodes.keys().enumerate() {
            if signer_ids.contains(node) {
                bitmap[index / 8] |= 1 << (index % 8);
            }
        }
        bitmap
    }

    #[must_use]
    pub fn signers_from_bitmap(&self, bitmap: &[u8]) -> BTreeSet<NodeId> {
        self.nodes
            .keys()
            .enumerate()
            .filter(|(index, _)| {
                bitmap
                    .get(index / 8)
                    .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
            })
            .map(|(_, node)| *node)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const L: Duration = Duration::from_millis(50);

    fn binary_tree() -> Topology {
        // CM1 -> {CM2, CM3}, CM2 -> {CM4, CM5}
        Topology::m_ary(5, 2, L).unwrap()
    }

    #[test]
    fn parent_and_children_agree() {
        let topology = binary_tree();
        assert_eq!(topology.root(), NodeId(1));
        assert_eq!(
            topology.children(&NodeId(1)),
            &BTreeSet::from([NodeId(2), NodeId(3)])
        );
        assert_eq!(
            topology.children(&NodeId(2)),
            &BTreeSet::from([NodeId(4), NodeId(5)])
        );
        assert_eq!(topology.parent(&NodeId(5)), Some(NodeId(2)));
        assert_eq!(topology.parent(&NodeId(1)), None);
        assert!(topology.is_leaf(&NodeId(3)));
        assert!(topology.children(&NodeId(42)).is_empty());
    }

    #[test]
    fn latency_is_symmetric_and_adjacent_only() {
        let topology = binary_tree();
        assert_eq!(topology.link_latency(&NodeId(2), &NodeId(5)), Some(L));
        assert_eq!(topology.link_latency(&NodeId(5), &NodeId(2)), Some(L));
        assert_eq!(topology.link_latency(&NodeId(1), &NodeId(5)), None);
        assert_eq!(topology.link_latency(&NodeId(3), &NodeId(4)), None);
    }

    #[test]
    fn depth_and_critical_path() {
        let topology = binary_tree();
        assert_eq!(topology.depth(), 2);
        assert_eq!(topology.depth_of(&NodeId(4)), Some(2));
        assert_eq!(topology.latency_to_root(&NodeId(4)), Some(L * 2));
        assert_eq!(topology.critical_path_latency(), L * 2);

        let chain = Topology::chain(32, L).unwrap();
        assert_eq!(chain.depth(), 31);
        assert_eq!(chain.critical_path_latency(), L * 31);
    }

    #[test]
    fn subtree_collects_descendants() {
        let topology = binary_tree();
        assert_eq!(
            topology.subtree(&NodeId(2)),
            BTreeSet::from([NodeId(2), NodeId(4), NodeId(5)])
        );
        assert_eq!(topology.subtree(&NodeId(1)).len(), 5);
        assert_eq!(topology.subtree(&NodeId(3)), BTreeSet::from([NodeId(3)]));
        assert!(topology.subtree(&NodeId(9)).is_empty());
    }

    #[test]
    fn bitmap_round_trips_signer_sets() {
        let topology = Topology::chain(10, L).unwrap();
        let signers = BTreeSet::from([NodeId(1), NodeId(2), NodeId(8), NodeId(9), NodeId(10)]);

        let bitmap = topology.signer_bitmap(&signers);
        assert_eq!(bitmap, vec![0b1000_0011, 0b0000_0011]);
        assert_eq!(topology.signers_from_bitmap(&bitmap), signers);
        assert_eq!(topology.position(&NodeId(10)), Some(9));
    }
}
