use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    time::Duration,
};

use types::NodeId;

use crate::{Placement, Topology, errors::TopologyError};

#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    root: NodeId,
    links: Vec<(NodeId, NodeId, Duration)>,
}

impl TopologyBuilder {
    #[must_use]
    pub const fn new(root: NodeId) -> Self {
        Self {
            root,
            links: Vec::new(),
        }
    }

    #[must_use]
    pub fn link(mut self, parent: NodeId, child: NodeId, latency: Duration) -> Self {
        self.add_link(parent, child, latency);
        self
    }

    pub fn add_link(&mut self, parent: NodeId, child: NodeId, latency: Duration) -> &mut Self {
        self.links.push((parent, child, latency));
        self
    }

    pub fn build(self) -> Result<Topology, TopologyError> {
        let mut parents: BTreeMap<NodeId, (NodeId, Duration)> = BTreeMap::new();
        let mut children: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut known = BTreeSet::from([self.root]);

        for (parent, child, latency) in self.links {
            if parent == child {
                return Err(TopologyError::SelfLink(child));
            }
            if child == self.root {
                return Err(TopologyError::RootHasParent(child));
            }
            if parents.insert(child, (parent, latency)).is_some() {
                return Err(TopologyError::MultipleParents(child));
            }
            children.entry(parent).or_default().insert(child);
            known.insert(parent);
            known.insert(child);
        }

        // Breadth-first from the root; anything left over hangs off a
        // detached parent or sits on a cycle.
        let mut nodes = BTreeMap::new();
        let mut queue = VecDeque::from([(self.root, 0usize, Duration::ZERO)]);
        while let Some((node, depth, root_latency)) = queue.pop_front() {
            let node_children = children.remove(&node).unwrap_or_default();
            for child in &node_children {
                if let Some((_, latency)) = parents.get(child) {
                    queue.push_back((*child, depth + 1, root_latency + *latency));
                }
            }
            nodes.insert(
                node,
                Placement {
                    parent: parents.get(&node).copied(),
                    children: node_children,
                    depth,
                    root_latency,
                },
            );
        }

        let unreachable: Vec<NodeId> = known
            .into_iter()
            .filter(|node| !nodes.contains_key(node))
            .collect();
        if !unreachable.is_empty() {
            return Err(TopologyError::Unreachable(unreachable));
        }

        Ok(Topology {
            root: self.root,
            nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const L: Duration = Duration::from_millis(10);

    #[test]
    fn single_node_topology_is_valid() {
        let topology = TopologyBuilder::new(NodeId(1)).build().unwrap();
        assert_eq!(topology.len(), 1);
        assert_eq!(topology.depth(), 0);
        assert!(topology.is_leaf(&NodeId(1)));
    }

    #[test]
    fn mixed_latencies_accumulate_towards_root() {
        let topology = TopologyBuilder::new(NodeId(1))
            .link(NodeId(1), NodeId(2), Duration::from_millis(5))
            .link(NodeId(2), NodeId(3), Duration::from_millis(20))
            .link(NodeId(1), NodeId(4), Duration::from_millis(3))
            .build()
            .unwrap();

        assert_eq!(
            topology.latency_to_root(&NodeId(3)),
            Some(Duration::from_millis(25))
        );
        assert_eq!(topology.critical_path_latency(), Duration::from_millis(25));
        assert_eq!(topology.depth(), 2);
    }

    #[test]
    fn rejects_self_links_and_root_parents() {
        let err = TopologyBuilder::new(NodeId(1))
            .link(NodeId(2), NodeId(2), L)
            .build()
            .unwrap_err();
        assert_eq!(err, TopologyError::SelfLink(NodeId(2)));

        let err = TopologyBuilder::new(NodeId(1))
            .link(NodeId(1), NodeId(2), L)
            .link(NodeId(2), NodeId(1), L)
            .build()
            .unwrap_err();
        assert_eq!(err, TopologyError::RootHasParent(NodeId(1)));
    }

    #[test]
    fn rejects_second_parent() {
        let err = TopologyBuilder::new(NodeId(1))
            .link(NodeId(1), NodeId(2), L)
            .link(NodeId(1), NodeId(3), L)
            .link(NodeId(3), NodeId(2), L)
            .build()
            .unwrap_err();
        assert_eq!(err, TopologyError::MultipleParents(NodeId(2)));
    }

    #[test]
    fn rejects_cycles_and_detached_nodes() {
        let err = TopologyBuilder::new(NodeId(1))
            .link(NodeId(1), NodeId(2), L)
            .link(NodeId(3), NodeId(4), L)
            .link(NodeId(4), NodeId(3), L)
            .build()
            .unwrap_err();
        assert_eq!(err, TopologyError::Unreachable(vec![NodeId(3), NodeId(4)]));

        let err = TopologyBuilder::new(NodeId(1))
            .link(NodeId(7), NodeId(8), L)
            .build()
            .unwrap_err();
        assert_eq!(err, TopologyError::Unreachable(vec![NodeId(7), NodeId(8)]));
    }
}
