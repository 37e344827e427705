//! Per-node state: the peer table, drop table, inbox, and link set that
//! together make up everything one node knows about the tree at a given
//! moment.

use crate::error::SimError;
use crate::forwarding::ForwardingTrie;
use crate::path_record::{NodeId, PathRecord, TreeId};
use std::collections::{BTreeMap, BTreeSet};

/// A path record in flight between two directly linked nodes: the record
/// itself plus the sender's own record at send time (used by the receiver
/// to validate the link is still mutual before accepting it).
pub type Message = (PathRecord, PathRecord);

/// Everything one simulated node tracks about itself and its neighborhood.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub self_record: PathRecord,
    /// Best root candidate seen so far, or `None` before the first tick.
    pub root: Option<PathRecord>,
    /// Per-peer best-known record, keyed by peer id.
    pub peers: BTreeMap<NodeId, PathRecord>,
    /// Records temporarily rejected as stale for a given tree id, so a
    /// late-arriving duplicate isn't re-processed every tick.
    pub drop: BTreeMap<TreeId, PathRecord>,
    /// Directly linked neighbor ids (the physical graph, not the tree).
    pub links: BTreeSet<NodeId>,
    /// Messages received but not yet drained this step, LIFO order.
    pub inbox: Vec<Message>,
    /// Precomputed forwarding table, present only once the node has run
    /// `init_table` after convergence.
    pub table: Option<ForwardingTrie>,
}

impl NodeState {
    pub fn new(node_id: NodeId, tree_id: TreeId) -> Self {
        Self {
            self_record: PathRecord::origin(node_id, tree_id),
            root: None,
            peers: BTreeMap::new(),
            drop: BTreeMap::new(),
            links: BTreeSet::new(),
            inbox: Vec::new(),
            table: None,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.self_record.node_id
    }
}

/// The full simulated network: every node's state, keyed by id.
///
/// A plain owned `BTreeMap` rather than a shared `Arc<RwLock<_>>` table,
/// since this is a synchronous in-process simulation with no real wire
/// protocol — ticking and draining are driven sequentially by
/// `simulation.rs`, never from multiple threads at once.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: BTreeMap<NodeId, NodeState>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, node_id: NodeId, tree_id: TreeId) {
        self.nodes.insert(node_id, NodeState::new(node_id, tree_id));
    }

    /// Add a symmetric link between two already-inserted nodes.
    pub fn link(&mut self, a: NodeId, b: NodeId) -> Result<(), SimError> {
        if a == b {
            return Ok(());
        }
        if !self.nodes.contains_key(&a) {
            return Err(SimError::DanglingLink(a.0));
        }
        if !self.nodes.contains_key(&b) {
            return Err(SimError::DanglingLink(b.0));
        }
        self.nodes.get_mut(&a).unwrap().links.insert(b);
        self.nodes.get_mut(&b).unwrap().links.insert(a);
        Ok(())
    }

    /// All node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeState> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeState> {
        self.nodes.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeState)> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut NodeState)> {
        self.nodes.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_is_symmetric() {
        let mut store = NodeStore::new();
        store.insert(NodeId::new(1), TreeId::new(1));
        store.insert(NodeId::new(2), TreeId::new(2));
        store.link(NodeId::new(1), NodeId::new(2)).unwrap();
        assert!(store.get(NodeId::new(1)).unwrap().links.contains(&NodeId::new(2)));
        assert!(store.get(NodeId::new(2)).unwrap().links.contains(&NodeId::new(1)));
    }

    #[test]
    fn link_to_missing_node_errors() {
        let mut store = NodeStore::new();
        store.insert(NodeId::new(1), TreeId::new(1));
        let err = store.link(NodeId::new(1), NodeId::new(2)).unwrap_err();
        assert!(matches!(err, SimError::DanglingLink(2)));
    }

    #[test]
    fn self_loop_is_a_no_op() {
        let mut store = NodeStore::new();
        store.insert(NodeId::new(1), TreeId::new(1));
        store.link(NodeId::new(1), NodeId::new(1)).unwrap();
        assert!(store.get(NodeId::new(1)).unwrap().links.is_empty());
    }

    #[test]
    fn node_ids_are_sorted() {
        let mut store = NodeStore::new();
        store.insert(NodeId::new(5), TreeId::new(5));
        store.insert(NodeId::new(1), TreeId::new(1));
        store.insert(NodeId::new(3), TreeId::new(3));
        let ids: Vec<NodeId> = store.node_ids().collect();
        assert_eq!(ids, vec![NodeId::new(1), NodeId::new(3), NodeId::new(5)]);
    }
}
