//! Forwarding table: a trie keyed by coord prefix, precomputed once after
//! convergence, plus the fast and reference-slow lookup procedures.

use crate::path_record::{tree_dist, NodeId, PathRecord};
use std::collections::BTreeMap;

/// One level of the coord-prefix trie. Each edge is labelled by the next
/// coord and stores the next-hop node id chosen for that prefix, alongside
/// the child level reached by continuing down that coord.
#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: BTreeMap<NodeId, (NodeId, TrieNode)>,
}

/// Precomputed greedy-routing forwarding table for one node.
#[derive(Debug, Default, Clone)]
pub struct ForwardingTrie {
    root: TrieNode,
}

impl ForwardingTrie {
    /// Build a table from this node's current peer set.
    ///
    /// `parent` is `self.coords[-2]` if the node has a parent, else `None`
    /// (the node is itself the tree root).
    pub fn build(parent: Option<NodeId>, peers: &BTreeMap<NodeId, PathRecord>) -> Self {
        let mut trie = Self::default();
        for peer in peers.values() {
            trie.insert_peer(peer, parent, peers);
        }
        trie
    }

    fn insert_peer(
        &mut self,
        peer: &PathRecord,
        parent: Option<NodeId>,
        peers: &BTreeMap<NodeId, PathRecord>,
    ) {
        let mut current = &mut self.root;
        let peer_is_parent = parent == Some(peer.node_id);
        for coord in &peer.coords {
            let slot = current
                .children
                .entry(*coord)
                .or_insert_with(|| (peer.node_id, TrieNode::default()));

            let overwrite = if peer_is_parent {
                true
            } else if slot.0 == peer.node_id {
                true
            } else {
                match peers.get(&slot.0) {
                    Some(existing) => {
                        if peer.coords.len() < existing.coords.len() {
                            true
                        } else {
                            peer.coords.len() == existing.coords.len()
                                && peer.degree > existing.degree
                        }
                    }
                    None => true,
                }
            };

            if overwrite {
                slot.0 = peer.node_id;
            }
            current = &mut slot.1;
        }
    }

    /// Fast next-hop lookup for a destination's coords.
    ///
    /// Returns `self_id` as a stranded-root sentinel when this node has no
    /// parent and the walk finds no matching prefix at all (a disconnected
    /// component's would-be root).
    pub fn next_hop(
        &self,
        parent: Option<NodeId>,
        peer_ids: impl Iterator<Item = NodeId>,
        dest_coords: &[NodeId],
        self_id: NodeId,
    ) -> NodeId {
        let peer_ids: std::collections::BTreeSet<NodeId> = peer_ids.collect();
        let mut current = &self.root;
        let mut current_hop = parent;
        let mut stopped_at: Option<NodeId> = None;

        for &coord in dest_coords {
            stopped_at = Some(coord);
            match current.children.get(&coord) {
                Some((hop, child)) => {
                    current_hop = Some(*hop);
                    current = child;
                }
                None => break,
            }
        }

        if let Some(c) = stopped_at {
            if peer_ids.contains(&c) {
                return c;
            }
        }

        current_hop.unwrap_or(self_id)
    }
}

/// Reference slow lookup, scanning all peers directly. Used in tests to
/// cross-check the fast table on a converged network; both must agree.
pub fn slow_lookup(peers: &BTreeMap<NodeId, PathRecord>, dest: &PathRecord) -> Option<NodeId> {
    let mut best: Option<&PathRecord> = None;
    let mut best_dist = 0i64;
    let mut best_deg = 0usize;

    for candidate in peers.values() {
        let dist = (candidate.path.len() as i64 - 1) + tree_dist(&candidate.coords, &dest.coords);
        let deg = candidate.degree;
        let better = match best {
            None => true,
            Some(_) => dist < best_dist || (dist == best_dist && deg > best_deg),
        };
        if better {
            best = Some(candidate);
            best_dist = dist;
            best_deg = deg;
        }
    }

    best.map(|rec| rec.path[rec.path.len() - 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_record::TreeId;

    fn peer(id: u64, coords: Vec<u64>, degree: usize) -> PathRecord {
        let node_id = NodeId::new(id);
        PathRecord {
            node_id,
            tree_id: TreeId::new(id),
            coords: coords.into_iter().map(NodeId::new).collect(),
            tstamp: 0,
            degree,
            path: vec![NodeId::new(id), NodeId::new(id)], // placeholder 2-hop path
            time: 0,
        }
    }

    #[test]
    fn parent_wins_unconditionally_even_overwriting_a_better_entry() {
        let mut peers = BTreeMap::new();
        // Node 1 (not our parent) claims the coord-0 prefix first, with
        // high degree. Node 5 IS our parent and is processed after it
        // (peers iterate in ascending NodeId order) — rule 1 says the
        // parent overwrites the slot regardless of rules 2/3.
        peers.insert(NodeId::new(1), peer(1, vec![0, 1], 9));
        peers.insert(NodeId::new(5), peer(5, vec![0, 5], 0));
        let table = ForwardingTrie::build(Some(NodeId::new(5)), &peers);
        // Query a coord not present as any peer's own id, so the short-
        // circuit never fires and we actually exercise the trie decision.
        let hop = table.next_hop(
            Some(NodeId::new(5)),
            peers.keys().copied(),
            &[NodeId::new(0)],
            NodeId::new(99),
        );
        assert_eq!(hop, NodeId::new(5));
    }

    #[test]
    fn shortest_coords_wins_tie_break_by_degree() {
        let mut peers = BTreeMap::new();
        peers.insert(NodeId::new(1), peer(1, vec![0, 5], 1));
        peers.insert(NodeId::new(2), peer(2, vec![0, 5], 9));
        let table = ForwardingTrie::build(None, &peers);
        let hop = table.next_hop(
            None,
            peers.keys().copied(),
            &[NodeId::new(0), NodeId::new(5)],
            NodeId::new(99),
        );
        // Equal length coords, peer 2 has higher degree, wins.
        assert_eq!(hop, NodeId::new(2));
    }

    #[test]
    fn direct_peer_short_circuit() {
        let mut peers = BTreeMap::new();
        peers.insert(NodeId::new(7), peer(7, vec![0, 3, 7], 2));
        let table = ForwardingTrie::build(None, &peers);
        let hop = table.next_hop(
            None,
            peers.keys().copied(),
            &[NodeId::new(0), NodeId::new(3), NodeId::new(7)],
            NodeId::new(99),
        );
        assert_eq!(hop, NodeId::new(7));
    }

    #[test]
    fn stranded_root_returns_self_sentinel() {
        let peers: BTreeMap<NodeId, PathRecord> = BTreeMap::new();
        let table = ForwardingTrie::build(None, &peers);
        let hop = table.next_hop(None, peers.keys().copied(), &[NodeId::new(4)], NodeId::new(42));
        assert_eq!(hop, NodeId::new(42));
    }
}
