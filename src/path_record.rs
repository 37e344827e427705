//! Path records: the unit of routing information exchanged between peers.
//!
//! A `PathRecord` describes one node's advertised position in the spanning
//! tree at the moment it was stamped. Records are cloned on every send so
//! that a receiver appending to `path` never mutates the sender's own copy
//! (see the deep-clone discipline in the design notes).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node identifier. Every loader in `loader.rs` ultimately produces a
/// small dense integer space, so a `u64` newtype is used rather than a
/// generic comparable type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shadow of `NodeId` used for root election. Normally equal to the node's
/// own id; a loader may bias a chosen root's `TreeId` upward (by
/// `ROOT_BIAS`) so that it always wins election regardless of the raw id
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TreeId(pub u64);

impl TreeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn from_node(id: NodeId) -> Self {
        Self(id.0)
    }

    /// Offset applied to force a designated node to win root election.
    pub const ROOT_BIAS: u64 = 1_000_000_000;

    pub fn biased(self) -> Self {
        Self(self.0 + Self::ROOT_BIAS)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node's advertised position in the tree, plus the hop history the
/// record has physically traversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    pub node_id: NodeId,
    pub tree_id: TreeId,
    /// Position in the tree: root down to `node_id`, inclusive of both ends.
    pub coords: Vec<NodeId>,
    /// Freshness counter set by the origin.
    pub tstamp: u64,
    /// Origin's peer count as of the last refresh (tie-breaker).
    pub degree: usize,
    /// Hops the record has physically traversed; origin at index 0.
    pub path: Vec<NodeId>,
    /// Local receiver's clock value when this record was last refreshed.
    pub time: u64,
}

impl PathRecord {
    /// A node's own record at creation: root of its own singleton tree.
    pub fn origin(node_id: NodeId, tree_id: TreeId) -> Self {
        Self {
            node_id,
            tree_id,
            coords: vec![node_id],
            tstamp: 0,
            degree: 0,
            path: vec![node_id],
            time: 0,
        }
    }

    /// True iff this record has never left its origin (`path == [node_id]`).
    pub fn is_own(&self) -> bool {
        self.path.len() == 1 && self.path[0] == self.node_id
    }
}

impl fmt::Display for PathRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PathRecord(id={}, tree={}, coords={:?}, tstamp={})",
            self.node_id, self.tree_id, self.coords, self.tstamp
        )
    }
}

/// Index of the last common ancestor in two coord sequences, or `-1` if
/// their first elements differ (different roots).
fn index_of_lca(a: &[NodeId], b: &[NodeId]) -> i64 {
    let mut lca_idx = -1i64;
    for (idx, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        if x == y {
            lca_idx = idx as i64;
        } else {
            break;
        }
    }
    lca_idx
}

/// Number of tree edges between two coord sequences.
pub fn tree_dist(a: &[NodeId], b: &[NodeId]) -> i64 {
    let lca_idx = index_of_lca(a, b);
    a.len() as i64 + b.len() as i64 - 2 * (lca_idx + 1)
}

impl Eq for PathRecord {}
