//! Ground-truth all-pairs shortest path distances, computed independently
//! of the tree protocol, used to score the simulated routing's stretch.

use crate::node_state::NodeStore;
use crate::path_record::NodeId;
use rayon::prelude::*;
use std::collections::VecDeque;

/// Dense `N x N` distance matrix, row-major (`source_idx * n + dest_idx`).
/// A `0` between distinct indices means the pair is in different connected
/// components (unit-weight BFS never needs a real zero otherwise).
pub struct DistanceOracle {
    pub ids: Vec<NodeId>,
    pub n: usize,
    distances: Vec<u16>,
}

impl DistanceOracle {
    pub fn get(&self, source_idx: usize, dest_idx: usize) -> u16 {
        self.distances[source_idx * self.n + dest_idx]
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.ids.iter().position(|&x| x == id)
    }
}

/// Compute all-pairs distances with unit edge weight over the store's link
/// graph. Each source's row is an independent breadth-first search, so
/// rows are computed in parallel; the store itself is only read, never
/// mutated, making this safe to fan out across threads.
pub fn compute(store: &NodeStore) -> DistanceOracle {
    let ids: Vec<NodeId> = store.node_ids().collect();
    let n = ids.len();
    let index: std::collections::HashMap<NodeId, usize> =
        ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let adjacency: Vec<Vec<usize>> = ids
        .iter()
        .map(|&id| {
            store
                .get(id)
                .expect("id came from node_ids()")
                .links
                .iter()
                .map(|neighbor| index[neighbor])
                .collect()
        })
        .collect();

    let rows: Vec<Vec<u16>> = (0..n)
        .into_par_iter()
        .map(|source| bfs_row(source, n, &adjacency))
        .collect();

    let mut distances = vec![0u16; n * n];
    for (source, row) in rows.into_iter().enumerate() {
        distances[source * n..(source + 1) * n].copy_from_slice(&row);
    }

    DistanceOracle { ids, n, distances }
}

fn bfs_row(source: usize, n: usize, adjacency: &[Vec<usize>]) -> Vec<u16> {
    let mut dist = vec![0u16; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();

    visited[source] = true;
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        for &neighbor in &adjacency[node] {
            if !visited[neighbor] {
                visited[neighbor] = true;
                dist[neighbor] = dist[node] + 1;
                queue.push_back(neighbor);
            }
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_record::TreeId;

    #[test]
    fn line_of_three_has_correct_distances() {
        let mut store = NodeStore::new();
        store.insert(NodeId::new(0), TreeId::new(0));
        store.insert(NodeId::new(1), TreeId::new(1));
        store.insert(NodeId::new(2), TreeId::new(2));
        store.link(NodeId::new(0), NodeId::new(1)).unwrap();
        store.link(NodeId::new(1), NodeId::new(2)).unwrap();

        let oracle = compute(&store);
        let a = oracle.index_of(NodeId::new(0)).unwrap();
        let b = oracle.index_of(NodeId::new(2)).unwrap();
        assert_eq!(oracle.get(a, b), 2);
        assert_eq!(oracle.get(a, a), 0);
    }

    #[test]
    fn disconnected_pair_reports_zero() {
        let mut store = NodeStore::new();
        store.insert(NodeId::new(0), TreeId::new(0));
        store.insert(NodeId::new(1), TreeId::new(1));

        let oracle = compute(&store);
        let a = oracle.index_of(NodeId::new(0)).unwrap();
        let b = oracle.index_of(NodeId::new(1)).unwrap();
        assert_eq!(oracle.get(a, b), 0);
    }

    #[test]
    fn distances_are_symmetric() {
        let mut store = NodeStore::new();
        for i in 0..5u64 {
            store.insert(NodeId::new(i), TreeId::new(i));
        }
        store.link(NodeId::new(0), NodeId::new(1)).unwrap();
        store.link(NodeId::new(1), NodeId::new(2)).unwrap();
        store.link(NodeId::new(2), NodeId::new(3)).unwrap();
        store.link(NodeId::new(3), NodeId::new(4)).unwrap();
        store.link(NodeId::new(4), NodeId::new(0)).unwrap();

        let oracle = compute(&store);
        for a in 0..oracle.n {
            for b in 0..oracle.n {
                assert_eq!(oracle.get(a, b), oracle.get(b, a));
            }
        }
    }
}
