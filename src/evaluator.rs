//! Stretch evaluation and routing-state size accounting over a converged
//! network, scored against the [`DistanceOracle`].

use crate::node_state::NodeStore;
use crate::oracle::DistanceOracle;
use crate::path_record::NodeId;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// One bucket of the stretch histogram: how many source/destination pairs
/// had this exact `(oracle_hops, routed_hops)` pairing.
pub type StretchHistogram = BTreeMap<(u16, u16), u64>;

/// Aggregate statistics for one size distribution (peer counts, cert
/// counts, etc.), reported rather than the raw per-node vector.
#[derive(Debug, Clone, Serialize)]
pub struct SizeStats {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
}

impl SizeStats {
    fn from_values(values: &[u64]) -> Self {
        if values.is_empty() {
            return Self { min: 0, max: 0, avg: 0.0 };
        }
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        let avg = values.iter().sum::<u64>() as f64 / values.len() as f64;
        Self { min, max, avg }
    }
}

/// Full per-run report: stretch plus every routing-state size distribution
/// the original reference tooling collects.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub avg_stretch: f64,
    pub max_stretch: f64,
    pub pairs_evaluated: u64,
    pub pairs_skipped_disconnected: u64,
    pub peer_counts: SizeStats,
    pub cert_counts: SizeStats,
    pub min_link_cert_counts: SizeStats,
    pub path_sizes: SizeStats,
    /// `(oracle_hops, routed_hops, count)`, sorted ascending by both keys —
    /// the format the `<graph>-<rootID>` histogram file is written from.
    pub histogram: Vec<(u16, u16, u64)>,
}

/// Build the `N x N` next-hop cache for a converged store: `cache[s][d]` is
/// the next hop node `s` would forward to for destination `d`'s coords.
/// Self-pairs return the destination itself.
pub fn build_next_hop_cache(store: &NodeStore, oracle: &DistanceOracle) -> Vec<Vec<NodeId>> {
    let n = oracle.n;
    let mut cache = vec![Vec::with_capacity(n); n];

    for (s_idx, &s_id) in oracle.ids.iter().enumerate() {
        let state = store.get(s_id).expect("oracle ids come from the same store");
        let table = state.table.as_ref().expect("store must be converged before evaluation");
        let parent = if state.self_record.coords.len() >= 2 {
            Some(state.self_record.coords[state.self_record.coords.len() - 2])
        } else {
            None
        };
        let peer_ids: Vec<NodeId> = state.peers.keys().copied().collect();

        for (d_idx, &d_id) in oracle.ids.iter().enumerate() {
            let hop = if s_idx == d_idx {
                d_id
            } else {
                let dest_coords = &store
                    .get(d_id)
                    .expect("oracle ids come from the same store")
                    .self_record
                    .coords;
                table.next_hop(parent, peer_ids.iter().copied(), dest_coords, s_id)
            };
            cache[s_idx].push(hop);
        }
    }

    cache
}

/// Count forwarding steps from `source_idx` to `dest_idx` using the
/// next-hop cache, stopping once the destination is reached or the cap is
/// exceeded (a non-terminating table is a bug, not a valid network state).
fn routed_hops(cache: &[Vec<NodeId>], ids: &[NodeId], source_idx: usize, dest_idx: usize, cap: usize) -> Option<u16> {
    if source_idx == dest_idx {
        return Some(0);
    }
    let index_of: BTreeMap<NodeId, usize> =
        ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let mut current = source_idx;
    let mut hops = 0u16;
    for _ in 0..cap {
        let next_id = cache[current][dest_idx];
        let next_idx = *index_of.get(&next_id)?;
        hops += 1;
        if next_idx == dest_idx {
            return Some(hops);
        }
        if next_idx == current {
            // next_hop returned the stranded-root sentinel (self): drop.
            return None;
        }
        current = next_idx;
    }
    None
}

/// Score a converged store against the oracle: stretch histogram, average
/// and maximum stretch (over reachable pairs only), plus the size
/// distributions the original tooling tracks.
pub fn evaluate(store: &NodeStore, oracle: &DistanceOracle) -> EvaluationReport {
    let cache = build_next_hop_cache(store, oracle);
    let n = oracle.n;
    let cap = n + 1;

    let mut histogram: StretchHistogram = BTreeMap::new();
    let mut pairs_evaluated = 0u64;
    let mut pairs_skipped = 0u64;
    let mut oracle_sum = 0u64;
    let mut routed_sum = 0u64;
    let mut max_stretch = 0.0f64;

    for s in 0..n {
        for d in 0..n {
            if s == d {
                continue;
            }
            let oracle_dist = oracle.get(s, d);
            if oracle_dist == 0 {
                pairs_skipped += 1;
                continue;
            }
            // Source-routed traffic takes the shorter of the two directions.
            let forward = routed_hops(&cache, &oracle.ids, s, d, cap);
            let backward = routed_hops(&cache, &oracle.ids, d, s, cap);
            let routed = match (forward, backward) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => continue,
            };

            *histogram.entry((oracle_dist, routed)).or_insert(0) += 1;
            pairs_evaluated += 1;
            oracle_sum += oracle_dist as u64;
            routed_sum += routed as u64;
            let stretch = routed as f64 / oracle_dist as f64;
            if stretch > max_stretch {
                max_stretch = stretch;
            }
        }
    }

    let avg_stretch = if oracle_sum > 0 {
        routed_sum as f64 / oracle_sum as f64
    } else {
        0.0
    };

    let peer_counts: Vec<u64> = store.iter().map(|(_, s)| s.peers.len() as u64).collect();
    let cert_counts: Vec<u64> = store.iter().map(|(_, s)| node_cert_count(s) as u64).collect();
    let min_link_cert_counts: Vec<u64> = store
        .iter()
        .flat_map(|(_, s)| min_link_cert_sizes(s))
        .collect();
    let path_sizes: Vec<u64> = store
        .iter()
        .map(|(_, s)| s.peers.values().map(|p| (p.coords.len() + p.path.len() - 1) as u64).sum())
        .collect();

    EvaluationReport {
        avg_stretch,
        max_stretch,
        pairs_evaluated,
        pairs_skipped_disconnected: pairs_skipped,
        peer_counts: SizeStats::from_values(&peer_counts),
        cert_counts: SizeStats::from_values(&cert_counts),
        min_link_cert_counts: SizeStats::from_values(&min_link_cert_counts),
        path_sizes: SizeStats::from_values(&path_sizes),
        histogram: histogram.into_iter().map(|((o, r), c)| (o, r, c)).collect(),
    }
}

type Cert = (NodeId, Vec<NodeId>);

/// Per-hop certificates implied by one peer's advertised `coords ++
/// path[1:]` chain: each hop along the root-to-peer-to-self path is signed
/// by its sender and commits to the path up to the next hop.
fn peer_certs(state: &crate::node_state::NodeState, peer: &crate::path_record::PathRecord) -> HashSet<Cert> {
    let mut hops = peer.coords.clone();
    hops.extend(peer.path.iter().skip(1).copied());

    let mut certs = HashSet::new();
    for hop_idx in 0..hops.len().saturating_sub(1) {
        let sender = hops[hop_idx];
        if sender == state.self_record.node_id {
            continue;
        }
        let path = hops[0..hop_idx + 2].to_vec();
        certs.insert((sender, path));
    }
    certs
}

/// Total distinct certificates a node holds across its whole peer table,
/// de-duplicating certs shared by multiple peers through a common prefix.
fn node_cert_count(state: &crate::node_state::NodeState) -> usize {
    let mut all: HashSet<Cert> = HashSet::new();
    for peer in state.peers.values() {
        all.extend(peer_certs(state, peer));
    }
    all.len()
}

/// Per-link lower bound on certs that must cross that link: for each peer,
/// count only the certs that peer alone contributes (not duplicated by any
/// other peer's chain), contributing one frequency-distribution entry per
/// peer link.
fn min_link_cert_sizes(state: &crate::node_state::NodeState) -> Vec<u64> {
    let per_peer: BTreeMap<NodeId, HashSet<Cert>> = state
        .peers
        .values()
        .map(|peer| (peer.node_id, peer_certs(state, peer)))
        .collect();

    per_peer
        .iter()
        .map(|(peer_id, certs)| {
            let required = certs
                .iter()
                .filter(|cert| {
                    per_peer
                        .iter()
                        .all(|(other_id, other_certs)| other_id == peer_id || !other_certs.contains(*cert))
                })
                .count();
            required as u64
        })
        .collect()
}
