//! The simulation driver: seeds a `NodeStore`, runs the tick/drain sweep to
//! convergence, and builds every node's forwarding table.

use crate::error::SimError;
use crate::forwarding::ForwardingTrie;
use crate::node_state::NodeStore;
use crate::tree::{drain_inbox, tick, TIMEOUT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Upper bound on simulation steps before giving up on convergence,
/// expressed as a multiple of node count (spec suggests `100 * N`).
pub const STEP_CAP_FACTOR: u64 = 100;

/// Convergence is declared once this many consecutive idle steps pass
/// with no node reporting a change.
pub const IDLE_WINDOW: u64 = 4 * TIMEOUT;

/// Outcome of a completed run: the converged store plus how long it took.
#[derive(Debug)]
pub struct SimulationReport {
    pub steps: u64,
}

/// Randomize each node's local clock and stamp, per §4.4 initialization.
pub fn seed_clocks(store: &mut NodeStore, rng: &mut StdRng) {
    let ids: Vec<_> = store.node_ids().collect();
    for id in ids {
        let state = store.get_mut(id).expect("id came from node_ids()");
        state.self_record.time = rng.gen_range(0..=TIMEOUT);
        state.self_record.tstamp = TIMEOUT;
    }
}

/// Run the tick/drain sweep until convergence or the step cap is hit.
///
/// Nodes are visited in ascending node-id order in both phases, and the
/// two phases never interleave: every node ticks (possibly enqueuing a
/// broadcast) before any node drains its inbox, so no sender observes a
/// reply produced in the same step.
pub fn run_to_convergence(store: &mut NodeStore) -> Result<SimulationReport, SimError> {
    if store.is_empty() {
        return Err(SimError::EmptyStore);
    }

    let node_count = store.len();
    let step_cap = STEP_CAP_FACTOR * node_count as u64;
    let ids: Vec<_> = store.node_ids().collect();

    let mut step: u64 = 0;
    let mut time_of_last_change: u64 = 0;

    loop {
        let mut changed = false;
        let mut outbox = Vec::new();

        for &id in &ids {
            let state = store.get_mut(id).expect("id came from node_ids()");
            let links: Vec<_> = state.links.iter().copied().collect();
            let (tick_changed, broadcast) = tick(state);
            changed |= tick_changed;
            if let Some(msg) = broadcast {
                outbox.push((links, msg));
            }
        }

        for (links, msg) in outbox {
            for target in links {
                if let Some(neighbor) = store.get_mut(target) {
                    neighbor.inbox.push(msg.clone());
                }
            }
        }

        for &id in &ids {
            let state = store.get_mut(id).expect("id came from node_ids()");
            changed |= drain_inbox(state);
        }

        if changed {
            time_of_last_change = step;
        }

        debug!(step, changed, "simulation step complete");

        if step.saturating_sub(time_of_last_change) >= IDLE_WINDOW {
            info!(steps = step, "converged");
            build_tables(store);
            return Ok(SimulationReport { steps: step });
        }

        step += 1;
        if step > step_cap {
            return Err(SimError::NotConverged {
                steps: step,
                node_count,
            });
        }
    }
}

/// Build every node's forwarding trie from its converged peer set.
fn build_tables(store: &mut NodeStore) {
    let ids: Vec<_> = store.node_ids().collect();
    for id in ids {
        let state = store.get_mut(id).expect("id came from node_ids()");
        let parent = if state.self_record.coords.len() >= 2 {
            Some(state.self_record.coords[state.self_record.coords.len() - 2])
        } else {
            None
        };
        state.table = Some(ForwardingTrie::build(parent, &state.peers));
    }
}
