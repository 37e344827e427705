//! The tree state machine: root election, stale-state cleanup, and message
//! handling for a single node's `tick()` / `drain_inbox()` pair.
//!
//! The simulation driver runs every node's `tick()` before any node's
//! `drain_inbox()` within a step; this module only ever touches one
//! [`NodeState`] at a time and returns the outgoing broadcast (if any) so
//! the driver can clone it into neighbors' inboxes between the two phases.

use crate::node_state::{Message, NodeState};
use tracing::trace;

/// Ticks every `TIMEOUT` worth of real time drive refresh and root timeout.
pub const TIMEOUT: u64 = 60;
/// Uniform per-hop cost used by the oracle and the simulation's own bookkeeping.
pub const LINK_COST: u64 = 1;

/// Advance a node's local clock by one step.
///
/// Returns `(changed, broadcast)`: `changed` is true if root adoption state
/// moved (per `clean_root`); `broadcast` is the `(self, root)` message
/// template to send to every link, present only on refresh ticks.
pub fn tick(state: &mut NodeState) -> (bool, Option<Message>) {
    state.self_record.time += 1;

    if state.self_record.time > state.self_record.tstamp + TIMEOUT / 4 {
        state.self_record.tstamp = state.self_record.time;
        state.self_record.degree = state.peers.len();
    }

    let root_changed = clean_root(state);
    clean_dropped(state);

    let broadcast = if state.self_record.tstamp == state.self_record.time {
        let root = state.root.clone().expect("clean_root always leaves root populated");
        Some((state.self_record.clone(), root))
    } else {
        None
    };

    (root_changed, broadcast)
}

/// Expire a stale root, or (re)elect self when no better root is held.
///
/// Returns whether the node's accepted root changed identity this call.
pub fn clean_root(state: &mut NodeState) -> bool {
    let mut changed = false;

    if let Some(root) = &state.root {
        if state.self_record.time.saturating_sub(root.time) > TIMEOUT {
            let expired = state.root.take().unwrap();
            state.drop.insert(expired.tree_id, expired);
            changed = true;
        }
    }

    let should_self_elect = match &state.root {
        None => true,
        Some(root) => root.tree_id < state.self_record.tree_id,
    };

    if should_self_elect {
        state.self_record.coords = vec![state.self_record.node_id];
        state.root = Some(state.self_record.clone());
        changed = true;
    } else if let Some(root) = &state.root {
        if root.tree_id == state.self_record.tree_id {
            state.root = Some(state.self_record.clone());
        }
    }

    changed
}

/// Evict drop-table entries that have aged past the retention window.
pub fn clean_dropped(state: &mut NodeState) {
    let now = state.self_record.time;
    state
        .drop
        .retain(|_, entry| now.saturating_sub(entry.time) <= 4 * TIMEOUT);
}

/// Drain every queued message, LIFO, applying `handle_message` to each.
///
/// Returns the logical-or of every message's adoption outcome.
pub fn drain_inbox(state: &mut NodeState) -> bool {
    let mut changed = false;
    while let Some(msg) = state.inbox.pop() {
        changed |= handle_message(state, msg);
    }
    changed
}

/// Process one received `(sender, root_adv)` message.
fn handle_message(state: &mut NodeState, (mut sender, mut root_adv): Message) -> bool {
    let self_id = state.self_record.node_id;
    let now = state.self_record.time;

    sender.path.push(self_id);
    sender.time = now;
    root_adv.path.push(self_id);
    root_adv.time = now;

    state.peers.insert(sender.node_id, sender.clone());

    if should_adopt(state, &sender, &root_adv) {
        let path_changed = state
            .root
            .as_ref()
            .map(|r| r.path != root_adv.path)
            .unwrap_or(true);
        state.self_record.coords = root_adv.path.clone();
        state.root = Some(root_adv);
        path_changed
    } else {
        false
    }
}

fn should_adopt(state: &NodeState, sender: &crate::path_record::PathRecord, root_adv: &crate::path_record::PathRecord) -> bool {
    // Rule 1: reject anything that already routed through us (loop).
    if root_adv.path[..root_adv.path.len() - 1].contains(&state.self_record.node_id) {
        trace!(node = %state.self_record.node_id, "reject root_adv: loop detected");
        return false;
    }

    // Rule 2: suppress a re-advertisement of a root we recently dropped,
    // unless the advertisement is strictly newer than the drop record.
    if let Some(dropped) = state.drop.get(&root_adv.tree_id) {
        if dropped.tstamp >= root_adv.tstamp {
            return false;
        }
    }

    let current_root = match &state.root {
        // Rule 3: no root held yet, always adopt.
        None => return true,
        Some(r) => r,
    };

    // Rule 4: strictly better tree id always wins.
    if current_root.tree_id < root_adv.tree_id {
        return true;
    }

    // Rule 5: different (and not strictly better) tree id never adopted.
    if current_root.tree_id != root_adv.tree_id {
        return false;
    }

    // Rule 6: stale advertisement for the same tree.
    if current_root.tstamp > root_adv.tstamp {
        return false;
    }

    // Rule 7: strictly shorter path to the same root always wins.
    if root_adv.path.len() < current_root.path.len() {
        return true;
    }

    let (is_same_parent, is_better_parent) =
        parent_comparison(state, current_root, sender, root_adv);

    // Rule 8: equal-length path via a higher-degree parent.
    if is_better_parent && root_adv.path.len() == current_root.path.len() {
        return true;
    }

    // Rule 9: same parent re-advertising strictly fresher information.
    if is_same_parent && current_root.tstamp < root_adv.tstamp {
        return true;
    }

    false
}

/// Compute `is_same_parent` / `is_better_parent` against the current root's
/// recorded parent hop, per the handle_message rule table.
fn parent_comparison(
    state: &NodeState,
    current_root: &crate::path_record::PathRecord,
    sender: &crate::path_record::PathRecord,
    root_adv: &crate::path_record::PathRecord,
) -> (bool, bool) {
    if current_root.path.len() < 2 || root_adv.path.len() < 2 {
        return (false, false);
    }
    let parent_id = current_root.path[current_root.path.len() - 2];
    let parent = match state.peers.get(&parent_id) {
        Some(p) => p,
        None => return (false, false),
    };
    let is_same_parent = parent.node_id == sender.node_id;
    let is_better_parent = sender.degree > parent.degree;
    (is_same_parent, is_better_parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_record::{NodeId, TreeId};

    fn fresh(node_id: u64, tree_id: u64) -> NodeState {
        NodeState::new(NodeId::new(node_id), TreeId::new(tree_id))
    }

    #[test]
    fn first_tick_self_elects() {
        let mut s = fresh(1, 1);
        let (changed, _) = tick(&mut s);
        assert!(changed);
        assert_eq!(s.root.as_ref().unwrap().node_id, NodeId::new(1));
        assert_eq!(s.self_record.coords, vec![NodeId::new(1)]);
    }

    #[test]
    fn refresh_happens_on_schedule() {
        let mut s = fresh(1, 1);
        // tstamp starts at 0; refresh triggers once time > tstamp + TIMEOUT/4.
        for _ in 0..(TIMEOUT / 4) {
            let (_, broadcast) = tick(&mut s);
            assert!(broadcast.is_none());
        }
        let (_, broadcast) = tick(&mut s);
        assert!(broadcast.is_some());
    }

    #[test]
    fn root_expires_after_timeout_and_self_reelects() {
        let mut s = fresh(1, 1);
        tick(&mut s); // self-elect at time=1
        s.self_record.time += TIMEOUT + 1;
        let changed = clean_root(&mut s);
        assert!(changed);
        // the expired record lands in drop, keyed by its own tree id
        assert!(s.drop.contains_key(&TreeId::new(1)));
        assert_eq!(s.root.as_ref().unwrap().node_id, NodeId::new(1));
    }

    #[test]
    fn higher_tree_id_is_adopted_over_self() {
        let mut s = fresh(1, 1);
        tick(&mut s);
        let mut sender = s.self_record.clone();
        sender.node_id = NodeId::new(2);
        let mut root_adv = sender.clone();
        root_adv.tree_id = TreeId::new(99);
        root_adv.path = vec![NodeId::new(2)];
        root_adv.tstamp = s.self_record.time;

        s.inbox.push((sender, root_adv));
        let changed = drain_inbox(&mut s);
        assert!(changed);
        assert_eq!(s.root.as_ref().unwrap().tree_id, TreeId::new(99));
    }

    #[test]
    fn lower_tree_id_is_rejected() {
        let mut s = fresh(5, 10);
        tick(&mut s);
        let mut sender = s.self_record.clone();
        sender.node_id = NodeId::new(2);
        let mut root_adv = sender.clone();
        root_adv.tree_id = TreeId::new(1);
        root_adv.path = vec![NodeId::new(2)];

        s.inbox.push((sender, root_adv));
        let changed = drain_inbox(&mut s);
        assert!(!changed);
        assert_eq!(s.root.as_ref().unwrap().tree_id, TreeId::new(10));
    }

    #[test]
    fn loop_detection_rejects_self_in_path() {
        let mut s = fresh(1, 1);
        tick(&mut s);
        let mut sender = s.self_record.clone();
        sender.node_id = NodeId::new(2);
        let mut root_adv = sender.clone();
        root_adv.tree_id = TreeId::new(99);
        // self already appears in the advertised path (excluding the final hop)
        root_adv.path = vec![NodeId::new(1), NodeId::new(2)];

        s.inbox.push((sender, root_adv));
        let changed = drain_inbox(&mut s);
        assert!(!changed);
        assert_eq!(s.root.as_ref().unwrap().tree_id, TreeId::new(1));
    }

    #[test]
    fn dropped_tree_is_suppressed_until_newer() {
        let mut s = fresh(1, 1);
        tick(&mut s);
        let stale = s.root.clone().unwrap();
        s.drop.insert(TreeId::new(50), {
            let mut d = stale.clone();
            d.tree_id = TreeId::new(50);
            d.tstamp = 10;
            d
        });

        let mut sender = s.self_record.clone();
        sender.node_id = NodeId::new(2);
        let mut root_adv = sender.clone();
        root_adv.tree_id = TreeId::new(50);
        root_adv.tstamp = 5; // not newer than the drop record
        root_adv.path = vec![NodeId::new(2)];

        s.inbox.push((sender, root_adv));
        let changed = drain_inbox(&mut s);
        assert!(!changed);
    }

    #[test]
    fn inbox_drains_lifo() {
        let mut s = fresh(1, 1);
        tick(&mut s);

        let mk = |id: u64, tree: u64, tstamp: u64| {
            let mut sender = s.self_record.clone();
            sender.node_id = NodeId::new(id);
            let mut root_adv = sender.clone();
            root_adv.tree_id = TreeId::new(tree);
            root_adv.tstamp = tstamp;
            root_adv.path = vec![NodeId::new(id)];
            (sender, root_adv)
        };

        // Pushed in order [tree=50, tree=99]; LIFO pop processes tree=99 first,
        // then tree=50 — which must be rejected as a worse tree id.
        s.inbox.push(mk(2, 50, 1));
        s.inbox.push(mk(3, 99, 1));

        drain_inbox(&mut s);
        assert_eq!(s.root.as_ref().unwrap().tree_id, TreeId::new(99));
    }
}
