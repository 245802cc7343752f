//! Active-node quorum calculation.
//!
//! The required majority is derived from the [`ActiveSet`] reported by the
//! failure detector, not from the static cluster size. Decisions are local
//! and advisory: leadership still requires a strictly higher term and votes
//! actually received.

use {
    crate::{failure_detector::ActiveSet, types::NodeId},
    std::collections::HashSet,
};

/// Majority needed among `active` nodes: `floor(active / 2) + 1`, at least 1.
pub fn required_majority(active: usize) -> usize {
    (active / 2).saturating_add(1).max(1)
}

/// Derived view of a quorum decision. Recomputed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MajoritySnapshot {
    pub active_node_count: usize,
    pub required_majority: usize,
    pub has_quorum: bool,
}

impl MajoritySnapshot {
    /// Snapshot for a set where every active node counts as acknowledging.
    pub fn from_active(active: &ActiveSet) -> Self {
        evaluate(active.len(), active)
    }
}

/// Evaluate `ack_count` against a single, consistent active-set snapshot.
pub fn evaluate(ack_count: usize, active: &ActiveSet) -> MajoritySnapshot {
    let active_node_count = active.len();
    let required = required_majority(active_node_count);
    MajoritySnapshot {
        active_node_count,
        required_majority: required,
        has_quorum: ack_count >= required,
    }
}

/// Count acknowledgements from members of `active`. Acks from nodes outside
/// the snapshot are ignored.
pub fn count_acks<'a>(acks: impl IntoIterator<Item = &'a NodeId>, active: &ActiveSet) -> usize {
    acks.into_iter()
        .filter(|node| active.contains(node))
        .collect::<HashSet<_>>()
        .len()
}
