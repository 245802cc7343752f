//! Heartbeat failure detector.
//!
//! The [`HeartbeatDetector`] tracks when each peer was last heard from and
//! derives a liveness status from the silence since then. It is independent
//! of Raft term and vote bookkeeping: any inbound message counts as contact,
//! whether or not the engine accepts it. The engine only reads the resulting
//! [`ActiveSet`].

use {
    crate::{config::FailureConfig, types::NodeId},
    log::{debug, info},
    std::collections::{BTreeMap, BTreeSet},
};

/// Liveness status of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerStatus {
    Active,
    /// Silent for at least `suspect_after_ms`. Still counted as active.
    Suspected,
    /// Silent for at least `fail_after_ms`. Excluded from the active set.
    Failed,
}

/// Liveness bookkeeping for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLivenessRecord {
    pub peer: NodeId,
    /// Time (ms) of the last message received from this peer.
    pub last_contact: u64,
    pub status: PeerStatus,
}

/// A status transition produced by [`HeartbeatDetector::tick`] or
/// [`HeartbeatDetector::record_contact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub peer: NodeId,
    pub from: PeerStatus,
    pub to: PeerStatus,
}

/// Snapshot of the nodes currently believed reachable, the local node
/// included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSet {
    members: BTreeSet<NodeId>,
}

impl ActiveSet {
    pub fn new(local: NodeId, peers: impl IntoIterator<Item = NodeId>) -> Self {
        let mut members: BTreeSet<NodeId> = peers.into_iter().collect();
        members.insert(local);
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Never true: the local node is always a member.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.members.contains(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.members.iter()
    }
}

/// Tracks per-peer liveness from message arrival times.
#[derive(Debug, Clone)]
pub struct HeartbeatDetector {
    local: NodeId,
    config: FailureConfig,
    records: BTreeMap<NodeId, PeerLivenessRecord>,
}

impl HeartbeatDetector {
    /// Register the static peer list. Every peer starts Active with
    /// `last_contact = now`.
    pub fn new(
        local: NodeId,
        config: FailureConfig,
        peers: impl IntoIterator<Item = NodeId>,
        now: u64,
    ) -> Self {
        let records = peers
            .into_iter()
            .filter(|peer| *peer != local)
            .map(|peer| {
                (
                    peer,
                    PeerLivenessRecord {
                        peer,
                        last_contact: now,
                        status: PeerStatus::Active,
                    },
                )
            })
            .collect();
        Self {
            local,
            config,
            records,
        }
    }

    /// Treat every peer as freshly heard from at `now`.
    pub fn reset(&mut self, now: u64) {
        for record in self.records.values_mut() {
            record.last_contact = now;
            record.status = PeerStatus::Active;
        }
    }

    /// Record that a message from `peer` arrived at `now`.
    ///
    /// Unknown peers are registered on first contact. A Suspected or Failed
    /// peer is restored to Active immediately.
    pub fn record_contact(&mut self, peer: NodeId, now: u64) -> Option<StatusChange> {
        if peer == self.local {
            return None;
        }
        if !self.records.contains_key(&peer) {
            info!("{}: first contact from unregistered peer {}", self.local, peer);
            self.records.insert(
                peer,
                PeerLivenessRecord {
                    peer,
                    last_contact: now,
                    status: PeerStatus::Active,
                },
            );
            return None;
        }
        let record = self.records.get_mut(&peer)?;
        record.last_contact = record.last_contact.max(now);
        if record.status == PeerStatus::Active {
            return None;
        }
        let from = record.status;
        record.status = PeerStatus::Active;
        if from == PeerStatus::Failed {
            info!("{}: peer {} recovered", self.local, peer);
        } else {
            debug!("{}: peer {} no longer suspected", self.local, peer);
        }
        Some(StatusChange {
            peer,
            from,
            to: PeerStatus::Active,
        })
    }

    /// Re-evaluate every peer against the silence thresholds.
    ///
    /// A peer past `fail_after_ms` that was still Active passes through
    /// Suspected in the same call, so both transitions are reported.
    pub fn tick(&mut self, now: u64) -> Vec<StatusChange> {
        let mut changes = Vec::new();
        for record in self.records.values_mut() {
            let silence = now.saturating_sub(record.last_contact);
            if record.status == PeerStatus::Active && silence >= self.config.suspect_after_ms {
                record.status = PeerStatus::Suspected;
                debug!(
                    "{}: peer {} suspected (silent {}ms)",
                    self.local, record.peer, silence
                );
                changes.push(StatusChange {
                    peer: record.peer,
                    from: PeerStatus::Active,
                    to: PeerStatus::Suspected,
                });
            }
            if record.status == PeerStatus::Suspected && silence >= self.config.fail_after_ms {
                record.status = PeerStatus::Failed;
                info!(
                    "{}: peer {} failed (silent {}ms)",
                    self.local, record.peer, silence
                );
                changes.push(StatusChange {
                    peer: record.peer,
                    from: PeerStatus::Suspected,
                    to: PeerStatus::Failed,
                });
            }
        }
        changes
    }

    /// The local node plus every peer that is not Failed.
    pub fn active_set(&self) -> ActiveSet {
        ActiveSet::new(
            self.local,
            self.records
                .values()
                .filter(|r| r.status != PeerStatus::Failed)
                .map(|r| r.peer),
        )
    }

    pub fn status_of(&self, peer: &NodeId) -> Option<PeerStatus> {
        self.records.get(peer).map(|r| r.status)
    }

    pub fn records(&self) -> impl Iterator<Item = &PeerLivenessRecord> {
        self.records.values()
    }

    /// Every known peer, in id order.
    pub fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.records.keys().copied()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
