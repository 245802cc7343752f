//! Per-node Raft state: role, term, vote, log and commit bookkeeping.
//!
//! Owned by exactly one [`ConsensusEngine`](crate::ConsensusEngine) and only
//! mutated from inside its tick and message handlers.

use {
    crate::types::{ConsensusValue, LogEntry, LogIndex, NodeId, Stamp, StampedValue, Term},
    log::info,
    std::{
        collections::{BTreeMap, HashMap},
        fmt,
    },
};

/// The role a node currently plays. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Follower => write!(f, "follower"),
            Role::Candidate => write!(f, "candidate"),
            Role::Leader => write!(f, "leader"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RaftState {
    pub current_term: Term,
    /// Candidate voted for in `current_term`. Cleared on every term change.
    pub voted_for: Option<NodeId>,
    pub role: Role,
    /// Leader recognised in `current_term`, if any.
    pub leader_id: Option<NodeId>,
    /// Replicated log. Entry `i` lives at position `i - 1`. Always empty in
    /// lightweight mode.
    pub log: Vec<LogEntry>,
    /// Highest log index known committed. Never decreases.
    pub commit_index: LogIndex,
    /// Highest log index applied to `values`.
    pub last_applied: LogIndex,
    /// Leader only: next index to send to each peer.
    pub next_index: HashMap<NodeId, LogIndex>,
    /// Leader only: highest index known replicated on each peer.
    pub match_index: HashMap<NodeId, LogIndex>,
    /// Applied value of every variable, tagged with the stamp it was
    /// written under. In fault-tolerant mode the stamp is the entry's
    /// `(term, index)`.
    pub values: BTreeMap<String, StampedValue>,
    /// Newest stamp applied in lightweight mode.
    pub latest_stamp: Stamp,
}

impl Default for RaftState {
    fn default() -> Self {
        Self::new()
    }
}

impl RaftState {
    pub fn new() -> Self {
        Self {
            current_term: 0,
            voted_for: None,
            role: Role::Follower,
            leader_id: None,
            log: Vec::new(),
            commit_index: 0,
            last_applied: 0,
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            values: BTreeMap::new(),
            latest_stamp: Stamp::default(),
        }
    }

    // -- Log queries ---------------------------------------------------------

    pub fn last_log_index(&self) -> LogIndex {
        self.log.len() as LogIndex
    }

    pub fn last_log_term(&self) -> Term {
        self.log.last().map_or(0, |e| e.term)
    }

    /// Entry stored at `index`, if any.
    pub fn entry(&self, index: LogIndex) -> Option<&LogEntry> {
        let pos = usize::try_from(index.checked_sub(1)?).ok()?;
        self.log.get(pos)
    }

    /// Term of the entry at `index`. Index 0 is the empty prefix with term 0.
    pub fn term_at(&self, index: LogIndex) -> Option<Term> {
        if index == 0 {
            return Some(0);
        }
        self.entry(index).map(|e| e.term)
    }

    /// Up to `max` entries starting at `start`.
    pub fn entries_from(&self, start: LogIndex, max: usize) -> Vec<LogEntry> {
        let Some(pos) = start
            .checked_sub(1)
            .and_then(|p| usize::try_from(p).ok())
        else {
            return Vec::new();
        };
        self.log.iter().skip(pos).take(max).cloned().collect()
    }

    /// Whether a candidate whose last entry is `(last_log_index,
    /// last_log_term)` is at least as up-to-date as this log.
    pub fn is_up_to_date(&self, last_log_index: LogIndex, last_log_term: Term) -> bool {
        (last_log_term, last_log_index) >= (self.last_log_term(), self.last_log_index())
    }

    // -- Log mutation --------------------------------------------------------

    /// Append a new entry at the next free index and return that index.
    pub fn append_new(&mut self, term: Term, variable: String, value: ConsensusValue) -> LogIndex {
        let index = self.last_log_index().saturating_add(1);
        self.log.push(LogEntry {
            term,
            index,
            variable,
            value,
        });
        index
    }

    /// Drop every entry at `index` and beyond.
    ///
    /// Committed entries are never removed; returns `false` if asked to.
    pub fn truncate_from(&mut self, index: LogIndex) -> bool {
        if index <= self.commit_index {
            return false;
        }
        let Ok(keep) = usize::try_from(index.saturating_sub(1)) else {
            return false;
        };
        self.log.truncate(keep);
        true
    }

    /// Raise `commit_index` to `index`, capped by the log length. Returns
    /// `true` if it moved.
    pub fn advance_commit(&mut self, index: LogIndex) -> bool {
        let target = index.min(self.last_log_index());
        if target > self.commit_index {
            self.commit_index = target;
            true
        } else {
            false
        }
    }

    // -- Term and role -------------------------------------------------------

    /// Adopt a higher term, clearing the vote and the known leader.
    /// Returns `true` if the term changed.
    pub fn observe_term(&mut self, term: Term) -> bool {
        if term <= self.current_term {
            return false;
        }
        info!("term {} -> {}", self.current_term, term);
        self.current_term = term;
        self.voted_for = None;
        self.leader_id = None;
        true
    }

    /// Reset per-peer replication progress after winning an election.
    pub fn reset_leader_progress<'a>(&mut self, peers: impl IntoIterator<Item = &'a NodeId>) {
        let next = self.last_log_index().saturating_add(1);
        self.next_index.clear();
        self.match_index.clear();
        for peer in peers {
            self.next_index.insert(*peer, next);
            self.match_index.insert(*peer, 0);
        }
    }

    pub fn clear_leader_progress(&mut self) {
        self.next_index.clear();
        self.match_index.clear();
    }
}
