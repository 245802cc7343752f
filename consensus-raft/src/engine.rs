//! The core Raft consensus state machine.
//!
//! Implements leader election, heartbeats and replication in two modes:
//! lightweight (latest value per variable, stamp ordered) and
//! fault-tolerant (replicated log, leader-driven commitment).
//!
//! The engine is deterministic given its RNG seed: the same sequence of
//! ticks and messages always produces the same transitions and output.
//! All I/O is handled externally; time is the `now` passed in by the host.

use {
    crate::{
        config::{ConfigError, RaftConfig, RaftMode},
        error::ProposeError,
        failure_detector::{ActiveSet, HeartbeatDetector, PeerStatus},
        message::{
            Ack, AppendEntries, AppendEntriesResponse, RaftMessage, Replication, RequestVote,
            RequestVoteResponse,
        },
        quorum::{self, MajoritySnapshot},
        state::{RaftState, Role},
        timeout::TimeoutScheduler,
        types::{
            AppliedValue, ConsensusValue, LogEntry, LogIndex, NodeId, Stamp, StampedValue, Term,
        },
    },
    log::*,
    std::collections::{BTreeMap, HashSet},
};

/// Where an outbound message should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Peer(NodeId),
    /// Every known peer.
    Broadcast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub message: RaftMessage,
}

/// Result of processing a tick, a message or a proposal.
#[derive(Debug, Default, PartialEq)]
pub struct EngineOutput {
    /// Messages for the host to deliver.
    pub messages: Vec<Outbound>,
    /// Values that became visible on this node, in apply order.
    pub applied: Vec<AppliedValue>,
}

impl EngineOutput {
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            applied: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.applied.is_empty()
    }

    fn send(&mut self, to: NodeId, message: impl Into<RaftMessage>) {
        self.messages.push(Outbound {
            target: Target::Peer(to),
            message: message.into(),
        });
    }

    fn broadcast(&mut self, message: impl Into<RaftMessage>) {
        self.messages.push(Outbound {
            target: Target::Broadcast,
            message: message.into(),
        });
    }
}

/// Point-in-time view of an engine, for hosts and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftStatus {
    pub id: NodeId,
    pub role: Role,
    pub term: Term,
    pub leader_id: Option<NodeId>,
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
    pub last_log_index: LogIndex,
    pub latest_stamp: Stamp,
    pub majority: MajoritySnapshot,
    pub running: bool,
}

/// The Raft consensus engine for one node.
///
/// Owns its configuration, Raft state, failure detector and timers. Many
/// engines can live in one process without sharing anything.
#[derive(Debug)]
pub struct ConsensusEngine {
    /// Validated, immutable configuration.
    config: RaftConfig,
    /// This node's identity.
    id: NodeId,
    /// Static peer list, sorted, excluding `id`.
    peers: Vec<NodeId>,
    state: RaftState,
    detector: HeartbeatDetector,
    timeouts: TimeoutScheduler,
    /// Votes granted to us in the current term (candidate only).
    votes: HashSet<NodeId>,
    /// Peers that answered an AppendEntries in the current term (leader only).
    acked: HashSet<NodeId>,
    running: bool,
}

impl ConsensusEngine {
    /// Create an engine for node `id` with the given static peer list.
    ///
    /// The configuration is validated here and never changes afterwards.
    pub fn new(config: RaftConfig, id: NodeId, peers: Vec<NodeId>) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut peers = peers;
        if peers.contains(&id) {
            return Err(ConfigError::SelfInPeerList(id));
        }
        peers.sort_unstable();
        for pair in peers.windows(2) {
            if let [a, b] = pair {
                if a == b {
                    return Err(ConfigError::DuplicatePeer(*a));
                }
            }
        }
        let detector = HeartbeatDetector::new(id, config.failure.clone(), peers.iter().copied(), 0);
        let timeouts = TimeoutScheduler::new(&config);
        Ok(Self {
            config,
            id,
            peers,
            state: RaftState::new(),
            detector,
            timeouts,
            votes: HashSet::new(),
            acked: HashSet::new(),
            running: false,
        })
    }

    // -- Lifecycle --

    /// Start as a Follower and arm the first election deadline.
    pub fn start(&mut self, now: u64) {
        info!(
            "{}: starting in {:?} mode with {} peers",
            self.id,
            self.config.mode,
            self.peers.len()
        );
        self.running = true;
        self.state.role = Role::Follower;
        self.detector.reset(now);
        self.timeouts.cancel();
        self.timeouts.reset_election(now);
    }

    /// Stop the engine. Ticks and messages become no-ops and proposals fail.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        info!("{}: stopping at term {}", self.id, self.state.current_term);
        self.running = false;
        self.state.role = Role::Follower;
        self.state.leader_id = None;
        self.state.clear_leader_progress();
        self.votes.clear();
        self.acked.clear();
        self.timeouts.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // -- Public API --

    /// Advance time to `now`: update peer liveness and fire due deadlines.
    pub fn tick(&mut self, now: u64) -> EngineOutput {
        let mut output = EngineOutput::empty();
        if !self.running {
            return output;
        }
        let changes = self.detector.tick(now);
        let shrunk = changes.iter().any(|c| c.to == PeerStatus::Failed);
        if shrunk {
            let active = self.detector.active_set();
            info!(
                "{}: active set shrank to {}, majority now {}",
                self.id,
                active.len(),
                quorum::required_majority(active.len())
            );
        }

        match self.state.role {
            Role::Leader => {
                // A smaller active set may already cover pending entries.
                if shrunk {
                    self.advance_commit(&mut output);
                }
                if self.timeouts.heartbeat_due(now) {
                    self.send_heartbeats(&mut output);
                    self.timeouts.arm_heartbeat(now);
                }
            }
            Role::Candidate if shrunk => {
                self.check_election_won(now, &mut output);
                if self.state.role == Role::Candidate && self.timeouts.election_expired(now) {
                    self.start_election(now, &mut output);
                }
            }
            Role::Follower | Role::Candidate => {
                if self.timeouts.election_expired(now) {
                    self.start_election(now, &mut output);
                }
            }
        }
        output
    }

    /// Handle a message from `from` received at `now`.
    pub fn on_message(&mut self, from: NodeId, message: RaftMessage, now: u64) -> EngineOutput {
        let mut output = EngineOutput::empty();
        if !self.running {
            return output;
        }
        // Any message is proof of life, accepted or not.
        self.detector.record_contact(from, now);
        if self.peers.binary_search(&from).is_err() {
            debug!(
                "{}: dropping {} from non-member {}",
                self.id,
                message.kind(),
                from
            );
            return output;
        }

        let term = message.term();
        if term > self.state.current_term {
            self.state.observe_term(term);
            if self.state.role != Role::Follower {
                self.become_follower(now);
            }
        }

        match message {
            RaftMessage::RequestVote(request) => self.on_request_vote(from, request, now, &mut output),
            RaftMessage::RequestVoteResponse(response) => {
                self.on_request_vote_response(from, response, now, &mut output)
            }
            RaftMessage::AppendEntries(request) => {
                self.on_append_entries(from, request, now, &mut output)
            }
            RaftMessage::AppendEntriesResponse(response) => {
                self.on_append_entries_response(from, response, &mut output)
            }
        }
        output
    }

    /// Propose a new value for a registered variable.
    ///
    /// Only the leader accepts proposals. In lightweight mode the value is
    /// applied and broadcast at once; in fault-tolerant mode it is appended
    /// to the log and replicated immediately.
    pub fn propose_value(
        &mut self,
        name: &str,
        value: ConsensusValue,
        _now: u64,
    ) -> Result<EngineOutput, ProposeError> {
        if !self.running {
            return Err(ProposeError::Stopped);
        }
        if self.state.role != Role::Leader {
            return Err(ProposeError::NotLeader {
                leader_hint: self.state.leader_id,
            });
        }
        let Some(expected) = self.config.variable_type(name) else {
            return Err(ProposeError::UnknownVariable(name.to_string()));
        };
        if value.value_type() != expected {
            return Err(ProposeError::TypeMismatch {
                name: name.to_string(),
                expected,
                found: value.value_type(),
            });
        }

        let mut output = EngineOutput::empty();
        match self.config.mode {
            RaftMode::Lightweight => {
                let stamp = Stamp::new(
                    self.state.current_term,
                    self.state.latest_stamp.version.saturating_add(1),
                );
                debug!("{}: proposing {}={:?} at {}", self.id, name, value, stamp);
                self.state.latest_stamp = stamp;
                self.state.values.insert(
                    name.to_string(),
                    StampedValue {
                        value: value.clone(),
                        stamp,
                    },
                );
                output.applied.push(AppliedValue {
                    variable: name.to_string(),
                    value,
                    index: stamp.version,
                    term: stamp.term,
                });
                if !self.peers.is_empty() {
                    output.broadcast(self.variables_message());
                }
            }
            RaftMode::FaultTolerant => {
                let index =
                    self.state
                        .append_new(self.state.current_term, name.to_string(), value);
                debug!(
                    "{}: appended {} at index {} term {}",
                    self.id, name, index, self.state.current_term
                );
                for peer in self.peers.clone() {
                    self.send_append(peer, &mut output);
                }
                self.advance_commit(&mut output);
            }
        }
        Ok(output)
    }

    // -- Quorum queries --

    /// Whether this node's current role is backed by a majority of the
    /// active set. Never mutates state.
    pub fn has_quorum(&self) -> bool {
        self.get_majority_info().has_quorum
    }

    /// Evaluate an arbitrary acknowledgement count against the current
    /// active set.
    pub fn has_quorum_with(&self, ack_count: usize) -> bool {
        quorum::evaluate(ack_count, &self.detector.active_set()).has_quorum
    }

    /// Majority snapshot for the current role's acknowledgements: votes for
    /// a candidate, AppendEntries responders for a leader, the known leader
    /// for a follower. The local node always counts.
    pub fn get_majority_info(&self) -> MajoritySnapshot {
        let active = self.detector.active_set();
        let acks = self.current_acks();
        quorum::evaluate(quorum::count_acks(&acks, &active), &active)
    }

    /// Snapshot of the nodes this node currently believes reachable.
    pub fn active_set(&self) -> ActiveSet {
        self.detector.active_set()
    }

    // -- Accessors --

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn peers(&self) -> &[NodeId] {
        &self.peers
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn term(&self) -> Term {
        self.state.current_term
    }

    pub fn leader_id(&self) -> Option<NodeId> {
        self.state.leader_id
    }

    pub fn is_leader(&self) -> bool {
        self.state.role == Role::Leader
    }

    pub fn state(&self) -> &RaftState {
        &self.state
    }

    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    pub fn detector(&self) -> &HeartbeatDetector {
        &self.detector
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.state.log
    }

    /// Latest applied value of a variable.
    pub fn committed_value(&self, name: &str) -> Option<&ConsensusValue> {
        self.state.values.get(name).map(|v| &v.value)
    }

    /// Every applied variable value.
    pub fn committed_values(&self) -> BTreeMap<String, ConsensusValue> {
        self.state
            .values
            .iter()
            .map(|(name, v)| (name.clone(), v.value.clone()))
            .collect()
    }

    pub fn status(&self) -> RaftStatus {
        RaftStatus {
            id: self.id,
            role: self.state.role,
            term: self.state.current_term,
            leader_id: self.state.leader_id,
            commit_index: self.state.commit_index,
            last_applied: self.state.last_applied,
            last_log_index: self.state.last_log_index(),
            latest_stamp: self.state.latest_stamp,
            majority: self.get_majority_info(),
            running: self.running,
        }
    }

    // -- Elections --

    fn start_election(&mut self, now: u64, output: &mut EngineOutput) {
        let term = self.state.current_term.saturating_add(1);
        self.state.observe_term(term);
        self.state.role = Role::Candidate;
        self.state.voted_for = Some(self.id);
        self.votes.clear();
        self.votes.insert(self.id);
        self.timeouts.cancel_heartbeat();
        self.timeouts.reset_election(now);
        info!("{}: became candidate for term {}", self.id, term);

        if !self.peers.is_empty() {
            let (last_log_index, last_log_term) = self.last_position();
            output.broadcast(RequestVote {
                term,
                candidate_id: self.id,
                last_log_index,
                last_log_term,
            });
        }
        self.check_election_won(now, output);
    }

    fn on_request_vote(
        &mut self,
        from: NodeId,
        request: RequestVote,
        now: u64,
        output: &mut EngineOutput,
    ) {
        let current = self.state.current_term;
        let granted = if request.term < current {
            debug!(
                "{}: rejecting vote for {} (stale term {} < {})",
                self.id, request.candidate_id, request.term, current
            );
            false
        } else if request.candidate_id != from {
            debug!(
                "{}: rejecting vote request from {} on behalf of {}",
                self.id, from, request.candidate_id
            );
            false
        } else {
            let free = self
                .state
                .voted_for
                .map_or(true, |v| v == request.candidate_id);
            let up_to_date = self.candidate_up_to_date(&request);
            debug!(
                "{}: vote request from {} term {}: free={} up_to_date={}",
                self.id, request.candidate_id, request.term, free, up_to_date
            );
            free && up_to_date
        };
        if granted {
            self.state.voted_for = Some(request.candidate_id);
            self.timeouts.reset_election(now);
        }
        output.send(
            from,
            RequestVoteResponse {
                term: current,
                vote_granted: granted,
            },
        );
    }

    fn on_request_vote_response(
        &mut self,
        from: NodeId,
        response: RequestVoteResponse,
        now: u64,
        output: &mut EngineOutput,
    ) {
        if self.state.role != Role::Candidate
            || response.term != self.state.current_term
            || !response.vote_granted
        {
            return;
        }
        debug!(
            "{}: vote from {} in term {}",
            self.id, from, self.state.current_term
        );
        self.votes.insert(from);
        self.check_election_won(now, output);
    }

    fn check_election_won(&mut self, now: u64, output: &mut EngineOutput) {
        if self.state.role != Role::Candidate {
            return;
        }
        let active = self.detector.active_set();
        let granted = quorum::count_acks(&self.votes, &active);
        if self.reaches_quorum(granted, &active) {
            self.become_leader(now, output);
        }
    }

    fn become_leader(&mut self, now: u64, output: &mut EngineOutput) {
        info!(
            "{}: became leader for term {} with {} votes",
            self.id,
            self.state.current_term,
            self.votes.len()
        );
        self.state.role = Role::Leader;
        self.state.leader_id = Some(self.id);
        self.state.reset_leader_progress(&self.peers);
        self.votes.clear();
        self.acked.clear();
        self.timeouts.cancel_election();
        self.send_heartbeats(output);
        self.timeouts.arm_heartbeat(now);
        self.advance_commit(output);
    }

    fn become_follower(&mut self, now: u64) {
        if self.state.role != Role::Follower {
            info!(
                "{}: {} -> follower at term {}",
                self.id, self.state.role, self.state.current_term
            );
        }
        self.state.role = Role::Follower;
        self.state.clear_leader_progress();
        self.votes.clear();
        self.acked.clear();
        self.timeouts.cancel_heartbeat();
        if self.timeouts.election_deadline().is_none() {
            self.timeouts.reset_election(now);
        }
    }

    // -- Replication: follower side --

    fn on_append_entries(
        &mut self,
        from: NodeId,
        request: AppendEntries,
        now: u64,
        output: &mut EngineOutput,
    ) {
        if request.term < self.state.current_term {
            debug!(
                "{}: rejecting append from {} (stale term {} < {})",
                self.id, from, request.term, self.state.current_term
            );
            let ack = self.rejection_ack();
            output.send(
                from,
                AppendEntriesResponse {
                    term: self.state.current_term,
                    success: false,
                    ack,
                },
            );
            return;
        }

        if self.state.role == Role::Leader {
            warn!(
                "{}: second leader {} seen in term {}",
                self.id, request.leader_id, request.term
            );
        }
        if self.state.role != Role::Follower {
            self.become_follower(now);
        }
        if self.state.leader_id != Some(request.leader_id) {
            info!(
                "{}: following {} in term {}",
                self.id, request.leader_id, request.term
            );
            self.state.leader_id = Some(request.leader_id);
        }
        self.timeouts.reset_election(now);

        let term = self.state.current_term;
        let (success, ack) = match (self.config.mode, request.payload) {
            (RaftMode::Lightweight, Replication::Variables { values, stamp }) => {
                self.apply_variables(values, stamp, output);
                (true, Ack::Stamp(self.state.latest_stamp))
            }
            (RaftMode::FaultTolerant, Replication::Entries(entries)) => self.append_to_log(
                request.prev_log_index,
                request.prev_log_term,
                entries,
                request.leader_commit,
                output,
            ),
            (mode, _) => {
                warn!(
                    "{}: payload from {} does not match {:?} mode",
                    self.id, from, mode
                );
                (false, self.rejection_ack())
            }
        };
        output.send(from, AppendEntriesResponse { term, success, ack });
    }

    /// Lightweight apply: a variable moves only to a strictly newer stamp.
    fn apply_variables(
        &mut self,
        values: BTreeMap<String, StampedValue>,
        leader_stamp: Stamp,
        output: &mut EngineOutput,
    ) {
        for (name, incoming) in values {
            let Some(expected) = self.config.variable_type(&name) else {
                warn!("{}: ignoring unknown variable {:?}", self.id, name);
                continue;
            };
            if incoming.value.value_type() != expected {
                warn!(
                    "{}: ignoring {:?}: expected {}, got {}",
                    self.id,
                    name,
                    expected,
                    incoming.value.value_type()
                );
                continue;
            }
            let newer = self
                .state
                .values
                .get(&name)
                .map_or(true, |current| incoming.stamp > current.stamp);
            if !newer {
                continue;
            }
            debug!(
                "{}: applying {}={:?} at {} (leader at {})",
                self.id, name, incoming.value, incoming.stamp, leader_stamp
            );
            self.state.latest_stamp = self.state.latest_stamp.max(incoming.stamp);
            output.applied.push(AppliedValue {
                variable: name.clone(),
                value: incoming.value.clone(),
                index: incoming.stamp.version,
                term: incoming.stamp.term,
            });
            self.state.values.insert(name, incoming);
        }
    }

    /// Fault-tolerant apply: consistency check, then append or overwrite.
    fn append_to_log(
        &mut self,
        prev_log_index: LogIndex,
        prev_log_term: Term,
        entries: Vec<LogEntry>,
        leader_commit: LogIndex,
        output: &mut EngineOutput,
    ) -> (bool, Ack) {
        match self.state.term_at(prev_log_index) {
            Some(term) if term == prev_log_term => {}
            found => {
                let hint = prev_log_index
                    .saturating_sub(1)
                    .min(self.state.last_log_index());
                debug!(
                    "{}: log mismatch at {} (have {:?}, want {}), hint {}",
                    self.id, prev_log_index, found, prev_log_term, hint
                );
                return (false, Ack::MatchIndex(hint));
            }
        }

        let mut last_new = prev_log_index;
        for entry in entries {
            let index = entry.index;
            match self.state.term_at(index) {
                Some(term) if term == entry.term => {}
                Some(_) => {
                    if !self.state.truncate_from(index) {
                        warn!(
                            "{}: refusing to overwrite committed index {}",
                            self.id, index
                        );
                        return (false, Ack::MatchIndex(self.state.commit_index));
                    }
                    debug!("{}: truncated conflicting suffix from {}", self.id, index);
                    self.state.log.push(entry);
                }
                None if index == self.state.last_log_index().saturating_add(1) => {
                    self.state.log.push(entry);
                }
                None => {
                    warn!("{}: gap in entries at index {}", self.id, index);
                    return (false, Ack::MatchIndex(self.state.last_log_index()));
                }
            }
            last_new = index;
        }

        if self.state.advance_commit(leader_commit.min(last_new)) {
            info!("{}: commit index -> {}", self.id, self.state.commit_index);
        }
        self.apply_committed(output);
        (true, Ack::MatchIndex(last_new))
    }

    fn apply_committed(&mut self, output: &mut EngineOutput) {
        while self.state.last_applied < self.state.commit_index {
            let index = self.state.last_applied.saturating_add(1);
            self.state.last_applied = index;
            let Some(entry) = self.state.entry(index).cloned() else {
                break;
            };
            match self.config.variable_type(&entry.variable) {
                None => {
                    warn!(
                        "{}: committed entry {} names unknown variable {:?}",
                        self.id, index, entry.variable
                    );
                }
                Some(expected) if expected != entry.value.value_type() => {
                    warn!(
                        "{}: committed entry {} for {:?}: expected {}, got {}",
                        self.id,
                        index,
                        entry.variable,
                        expected,
                        entry.value.value_type()
                    );
                }
                Some(_) => {
                    trace!("{}: applying index {}", self.id, index);
                    self.state.values.insert(
                        entry.variable.clone(),
                        StampedValue {
                            value: entry.value.clone(),
                            stamp: Stamp::new(entry.term, entry.index),
                        },
                    );
                    output.applied.push(AppliedValue {
                        variable: entry.variable,
                        value: entry.value,
                        index: entry.index,
                        term: entry.term,
                    });
                }
            }
        }
    }

    // -- Replication: leader side --

    fn on_append_entries_response(
        &mut self,
        from: NodeId,
        response: AppendEntriesResponse,
        output: &mut EngineOutput,
    ) {
        if self.state.role != Role::Leader || response.term != self.state.current_term {
            return;
        }
        self.acked.insert(from);

        let Ack::MatchIndex(index) = response.ack else {
            // Lightweight acks carry no replication progress.
            return;
        };
        let matched = self.state.match_index.get(&from).copied().unwrap_or(0);
        let next = self.state.next_index.get(&from).copied().unwrap_or(1);
        if response.success {
            let matched = matched.max(index.min(self.state.last_log_index()));
            self.state.match_index.insert(from, matched);
            self.state.next_index.insert(from, matched.saturating_add(1));
            self.advance_commit(output);
            if matched < self.state.last_log_index() {
                self.send_append(from, output);
            }
        } else {
            let retry = next
                .saturating_sub(1)
                .min(index.saturating_add(1))
                .max(matched.saturating_add(1))
                .max(1);
            debug!(
                "{}: {} rejected append, next_index {} -> {}",
                self.id, from, next, retry
            );
            self.state.next_index.insert(from, retry);
            self.send_append(from, output);
        }
    }

    /// Commit the highest current-term index replicated on a quorum.
    fn advance_commit(&mut self, output: &mut EngineOutput) {
        if self.config.mode != RaftMode::FaultTolerant || self.state.role != Role::Leader {
            return;
        }
        let active = self.detector.active_set();
        let mut candidate = self.state.last_log_index();
        while candidate > self.state.commit_index {
            if self.state.term_at(candidate) != Some(self.state.current_term) {
                break;
            }
            let replicated: Vec<NodeId> = self
                .state
                .match_index
                .iter()
                .filter(|(_, matched)| **matched >= candidate)
                .map(|(peer, _)| *peer)
                .chain(std::iter::once(self.id))
                .collect();
            let acks = quorum::count_acks(&replicated, &active);
            if self.reaches_quorum(acks, &active) {
                self.state.advance_commit(candidate);
                info!("{}: commit index -> {}", self.id, self.state.commit_index);
                self.apply_committed(output);
                return;
            }
            candidate = candidate.saturating_sub(1);
        }
    }

    fn send_heartbeats(&self, output: &mut EngineOutput) {
        if self.peers.is_empty() {
            return;
        }
        match self.config.mode {
            RaftMode::Lightweight => output.broadcast(self.variables_message()),
            RaftMode::FaultTolerant => {
                for peer in &self.peers {
                    self.send_append(*peer, output);
                }
            }
        }
    }

    /// AppendEntries carrying whatever `peer` is missing, possibly nothing.
    fn send_append(&self, peer: NodeId, output: &mut EngineOutput) {
        let last = self.state.last_log_index();
        let next = self
            .state
            .next_index
            .get(&peer)
            .copied()
            .unwrap_or_else(|| last.saturating_add(1))
            .clamp(1, last.saturating_add(1));
        let prev_log_index = next.saturating_sub(1);
        let prev_log_term = self.state.term_at(prev_log_index).unwrap_or(0);
        let entries = self
            .state
            .entries_from(next, self.config.max_entries_per_append);
        trace!(
            "{}: append to {} prev={} entries={}",
            self.id,
            peer,
            prev_log_index,
            entries.len()
        );
        output.send(
            peer,
            AppendEntries {
                term: self.state.current_term,
                leader_id: self.id,
                prev_log_index,
                prev_log_term,
                payload: Replication::Entries(entries),
                leader_commit: self.state.commit_index,
            },
        );
    }

    fn variables_message(&self) -> AppendEntries {
        AppendEntries {
            term: self.state.current_term,
            leader_id: self.id,
            prev_log_index: 0,
            prev_log_term: 0,
            payload: Replication::Variables {
                values: self.state.values.clone(),
                stamp: self.state.latest_stamp,
            },
            leader_commit: self.state.commit_index,
        }
    }

    // -- Helpers --

    /// Majority of the configured cluster, the local node included.
    fn cluster_majority(&self) -> usize {
        quorum::required_majority(self.peers.len().saturating_add(1))
    }

    /// Whether `acks` decide a vote or commit against `active`. With
    /// `static_majority_floor` set they must also cover a cluster majority.
    fn reaches_quorum(&self, acks: usize, active: &ActiveSet) -> bool {
        let snapshot = quorum::evaluate(acks, active);
        if self.config.static_majority_floor {
            snapshot.has_quorum && acks >= self.cluster_majority()
        } else {
            snapshot.has_quorum
        }
    }

    fn current_acks(&self) -> Vec<NodeId> {
        let mut acks = vec![self.id];
        match self.state.role {
            Role::Leader => acks.extend(self.acked.iter().copied()),
            Role::Candidate => acks.extend(self.votes.iter().copied()),
            Role::Follower => acks.extend(self.state.leader_id),
        }
        acks
    }

    /// `(last_log_index, last_log_term)` for elections. Lightweight nodes
    /// use their newest stamp.
    fn last_position(&self) -> (LogIndex, Term) {
        match self.config.mode {
            RaftMode::Lightweight => (
                self.state.latest_stamp.version,
                self.state.latest_stamp.term,
            ),
            RaftMode::FaultTolerant => (self.state.last_log_index(), self.state.last_log_term()),
        }
    }

    fn candidate_up_to_date(&self, request: &RequestVote) -> bool {
        match self.config.mode {
            // The newest stamp stands in for the last log entry.
            RaftMode::Lightweight => {
                Stamp::new(request.last_log_term, request.last_log_index)
                    >= self.state.latest_stamp
            }
            RaftMode::FaultTolerant => self
                .state
                .is_up_to_date(request.last_log_index, request.last_log_term),
        }
    }

    fn rejection_ack(&self) -> Ack {
        match self.config.mode {
            RaftMode::Lightweight => Ack::Stamp(self.state.latest_stamp),
            RaftMode::FaultTolerant => Ack::MatchIndex(self.state.last_log_index()),
        }
    }
}
