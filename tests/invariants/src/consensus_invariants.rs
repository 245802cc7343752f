//! Property-based tests for Raft consensus invariants.
//!
//! A five-node cluster of engines is driven by an arbitrary schedule of
//! clock advances, out-of-order deliveries, drops, duplicates, proposals,
//! crashes and restarts.
//!
//! Properties tested:
//! 1. Election safety: at most one leader per term.
//! 2. Log matching: equal (index, term) implies identical prefixes.
//! 3. Commit safety: a committed index never changes value on any node.
//! 4. Lightweight stamps: a node's value for a variable only moves forward.
//!
//! The arbitrary schedules run with the static majority floor, since
//! detector views may disagree under loss and crashes. Liveness is checked
//! with the active-set quorum alone.

#[cfg(test)]
mod tests {
    use {
        proptest::prelude::*,
        raft_fault_consensus::{
            ConsensusEngine, ConsensusValue, EngineOutput, LogEntry, LogIndex, NodeId,
            RaftConfig, RaftMessage, RaftMode, Stamp, Target, Term, ValueType,
        },
        std::collections::{BTreeMap, BTreeSet},
    };

    const NODES: u64 = 5;

    #[derive(Debug, Clone)]
    enum Action {
        Advance(u64),
        Deliver(usize),
        Drop(usize),
        Duplicate(usize),
        Propose(i64),
        Crash(usize),
        Restart(usize),
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            4 => (1..=15u64).prop_map(Action::Advance),
            8 => any::<usize>().prop_map(Action::Deliver),
            1 => any::<usize>().prop_map(Action::Drop),
            1 => any::<usize>().prop_map(Action::Duplicate),
            2 => (0..1_000i64).prop_map(Action::Propose),
            1 => (0..NODES as usize).prop_map(Action::Crash),
            1 => (0..NODES as usize).prop_map(Action::Restart),
        ]
    }

    // ── Helpers ──

    struct Harness {
        engines: Vec<ConsensusEngine>,
        down: Vec<bool>,
        now: u64,
        /// (from, to, message), delivered in any order.
        in_flight: Vec<(NodeId, NodeId, RaftMessage)>,
        leaders: BTreeMap<Term, BTreeSet<NodeId>>,
        committed: BTreeMap<LogIndex, LogEntry>,
        stamps: BTreeMap<(NodeId, String), Stamp>,
    }

    impl Harness {
        fn new(mode: RaftMode, seed: u64, static_majority_floor: bool) -> Self {
            let ids: Vec<NodeId> = (1..=NODES).map(NodeId).collect();
            let engines = ids
                .iter()
                .map(|id| {
                    let config = RaftConfig {
                        random_seed: Some(seed.wrapping_add(id.0)),
                        static_majority_floor,
                        ..RaftConfig::dev_default(mode)
                    }
                    .with_variable("seq", ValueType::Int)
                    .unwrap();
                    let peers = ids.iter().copied().filter(|p| p != id).collect();
                    let mut engine = ConsensusEngine::new(config, *id, peers).unwrap();
                    engine.start(0);
                    engine
                })
                .collect();
            Self {
                engines,
                down: vec![false; NODES as usize],
                now: 0,
                in_flight: Vec::new(),
                leaders: BTreeMap::new(),
                committed: BTreeMap::new(),
                stamps: BTreeMap::new(),
            }
        }

        fn route(&mut self, from: NodeId, output: EngineOutput) {
            for outbound in output.messages {
                match outbound.target {
                    Target::Peer(to) => self.in_flight.push((from, to, outbound.message)),
                    Target::Broadcast => {
                        for to in (1..=NODES).map(NodeId).filter(|id| *id != from) {
                            self.in_flight.push((from, to, outbound.message.clone()));
                        }
                    }
                }
            }
        }

        fn apply(&mut self, action: Action) {
            match action {
                Action::Advance(ms) => {
                    self.now += ms;
                    for i in 0..self.engines.len() {
                        if self.down[i] {
                            continue;
                        }
                        let output = self.engines[i].tick(self.now);
                        let id = self.engines[i].id();
                        self.route(id, output);
                    }
                }
                Action::Deliver(k) | Action::Duplicate(k) if !self.in_flight.is_empty() => {
                    let k = k % self.in_flight.len();
                    let (from, to, message) = if matches!(action, Action::Duplicate(_)) {
                        self.in_flight[k].clone()
                    } else {
                        self.in_flight.swap_remove(k)
                    };
                    let i = (to.0 - 1) as usize;
                    if !self.down[i] {
                        let output = self.engines[i].on_message(from, message, self.now);
                        self.route(to, output);
                    }
                }
                Action::Drop(k) if !self.in_flight.is_empty() => {
                    let k = k % self.in_flight.len();
                    self.in_flight.swap_remove(k);
                }
                Action::Propose(value) => {
                    let leader = (0..self.engines.len())
                        .find(|i| !self.down[*i] && self.engines[*i].is_leader());
                    if let Some(i) = leader {
                        let output = self.engines[i]
                            .propose_value("seq", ConsensusValue::Int(value), self.now)
                            .unwrap();
                        let id = self.engines[i].id();
                        self.route(id, output);
                    }
                }
                Action::Crash(i) => {
                    self.engines[i].stop();
                    self.down[i] = true;
                }
                Action::Restart(i) if self.down[i] => {
                    self.engines[i].start(self.now);
                    self.down[i] = false;
                }
                _ => {}
            }
        }

        fn check(&mut self) -> Result<(), TestCaseError> {
            // Election safety.
            for engine in &self.engines {
                if engine.is_leader() {
                    self.leaders
                        .entry(engine.term())
                        .or_default()
                        .insert(engine.id());
                }
            }
            for (term, leaders) in &self.leaders {
                prop_assert!(leaders.len() <= 1, "term {} has leaders {:?}", term, leaders);
            }

            // Commit safety.
            for engine in &self.engines {
                let commit = engine.state().commit_index;
                for entry in engine.log().iter().take(commit as usize) {
                    match self.committed.get(&entry.index) {
                        Some(first) => {
                            prop_assert_eq!(
                                first, entry,
                                "{} disagrees at committed index {}", engine.id(), entry.index
                            );
                        }
                        None => {
                            self.committed.insert(entry.index, entry.clone());
                        }
                    }
                }
            }

            // Log matching.
            for (i, a) in self.engines.iter().enumerate() {
                for b in self.engines.iter().skip(i + 1) {
                    let (log_a, log_b) = (a.log(), b.log());
                    let shared = log_a.len().min(log_b.len());
                    if let Some(k) = (0..shared).rev().find(|&k| log_a[k].term == log_b[k].term) {
                        prop_assert_eq!(
                            &log_a[..=k], &log_b[..=k],
                            "{} and {} share index {} term {} but differ before it",
                            a.id(), b.id(), k + 1, log_a[k].term
                        );
                    }
                }
            }

            // Stamps never regress.
            for engine in &self.engines {
                for (name, stamped) in &engine.state().values {
                    let key = (engine.id(), name.clone());
                    if let Some(previous) = self.stamps.get(&key) {
                        prop_assert!(
                            stamped.stamp >= *previous,
                            "{} moved {} back from {} to {}",
                            engine.id(), name, previous, stamped.stamp
                        );
                    }
                    self.stamps.insert(key, stamped.stamp);
                }
            }
            Ok(())
        }
    }

    fn run(mode: RaftMode, seed: u64, actions: Vec<Action>) -> Result<Harness, TestCaseError> {
        let mut harness = Harness::new(mode, seed, true);
        for action in actions {
            harness.apply(action);
            harness.check()?;
        }
        Ok(harness)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 1-3. Fault-tolerant mode under arbitrary schedules
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn fault_tolerant_safety(
            seed in any::<u64>(),
            actions in prop::collection::vec(action(), 50..=400),
        ) {
            let harness = run(RaftMode::FaultTolerant, seed, actions)?;
            // Commit indexes never run past the log.
            for engine in &harness.engines {
                let state = engine.state();
                prop_assert!(state.commit_index <= state.last_log_index());
                prop_assert!(state.last_applied <= state.commit_index);
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 1, 4. Lightweight mode under arbitrary schedules
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn lightweight_safety(
            seed in any::<u64>(),
            actions in prop::collection::vec(action(), 50..=400),
        ) {
            let harness = run(RaftMode::Lightweight, seed, actions)?;
            for engine in &harness.engines {
                prop_assert!(engine.log().is_empty(), "lightweight mode keeps no log");
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Liveness: a lossless, crash-free cluster elects and commits
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn connected_cluster_commits(seed in any::<u64>(), value in 0..1_000i64) {
            let mut harness = Harness::new(RaftMode::FaultTolerant, seed, true);
            let mut proposed = false;
            for _ in 0..400 {
                harness.apply(Action::Advance(2));
                while !harness.in_flight.is_empty() {
                    harness.apply(Action::Deliver(0));
                }
                harness.check()?;
                if !proposed && harness.engines.iter().any(|e| e.is_leader()) {
                    harness.apply(Action::Propose(value));
                    proposed = true;
                }
            }
            prop_assert!(proposed, "no leader within 800ms");
            for engine in &harness.engines {
                prop_assert_eq!(engine.state().commit_index, 1);
                prop_assert_eq!(engine.committed_value("seq"), Some(&ConsensusValue::Int(value)));
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Liveness: survivors of a crash elect and commit on the active set
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn survivors_elect_and_commit(
            seed in any::<u64>(),
            crashed in prop::collection::btree_set(0..NODES as usize, 2..=4),
            value in 0..1_000i64,
        ) {
            let mut harness = Harness::new(RaftMode::FaultTolerant, seed, false);
            for i in &crashed {
                harness.apply(Action::Crash(*i));
            }
            let mut proposed = false;
            for _ in 0..400 {
                harness.apply(Action::Advance(2));
                while !harness.in_flight.is_empty() {
                    harness.apply(Action::Deliver(0));
                }
                harness.check()?;
                let leader = (0..harness.engines.len())
                    .find(|i| !harness.down[*i] && harness.engines[*i].is_leader());
                if !proposed && leader.is_some() {
                    harness.apply(Action::Propose(value));
                    proposed = true;
                }
            }
            prop_assert!(proposed, "no leader among {} survivors", NODES as usize - crashed.len());
            for (i, engine) in harness.engines.iter().enumerate() {
                if crashed.contains(&i) {
                    continue;
                }
                prop_assert_eq!(engine.state().commit_index, 1);
                prop_assert_eq!(engine.committed_value("seq"), Some(&ConsensusValue::Int(value)));
            }
        }
    }
}
