//! Property-based tests for the heartbeat failure detector.
//!
//! Properties tested:
//! 1. After a tick, a peer's status is determined by its silence alone.
//! 2. The active set is the local node plus every non-failed peer.
//! 3. Every reported transition is one the state machine allows.

#[cfg(test)]
mod tests {
    use {
        proptest::prelude::*,
        raft_fault_consensus::{FailureConfig, HeartbeatDetector, NodeId, PeerStatus},
        std::collections::BTreeMap,
    };

    const LOCAL: NodeId = NodeId(0);

    #[derive(Debug, Clone)]
    enum Event {
        Advance(u64),
        Contact(u64),
    }

    fn event() -> impl Strategy<Value = Event> {
        prop_oneof![
            2 => (1..=60u64).prop_map(Event::Advance),
            1 => (1..=4u64).prop_map(Event::Contact),
        ]
    }

    fn expected_status(silence: u64, config: &FailureConfig) -> PeerStatus {
        if silence >= config.fail_after_ms {
            PeerStatus::Failed
        } else if silence >= config.suspect_after_ms {
            PeerStatus::Suspected
        } else {
            PeerStatus::Active
        }
    }

    fn allowed(from: PeerStatus, to: PeerStatus) -> bool {
        matches!(
            (from, to),
            (PeerStatus::Active, PeerStatus::Suspected)
                | (PeerStatus::Suspected, PeerStatus::Failed)
                | (PeerStatus::Suspected, PeerStatus::Active)
                | (PeerStatus::Failed, PeerStatus::Active)
        )
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 1-3. Detector state machine against a reference model
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn status_follows_silence(
            suspect_after_ms in 10..=100u64,
            extra in 1..=100u64,
            events in prop::collection::vec(event(), 1..=120),
        ) {
            let config = FailureConfig {
                suspect_after_ms,
                fail_after_ms: suspect_after_ms + extra,
            };
            let peers: Vec<NodeId> = (1..=3).map(NodeId).collect();
            let mut detector = HeartbeatDetector::new(LOCAL, config.clone(), peers, 0);
            let mut last_contact: BTreeMap<NodeId, u64> =
                (1..=3).map(|id| (NodeId(id), 0)).collect();
            let mut now = 0u64;

            for event in events {
                match event {
                    Event::Advance(ms) => now += ms,
                    Event::Contact(id) => {
                        let peer = NodeId(id);
                        let before = detector.status_of(&peer);
                        let change = detector.record_contact(peer, now);
                        last_contact.insert(peer, now);
                        prop_assert_eq!(detector.status_of(&peer), Some(PeerStatus::Active));
                        if let Some(change) = change {
                            prop_assert_eq!(Some(change.from), before);
                            prop_assert!(allowed(change.from, change.to));
                        }
                    }
                }

                for change in detector.tick(now) {
                    prop_assert!(
                        allowed(change.from, change.to),
                        "illegal transition {:?} -> {:?}", change.from, change.to
                    );
                }

                for (peer, contact) in &last_contact {
                    prop_assert_eq!(
                        detector.status_of(peer),
                        Some(expected_status(now - contact, &config)),
                        "{} silent for {}ms", peer, now - contact
                    );
                }

                let active = detector.active_set();
                prop_assert!(active.contains(&LOCAL));
                for (peer, contact) in &last_contact {
                    let failed = expected_status(now - contact, &config) == PeerStatus::Failed;
                    prop_assert_eq!(active.contains(peer), !failed);
                }
                // Node 4 is not a configured peer until it first speaks.
                let expected_len = 1 + detector
                    .records()
                    .filter(|r| r.status != PeerStatus::Failed)
                    .count();
                prop_assert_eq!(active.len(), expected_len);
            }
        }
    }
}
