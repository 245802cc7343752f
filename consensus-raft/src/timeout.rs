//! Election and heartbeat deadlines.
//!
//! Deadlines are plain millisecond timestamps compared against the `now`
//! passed in by the host; nothing here reads a clock. Re-arming a deadline
//! implicitly cancels the previous one.

use {
    crate::config::RaftConfig,
    rand::{Rng, SeedableRng},
    rand_chacha::ChaCha8Rng,
};

/// Tracks the election deadline (followers and candidates) and the
/// heartbeat deadline (leaders).
#[derive(Debug, Clone)]
pub struct TimeoutScheduler {
    election_timeout_min_ms: u64,
    election_timeout_max_ms: u64,
    heartbeat_interval_ms: u64,
    rng: ChaCha8Rng,
    election_deadline: Option<u64>,
    heartbeat_deadline: Option<u64>,
}

impl TimeoutScheduler {
    /// Create a scheduler. The RNG is seeded from `config.random_seed`, or
    /// from the OS when unset.
    pub fn new(config: &RaftConfig) -> Self {
        let seed = config.random_seed.unwrap_or_else(rand::random);
        Self {
            election_timeout_min_ms: config.election_timeout_min_ms,
            election_timeout_max_ms: config.election_timeout_max_ms,
            heartbeat_interval_ms: config.heartbeat_interval_ms,
            rng: ChaCha8Rng::seed_from_u64(seed),
            election_deadline: None,
            heartbeat_deadline: None,
        }
    }

    /// Draw a fresh election timeout uniformly from the configured range.
    pub fn random_election_timeout(&mut self) -> u64 {
        self.rng
            .random_range(self.election_timeout_min_ms..=self.election_timeout_max_ms)
    }

    /// Arm a new randomized election deadline relative to `now` and return it.
    pub fn reset_election(&mut self, now: u64) -> u64 {
        let deadline = now.saturating_add(self.random_election_timeout());
        self.election_deadline = Some(deadline);
        deadline
    }

    /// Arm the next heartbeat one interval after `now`.
    pub fn arm_heartbeat(&mut self, now: u64) {
        self.heartbeat_deadline = Some(now.saturating_add(self.heartbeat_interval_ms));
    }

    pub fn cancel_election(&mut self) {
        self.election_deadline = None;
    }

    pub fn cancel_heartbeat(&mut self) {
        self.heartbeat_deadline = None;
    }

    /// Cancel both deadlines.
    pub fn cancel(&mut self) {
        self.election_deadline = None;
        self.heartbeat_deadline = None;
    }

    pub fn election_expired(&self, now: u64) -> bool {
        self.election_deadline.is_some_and(|d| now >= d)
    }

    pub fn heartbeat_due(&self, now: u64) -> bool {
        self.heartbeat_deadline.is_some_and(|d| now >= d)
    }

    pub fn election_deadline(&self) -> Option<u64> {
        self.election_deadline
    }

    pub fn heartbeat_deadline(&self) -> Option<u64> {
        self.heartbeat_deadline
    }

    /// Milliseconds left before the election deadline, or `None` if unarmed.
    pub fn election_remaining(&self, now: u64) -> Option<u64> {
        self.election_deadline.map(|d| d.saturating_sub(now))
    }
}
