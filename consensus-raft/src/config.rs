//! Raft engine configuration.
//!
//! Defines election and heartbeat timing, failure-detector thresholds, the
//! consensus-variable schema and the operating mode. A config is validated
//! once when the engine is constructed and is immutable afterwards.

use {
    crate::types::{ConsensusVariable, ValueType},
    serde::{Deserialize, Serialize},
    std::collections::HashSet,
};

/// Replication strategy used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaftMode {
    /// Agree on the latest value of each variable, no replicated log.
    Lightweight,
    /// Replicated log with leader-driven commitment.
    FaultTolerant,
}

/// Thresholds for the heartbeat failure detector.
///
/// All values are in milliseconds of silence since the last message
/// received from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureConfig {
    /// Silence after which a peer is Suspected.
    /// Default: 150.
    pub suspect_after_ms: u64,

    /// Silence after which a peer is Failed and leaves the active set.
    /// Default: 300.
    pub fail_after_ms: u64,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            suspect_after_ms: 150,
            fail_after_ms: 300,
        }
    }
}

/// Configuration for the Raft consensus engine.
///
/// All timeouts are in milliseconds against the host's monotonic clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaftConfig {
    /// Lower bound of the randomized election timeout.
    /// Default: 150.
    pub election_timeout_min_ms: u64,

    /// Upper bound (inclusive) of the randomized election timeout.
    /// Default: 300.
    pub election_timeout_max_ms: u64,

    /// Interval between leader heartbeats.
    /// Default: 50.
    pub heartbeat_interval_ms: u64,

    /// Failure-detector thresholds.
    pub failure: FailureConfig,

    /// Operating mode.
    /// Default: `Lightweight`.
    pub mode: RaftMode,

    /// Registered consensus variables. Names must be unique.
    pub variables: Vec<ConsensusVariable>,

    /// Upper bound on log entries carried by one AppendEntries.
    /// Default: 64.
    pub max_entries_per_append: usize,

    /// Seed for the election-timeout RNG. `None` seeds from the OS.
    pub random_seed: Option<u64>,

    /// Also require a majority of the configured cluster, not only of the
    /// active set, before winning an election or committing an entry.
    /// Trades availability with most peers down for safety under
    /// partitions where failure-detector views disagree.
    /// Default: `false`.
    pub static_majority_floor: bool,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_min_ms: 150,
            election_timeout_max_ms: 300,
            heartbeat_interval_ms: 50,
            failure: FailureConfig::default(),
            mode: RaftMode::Lightweight,
            variables: Vec::new(),
            max_entries_per_append: 64,
            random_seed: None,
            static_majority_floor: false,
        }
    }
}

impl RaftConfig {
    /// Default configuration in the given mode.
    pub fn with_mode(mode: RaftMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Create a config suitable for simulation with tick-sized timeouts.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default(mode: RaftMode) -> Self {
        Self {
            election_timeout_min_ms: 30,
            election_timeout_max_ms: 60,
            heartbeat_interval_ms: 10,
            failure: FailureConfig {
                suspect_after_ms: 40,
                fail_after_ms: 80,
            },
            mode,
            variables: Vec::new(),
            max_entries_per_append: 16,
            random_seed: Some(7),
            static_majority_floor: false,
        }
    }

    /// Register a consensus variable. Duplicate names are rejected.
    pub fn register_variable(
        &mut self,
        name: impl Into<String>,
        value_type: ValueType,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::EmptyVariableName);
        }
        if self.variables.iter().any(|v| v.name == name) {
            return Err(ConfigError::DuplicateVariable(name));
        }
        self.variables.push(ConsensusVariable::new(name, value_type));
        Ok(())
    }

    /// Builder-style variant of [`RaftConfig::register_variable`].
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
    ) -> Result<Self, ConfigError> {
        self.register_variable(name, value_type)?;
        Ok(self)
    }

    /// Look up the declared type of a variable.
    pub fn variable_type(&self, name: &str) -> Option<ValueType> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value_type)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidHeartbeatInterval);
        }
        if self.election_timeout_min_ms >= self.election_timeout_max_ms {
            return Err(ConfigError::InvalidElectionTimeoutRange {
                min: self.election_timeout_min_ms,
                max: self.election_timeout_max_ms,
            });
        }
        if self.election_timeout_min_ms <= self.heartbeat_interval_ms {
            return Err(ConfigError::ElectionTimeoutNotAboveHeartbeat {
                min: self.election_timeout_min_ms,
                heartbeat: self.heartbeat_interval_ms,
            });
        }
        if self.failure.suspect_after_ms == 0
            || self.failure.suspect_after_ms >= self.failure.fail_after_ms
        {
            return Err(ConfigError::InvalidFailureThresholds {
                suspect_after: self.failure.suspect_after_ms,
                fail_after: self.failure.fail_after_ms,
            });
        }
        if self.max_entries_per_append == 0 {
            return Err(ConfigError::InvalidMaxEntriesPerAppend);
        }
        let mut seen = HashSet::new();
        for variable in &self.variables {
            if variable.name.is_empty() {
                return Err(ConfigError::EmptyVariableName);
            }
            if !seen.insert(variable.name.as_str()) {
                return Err(ConfigError::DuplicateVariable(variable.name.clone()));
            }
        }
        Ok(())
    }
}

/// Errors in Raft configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("election timeout range must satisfy min < max, got [{min}, {max}]")]
    InvalidElectionTimeoutRange { min: u64, max: u64 },
    #[error("election_timeout_min_ms ({min}) must be greater than heartbeat_interval_ms ({heartbeat})")]
    ElectionTimeoutNotAboveHeartbeat { min: u64, heartbeat: u64 },
    #[error("heartbeat_interval_ms must be > 0")]
    InvalidHeartbeatInterval,
    #[error("failure thresholds must satisfy 0 < suspect_after ({suspect_after}) < fail_after ({fail_after})")]
    InvalidFailureThresholds { suspect_after: u64, fail_after: u64 },
    #[error("consensus variable {0:?} registered twice")]
    DuplicateVariable(String),
    #[error("consensus variable name must not be empty")]
    EmptyVariableName,
    #[error("max_entries_per_append must be > 0")]
    InvalidMaxEntriesPerAppend,
    #[error("peer {0} listed more than once")]
    DuplicatePeer(crate::types::NodeId),
    #[error("local node {0} must not appear in its own peer list")]
    SelfInPeerList(crate::types::NodeId),
}
