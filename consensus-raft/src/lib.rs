//! Raft consensus with an active-node quorum and a heartbeat failure detector
//!
//! This crate implements a Raft-family consensus engine meant to be embedded
//! in a host application (a discrete-event network simulation, a test
//! harness, a daemon) through a small capability interface. It runs in one
//! of two modes:
//!
//! 1. **Lightweight** — nodes agree on the latest value of a few named
//!    consensus variables. There is no log; every value carries a
//!    `(term, version)` stamp and a node only moves a variable forward to a
//!    strictly newer stamp.
//! 2. **Fault-tolerant** — proposals are appended to a replicated log and
//!    committed once a majority holds them, with the usual Raft rule that a
//!    leader only commits entries from its own term.
//!
//! # Key Properties
//!
//! - **Election safety**: at most one leader per term. Votes are granted
//!   once per term and only to candidates whose log (or newest stamp) is at
//!   least as up-to-date as the voter's.
//! - **Active-node quorum**: required majorities are computed from the set
//!   of peers the failure detector currently believes reachable. This view
//!   is local and advisory; votes and commits never count fewer than a
//!   majority of the configured cluster.
//! - **Failure detection**: a peer silent for `suspect_after_ms` becomes
//!   Suspected and, after `fail_after_ms`, Failed. Any message restores it.
//! - **Determinism**: no threads, no clocks. The host drives the engine with
//!   ticks and messages stamped with its own `now`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  RaftNode<A>                 │
//! │  ┌────────────────────────────────────────┐  │
//! │  │            ConsensusEngine             │  │
//! │  │  ┌──────────┐ ┌───────────┐ ┌────────┐ │  │
//! │  │  │ Config   │ │ Heartbeat │ │Timeout │ │  │
//! │  │  │          │ │ Detector  │ │Schedul.│ │  │
//! │  │  └──────────┘ └─────┬─────┘ └────────┘ │  │
//! │  │                     │ ActiveSet        │  │
//! │  │               ┌─────▼─────┐            │  │
//! │  │               │  Quorum   │            │  │
//! │  │               └───────────┘            │  │
//! │  │  ┌──────────────────────────────────┐  │  │
//! │  │  │ RaftState: term, vote, role, log │  │  │
//! │  │  └──────────────────────────────────┘  │  │
//! │  └────────────────────────────────────────┘  │
//! │          Adapter: send / broadcast / now     │
//! └──────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod failure_detector;
pub mod message;
pub mod node;
pub mod quorum;
pub mod state;
pub mod timeout;
pub mod types;

// Re-exports for convenience
pub use adapter::{Adapter, MessageHandler, Telemetry};
pub use config::{ConfigError, FailureConfig, RaftConfig, RaftMode};
pub use engine::{ConsensusEngine, EngineOutput, Outbound, RaftStatus, Target};
pub use error::{CodecError, ProposeError, TransportError};
pub use failure_detector::{
    ActiveSet, HeartbeatDetector, PeerLivenessRecord, PeerStatus, StatusChange,
};
pub use message::{
    Ack, AppendEntries, AppendEntriesResponse, RaftMessage, Replication, RequestVote,
    RequestVoteResponse,
};
pub use node::RaftNode;
pub use quorum::{count_acks, evaluate, required_majority, MajoritySnapshot};
pub use state::{RaftState, Role};
pub use timeout::TimeoutScheduler;
pub use types::{
    AppliedValue, ConsensusValue, ConsensusVariable, LogEntry, LogIndex, NodeId, Stamp,
    StampedValue, Term, ValueType,
};
