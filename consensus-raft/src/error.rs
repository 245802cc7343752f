//! Error types for proposals, transport and the wire codec.
//!
//! Protocol outcomes (stale terms, log mismatches) are not errors; they are
//! handled inside the engine as state transitions.

use {
    crate::types::{NodeId, ValueType},
    thiserror::Error,
};

/// Rejection of a [`propose_value`](crate::ConsensusEngine::propose_value) call.
///
/// None of these are fatal; the caller may retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProposeError {
    /// This node is not the leader. `leader_hint` is the last leader seen
    /// in the current term, if any.
    #[error("not leader (leader hint: {leader_hint:?})")]
    NotLeader { leader_hint: Option<NodeId> },

    /// The variable was never registered in the configuration.
    #[error("unknown consensus variable {0:?}")]
    UnknownVariable(String),

    /// The value's type does not match the registered type.
    #[error("type mismatch for {name:?}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
    },

    /// The engine has been stopped.
    #[error("engine stopped")]
    Stopped,
}

/// Errors reported by an [`Adapter`](crate::Adapter) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The destination cannot be reached right now.
    #[error("peer unreachable: {0}")]
    Unreachable(NodeId),

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,

    /// Any other host-specific failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Errors from the optional bincode wire codec.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Failed to (de)serialize a message.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Encoded message exceeds the maximum frame size.
    #[error("frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge {
        /// Actual message size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Buffer ended before the declared frame length.
    #[error("truncated frame")]
    TruncatedFrame,
}

/// Convenience result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
