//! Core value types shared by every component of the consensus engine.
//!
//! Defines node identity, the closed set of consensus value types, log
//! entries (fault-tolerant mode) and version stamps (lightweight mode).

use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Election epoch. Starts at 0 and only grows.
pub type Term = u64;

/// 1-based position in the replicated log. 0 means "no entry".
pub type LogIndex = u64;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque identifier of a participant, unique within a cluster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Consensus values
// ---------------------------------------------------------------------------

/// Declared type of a consensus variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int,
    Float,
    Bool,
    Text,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Text => write!(f, "text"),
        }
    }
}

/// A value agreed on for a registered consensus variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConsensusValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ConsensusValue {
    /// The type tag this value carries.
    pub fn value_type(&self) -> ValueType {
        match self {
            ConsensusValue::Int(_) => ValueType::Int,
            ConsensusValue::Float(_) => ValueType::Float,
            ConsensusValue::Bool(_) => ValueType::Bool,
            ConsensusValue::Text(_) => ValueType::Text,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConsensusValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for ConsensusValue {
    fn from(v: i64) -> Self {
        ConsensusValue::Int(v)
    }
}

impl From<f64> for ConsensusValue {
    fn from(v: f64) -> Self {
        ConsensusValue::Float(v)
    }
}

impl From<bool> for ConsensusValue {
    fn from(v: bool) -> Self {
        ConsensusValue::Bool(v)
    }
}

impl From<&str> for ConsensusValue {
    fn from(v: &str) -> Self {
        ConsensusValue::Text(v.to_string())
    }
}

impl From<String> for ConsensusValue {
    fn from(v: String) -> Self {
        ConsensusValue::Text(v)
    }
}

/// A named variable registered in the configuration before start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusVariable {
    pub name: String,
    pub value_type: ValueType,
}

impl ConsensusVariable {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Fault-tolerant mode: log entries
// ---------------------------------------------------------------------------

/// One slot of the replicated log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Term of the leader that created the entry.
    pub term: Term,
    /// 1-based, contiguous position in the log.
    pub index: LogIndex,
    /// Variable this entry updates.
    pub variable: String,
    /// New value for the variable.
    pub value: ConsensusValue,
}

// ---------------------------------------------------------------------------
// Lightweight mode: version stamps
// ---------------------------------------------------------------------------

/// Version stamp for lightweight replication.
///
/// Ordered by term first, then by version, so a newer leader always wins
/// over an older one regardless of how many writes the older one made.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Stamp {
    pub term: Term,
    pub version: u64,
}

impl Stamp {
    pub fn new(term: Term, version: u64) -> Self {
        Self { term, version }
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.term, self.version)
    }
}

/// A variable value paired with the stamp it was written under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedValue {
    pub value: ConsensusValue,
    pub stamp: Stamp,
}

/// A value that became visible to the host on this node.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedValue {
    pub variable: String,
    pub value: ConsensusValue,
    /// Log index (fault-tolerant) or stamp version (lightweight).
    pub index: LogIndex,
    pub term: Term,
}
