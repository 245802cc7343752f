//! Raft wire messages and their optional bincode codec.
//!
//! The engine exchanges [`RaftMessage`] values with the host. Hosts that move
//! bytes rather than values can use the framed codec: every frame is a
//! 4-byte little-endian length followed by a bincode payload.

use {
    crate::{
        error::{CodecError, Result},
        types::{LogEntry, LogIndex, NodeId, Stamp, StampedValue, Term},
    },
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
};

/// Default upper bound for a single encoded frame.
pub const MAX_FRAME_SIZE: usize = 1_048_576;

const FRAME_HEADER_LEN: usize = 4;

// ── Elections ───────────────────────────────────────────────────────────────

/// Sent by a candidate to solicit a vote.
///
/// In lightweight mode there is no log, so `last_log_index` and
/// `last_log_term` carry the version and term of the newest stamp the
/// candidate has applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVote {
    pub term: Term,
    pub candidate_id: NodeId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub term: Term,
    pub vote_granted: bool,
}

// ── Replication ─────────────────────────────────────────────────────────────

/// What an AppendEntries carries, depending on the operating mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Replication {
    /// Log entries starting at `prev_log_index + 1`. Empty for a heartbeat.
    Entries(Vec<LogEntry>),
    /// Latest value of every variable the leader knows, plus the leader's
    /// current stamp.
    Variables {
        values: BTreeMap<String, StampedValue>,
        stamp: Stamp,
    },
}

impl Replication {
    pub fn is_empty(&self) -> bool {
        match self {
            Replication::Entries(entries) => entries.is_empty(),
            Replication::Variables { values, .. } => values.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendEntries {
    pub term: Term,
    pub leader_id: NodeId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub payload: Replication,
    pub leader_commit: LogIndex,
}

/// Acknowledgement carried by an AppendEntries response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ack {
    /// Highest index known to match the leader. On failure, a hint for
    /// where the leader should retry from.
    MatchIndex(LogIndex),
    /// Newest stamp the follower has applied.
    Stamp(Stamp),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: Term,
    pub success: bool,
    pub ack: Ack,
}

// ── Wire message ────────────────────────────────────────────────────────────

/// Top-level Raft message exchanged between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaftMessage {
    RequestVote(RequestVote),
    RequestVoteResponse(RequestVoteResponse),
    AppendEntries(AppendEntries),
    AppendEntriesResponse(AppendEntriesResponse),
}

impl RaftMessage {
    /// Term stamped on the message.
    pub fn term(&self) -> Term {
        match self {
            Self::RequestVote(m) => m.term,
            Self::RequestVoteResponse(m) => m.term,
            Self::AppendEntries(m) => m.term,
            Self::AppendEntriesResponse(m) => m.term,
        }
    }

    /// Return a human-readable tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestVote(_) => "request_vote",
            Self::RequestVoteResponse(_) => "request_vote_response",
            Self::AppendEntries(m) if m.payload.is_empty() => "heartbeat",
            Self::AppendEntries(_) => "append_entries",
            Self::AppendEntriesResponse(_) => "append_entries_response",
        }
    }

    /// Serialize this message to bytes using bincode.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(CodecError::Serialization)
    }

    /// Deserialize a message from bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(CodecError::Serialization)
    }

    /// Serialize with a 4-byte little-endian length prefix.
    ///
    /// Wire format: `[len: u32-le][payload: len bytes]`
    pub fn serialize_framed(&self, max_size: usize) -> Result<Vec<u8>> {
        let payload = self.serialize()?;
        if payload.len() > max_size || u32::try_from(payload.len()).is_err() {
            return Err(CodecError::FrameTooLarge {
                size: payload.len(),
                max: max_size,
            });
        }
        let len = payload.len() as u32;
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN.saturating_add(payload.len()));
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Read the length prefix from a 4-byte buffer.
    pub fn read_frame_len(header: &[u8; 4]) -> usize {
        u32::from_le_bytes(*header) as usize
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns the message and the number of bytes consumed.
    pub fn deserialize_framed(buf: &[u8], max_size: usize) -> Result<(Self, usize)> {
        let Some(header) = buf.get(..FRAME_HEADER_LEN) else {
            return Err(CodecError::TruncatedFrame);
        };
        let mut len_bytes = [0u8; FRAME_HEADER_LEN];
        len_bytes.copy_from_slice(header);
        let len = Self::read_frame_len(&len_bytes);
        if len > max_size {
            return Err(CodecError::FrameTooLarge {
                size: len,
                max: max_size,
            });
        }
        let end = FRAME_HEADER_LEN.saturating_add(len);
        let Some(payload) = buf.get(FRAME_HEADER_LEN..end) else {
            return Err(CodecError::TruncatedFrame);
        };
        Ok((Self::deserialize(payload)?, end))
    }
}

impl From<RequestVote> for RaftMessage {
    fn from(m: RequestVote) -> Self {
        Self::RequestVote(m)
    }
}

impl From<RequestVoteResponse> for RaftMessage {
    fn from(m: RequestVoteResponse) -> Self {
        Self::RequestVoteResponse(m)
    }
}

impl From<AppendEntries> for RaftMessage {
    fn from(m: AppendEntries) -> Self {
        Self::AppendEntries(m)
    }
}

impl From<AppendEntriesResponse> for RaftMessage {
    fn from(m: AppendEntriesResponse) -> Self {
        Self::AppendEntriesResponse(m)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
