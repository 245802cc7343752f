//! Host capability interface.
//!
//! The engine never touches a transport or a clock directly. A host
//! implements [`Adapter`] to give a [`RaftNode`](crate::RaftNode) the ability
//! to send messages and read time, and delivers inbound messages through the
//! node's [`MessageHandler`] implementation.

use crate::{error::TransportError, message::RaftMessage, types::NodeId};

/// Host-side node telemetry. Never read by the consensus core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Position in the host's coordinate system.
    pub position: (f64, f64, f64),
}

/// Capabilities the host provides to a node.
pub trait Adapter {
    /// Best-effort delivery to one peer. Failures are logged and dropped.
    fn send(&mut self, to: NodeId, message: RaftMessage) -> Result<(), TransportError>;

    /// Best-effort delivery to every known peer.
    fn broadcast(&mut self, message: RaftMessage) -> Result<(), TransportError>;

    /// Monotonic time in milliseconds.
    fn now_ms(&self) -> u64;

    fn telemetry(&self) -> Option<Telemetry> {
        None
    }
}

/// Inbound delivery callback. The host calls this for every message
/// addressed to the node.
pub trait MessageHandler {
    fn on_message(&mut self, from: NodeId, message: RaftMessage);
}
