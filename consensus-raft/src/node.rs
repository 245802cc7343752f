//! Bridges a [`ConsensusEngine`] to a host [`Adapter`].
//!
//! The node owns the engine and the adapter. It reads time from the
//! adapter, feeds ticks, messages and proposals to the engine, and routes the
//! engine's output back through the adapter.
//!
//! ```text
//!  host timer ──tick()──▶ ┌──────────────┐
//!                         │   RaftNode   │──send/broadcast──▶ host transport
//!  host transport ──────▶ │  ┌────────┐  │
//!    on_message()         │  │ Engine │  │──applied values──▶ take_applied()
//!                         │  └────────┘  │
//!                         └──────────────┘
//! ```

use {
    crate::{
        adapter::{Adapter, MessageHandler, Telemetry},
        config::{ConfigError, RaftConfig},
        engine::{ConsensusEngine, EngineOutput, RaftStatus, Target},
        error::ProposeError,
        message::RaftMessage,
        quorum::MajoritySnapshot,
        types::{AppliedValue, ConsensusValue, NodeId},
    },
    log::*,
    std::collections::VecDeque,
};

/// Most applied values held between [`RaftNode::take_applied`] calls. Past
/// this the oldest are dropped.
pub const MAX_PENDING_APPLIED: usize = 1024;

/// One participating node: an engine plus the host adapter it talks through.
///
/// Applied values queue up until the host drains them with
/// [`RaftNode::take_applied`]; hosts should drain after every tick or
/// message. Committed state stays readable through [`RaftNode::engine`].
pub struct RaftNode<A: Adapter> {
    engine: ConsensusEngine,
    adapter: A,
    /// Values applied since the last [`RaftNode::take_applied`], at most
    /// [`MAX_PENDING_APPLIED`].
    applied: VecDeque<AppliedValue>,
}

impl<A: Adapter> RaftNode<A> {
    pub fn new(
        config: RaftConfig,
        id: NodeId,
        peers: Vec<NodeId>,
        adapter: A,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: ConsensusEngine::new(config, id, peers)?,
            adapter,
            applied: VecDeque::new(),
        })
    }

    pub fn start(&mut self) {
        let now = self.adapter.now_ms();
        self.engine.start(now);
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    /// Advance the engine to the adapter's current time.
    pub fn tick(&mut self) {
        let now = self.adapter.now_ms();
        let output = self.engine.tick(now);
        self.process_engine_output(output);
    }

    pub fn propose_value(
        &mut self,
        name: &str,
        value: impl Into<ConsensusValue>,
    ) -> Result<(), ProposeError> {
        let now = self.adapter.now_ms();
        let output = self.engine.propose_value(name, value.into(), now)?;
        self.process_engine_output(output);
        Ok(())
    }

    /// Drain the values applied since the last call, oldest first.
    pub fn take_applied(&mut self) -> Vec<AppliedValue> {
        self.applied.drain(..).collect()
    }

    pub fn has_quorum(&self) -> bool {
        self.engine.has_quorum()
    }

    pub fn get_majority_info(&self) -> MajoritySnapshot {
        self.engine.get_majority_info()
    }

    pub fn status(&self) -> RaftStatus {
        self.engine.status()
    }

    pub fn telemetry(&self) -> Option<Telemetry> {
        self.adapter.telemetry()
    }

    pub fn id(&self) -> NodeId {
        self.engine.id()
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    // -- Internal --

    fn process_engine_output(&mut self, output: EngineOutput) {
        for outbound in output.messages {
            let kind = outbound.message.kind();
            let result = match outbound.target {
                Target::Peer(to) => self.adapter.send(to, outbound.message),
                Target::Broadcast => self.adapter.broadcast(outbound.message),
            };
            if let Err(e) = result {
                warn!("{}: failed to send {kind}: {e}", self.engine.id());
            }
        }
        for applied in &output.applied {
            debug!(
                "{}: applied {}={:?} (index {}, term {})",
                self.engine.id(),
                applied.variable,
                applied.value,
                applied.index,
                applied.term
            );
        }
        self.applied.extend(output.applied);
        let excess = self.applied.len().saturating_sub(MAX_PENDING_APPLIED);
        if excess > 0 {
            warn!(
                "{}: {} applied values not drained, dropping the oldest",
                self.engine.id(),
                excess
            );
            self.applied.drain(..excess);
        }
    }
}

impl<A: Adapter> MessageHandler for RaftNode<A> {
    fn on_message(&mut self, from: NodeId, message: RaftMessage) {
        let now = self.adapter.now_ms();
        let output = self.engine.on_message(from, message, now);
        self.process_engine_output(output);
    }
}
