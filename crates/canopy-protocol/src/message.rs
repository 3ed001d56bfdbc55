//! The message envelope exchanged between nodes.

use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::error::ProtocolError;
use crate::types::NodeId;

/// Every kind of message the protocol exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Range probe sent during neighbor discovery.
    Discover,
    /// Positive answer to a range probe.
    DiscoverReply,
    /// Leader's request to locate the fragment's lightest outgoing edge.
    FindMwoe,
    /// Candidate outgoing edge reported back toward the leader.
    ReportMwoe,
    /// Leader's pick, flooded so the owning endpoint connects over it.
    SelectedMwoe,
    /// Merge request sent across the chosen edge.
    Connect,
    /// Merge acknowledgement sent back across the chosen edge.
    ConnectAccept,
    /// Leader id flood after a merge round.
    LeaderChange,
    /// Fragment-membership probe for one neighbor link.
    TestEdge,
    /// Probe answer: the link leaves the sender's fragment.
    AcceptEdge,
    /// Probe answer: the link stays inside the sender's fragment.
    RejectEdge,
    /// Application payload travelling along tree links.
    Data,
    /// Dying node's notice to its tree neighbors.
    NodeDown,
    /// Leader id flood used while repairing after a death.
    EmergencyLeader,
}

/// A single transient message: created, delivered once, discarded.
///
/// The two payload slots are populated only by the kinds that need them
/// (`edge` by ReportMwoe/SelectedMwoe/Connect/ConnectAccept, `leader` by
/// LeaderChange/EmergencyLeader/TestEdge). A handler that requires a
/// payload its sender never set aborts the run with a [`ProtocolError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: NodeId,
    pub receiver: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<Edge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<NodeId>,
}

impl Message {
    pub fn new(kind: MessageKind, sender: NodeId, receiver: NodeId) -> Self {
        Self {
            kind,
            sender,
            receiver,
            edge: None,
            leader: None,
        }
    }

    /// Attach the edge payload.
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Attach the leader-id payload.
    pub fn with_leader(mut self, leader: NodeId) -> Self {
        self.leader = Some(leader);
        self
    }

    /// The edge payload, or the protocol violation that it is missing.
    pub fn require_edge(&self) -> Result<Edge, ProtocolError> {
        self.edge.ok_or(ProtocolError::MissingEdge {
            kind: self.kind,
            sender: self.sender,
        })
    }

    /// The leader-id payload, or the protocol violation that it is missing.
    pub fn require_leader(&self) -> Result<NodeId, ProtocolError> {
        self.leader.ok_or(ProtocolError::MissingLeader {
            kind: self.kind,
            sender: self.sender,
        })
    }
}
