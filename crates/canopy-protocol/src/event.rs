//! Structured record of what a run did.

use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::types::NodeId;

/// One observable happening in a simulation run.
///
/// The scheduler appends these in order; the run-log renderer turns each
/// into exactly one line of the log artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Leaders contacted at the start of a construction round.
    RoundLeaders(Vec<NodeId>),
    /// A node became the leader of a newly merged fragment.
    Elected(NodeId),
    /// A link was committed to the tree.
    EdgeAdded(Edge),
    /// One data hop, with the sender's energy after paying for it.
    DataHop { from: NodeId, to: NodeId, energy: f32 },
    /// A node ran out of energy and left the network.
    NodeDown(NodeId),
}
