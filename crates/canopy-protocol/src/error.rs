//! Fatal protocol violations.

use thiserror::Error;

use crate::message::MessageKind;
use crate::types::NodeId;

/// An unrecoverable breach of the message payload contract.
///
/// Expected runtime events (node death, messages dropped because their
/// sender died) are not errors. This enum covers only bugs in the
/// protocol logic itself; a run that hits one aborts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// A handler needed the edge payload but the sender never set it.
    #[error("{kind:?} from node {sender} carries no edge payload")]
    MissingEdge { kind: MessageKind, sender: NodeId },

    /// A handler needed the leader-id payload but the sender never set it.
    #[error("{kind:?} from node {sender} carries no leader payload")]
    MissingLeader { kind: MessageKind, sender: NodeId },
}
