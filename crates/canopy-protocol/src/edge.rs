//! Weighted links between nodes.

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// An undirected weighted link between two nodes.
///
/// When an edge describes an outgoing candidate, `left` is the endpoint
/// inside the originating fragment and `right` the endpoint outside it.
/// Equality is symmetric in the endpoints and includes the weight:
/// `{a, b, w}` equals `{b, a, w}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Edge {
    pub left: NodeId,
    pub right: NodeId,
    pub weight: f32,
}

impl Edge {
    pub fn new(left: NodeId, right: NodeId, weight: f32) -> Self {
        Self {
            left,
            right,
            weight,
        }
    }

    /// The same link seen from the other endpoint.
    pub fn reverse(&self) -> Self {
        Self {
            left: self.right,
            right: self.left,
            weight: self.weight,
        }
    }

    /// The lighter of two edges. `b` wins ties, so a fold that passes its
    /// running minimum as `b` keeps the earliest of equally light edges.
    pub fn smaller_of(a: Edge, b: Edge) -> Edge {
        if a.weight < b.weight {
            a
        } else {
            b
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        let same_endpoints = (self.left == other.left && self.right == other.right)
            || (self.left == other.right && self.right == other.left);
        same_endpoints && self.weight == other.weight
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.left, self.right)
    }
}
