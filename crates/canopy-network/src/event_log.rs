//! Ordered record of what a run did.

use std::collections::HashSet;

use canopy_protocol::{Edge, NodeId, SimEvent};

/// Collects [`SimEvent`]s in the order they happen.
///
/// While the scheduler repairs the tree after a death it rebuilds
/// silently: the `enabled` flag hides those events. Committed-edge keys
/// keep accumulating even while the log is disabled, so a link recorded
/// during a silent rebuild stays silent if it is recorded again later.
#[derive(Debug)]
pub struct EventLog {
    events: Vec<SimEvent>,
    enabled: bool,
    written_edges: HashSet<(NodeId, NodeId)>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            enabled: true,
            written_edges: HashSet::new(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn record(&mut self, event: SimEvent) {
        if self.enabled {
            self.events.push(event);
        }
    }

    /// Record a committed tree edge at most once per unordered endpoint
    /// pair. The pair is remembered even when the log is disabled.
    pub fn record_edge(&mut self, edge: Edge) {
        let key = Self::pair(edge.left, edge.right);
        if !self.written_edges.contains(&key) {
            self.record(SimEvent::EdgeAdded(edge));
        }
        self.written_edges.insert(key);
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    fn pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(l: u32, r: u32) -> Edge {
        Edge::new(NodeId::new(l), NodeId::new(r), 1.0)
    }

    #[test]
    fn test_edge_recorded_once_per_pair() {
        let mut log = EventLog::new();
        log.record_edge(edge(1, 2));
        log.record_edge(edge(2, 1)); // other orientation, same link
        assert_eq!(log.events().len(), 1);
    }

    #[test]
    fn test_disabled_log_records_nothing() {
        let mut log = EventLog::new();
        log.set_enabled(false);
        log.record(SimEvent::Elected(NodeId::new(3)));
        log.record_edge(edge(1, 2));
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_edge_seen_while_disabled_stays_silent_after_enabling() {
        let mut log = EventLog::new();
        log.set_enabled(false);
        log.record_edge(edge(1, 2));
        log.set_enabled(true);
        log.record_edge(edge(1, 2));
        assert!(log.events().is_empty());
    }
}
