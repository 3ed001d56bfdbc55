//! Round-driven scheduler over the node roster.

use canopy_protocol::{MessageKind, NodeId, Position, ProtocolError, SimEvent};

use crate::event_log::EventLog;
use crate::node::{Node, PeerView};
use crate::outbox::Outbox;

/// The whole simulated network: roster, current fragment leaders,
/// scheduled broadcasts, and the shared outbox.
///
/// Single-threaded and deterministic. Nodes step in roster order,
/// messages deliver in send order at sweep boundaries, and the only
/// termination signal any phase uses is a sweep that leaves the outbox
/// empty. Waiting is modeled by per-node reply counters, never by
/// suspension.
#[derive(Debug)]
pub struct Network {
    nodes: Vec<Node>,
    /// One entry per fragment, oldest fragment first.
    leaders: Vec<NodeId>,
    broadcasts: Vec<NodeId>,
    outbox: Outbox,
    events: EventLog,
    min_energy: f32,
}

impl Network {
    pub fn new(min_energy: f32) -> Self {
        Self {
            nodes: Vec::new(),
            leaders: Vec::new(),
            broadcasts: Vec::new(),
            outbox: Outbox::new(),
            events: EventLog::new(),
            min_energy,
        }
    }

    /// Add a node to the roster. It starts out leading its own
    /// single-node fragment.
    pub fn add_node(&mut self, id: NodeId, position: Position, energy: f32, range: f32) {
        self.nodes.push(Node::new(id, position, energy, range));
        self.leaders.push(id);
    }

    /// Schedule a data broadcast rooted at `id`.
    pub fn add_broadcast(&mut self, id: NodeId) {
        self.broadcasts.push(id);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        Self::find(&self.nodes, id)
    }

    pub fn alive_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_alive()).count()
    }

    pub fn events(&self) -> &[SimEvent] {
        self.events.events()
    }

    /// Pair up every node with every distinct node inside its own range.
    ///
    /// With a uniform range the resulting neighbor relation is
    /// symmetric: both endpoints learn of each other in the same
    /// exchange.
    pub fn discover(&mut self) -> Result<(), ProtocolError> {
        tracing::info!(nodes = self.nodes.len(), "Discovery start");
        for i in 0..self.nodes.len() {
            for j in 0..self.nodes.len() {
                let (prober, target) = (&self.nodes[i], &self.nodes[j]);
                if prober.id() != target.id()
                    && prober.position().distance(&target.position()) <= prober.range()
                {
                    prober.initiate_discover(target.id(), &mut self.outbox);
                }
            }
        }
        self.run_until_quiet()
    }

    /// Merge fragments over minimum outgoing edges until no fragment can
    /// see a way out of itself.
    ///
    /// Each round: leaders hunt for candidate edges, commit the lightest
    /// find per fragment, then flood their ids so every merged fragment
    /// settles on one leader. A round that gathers no candidates ends
    /// construction.
    pub fn build_mst(&mut self) -> Result<(), ProtocolError> {
        tracing::info!("Tree construction start");
        loop {
            self.events.record(SimEvent::RoundLeaders(self.leaders.clone()));
            tracing::debug!(leaders = ?self.leaders, "Construction round");

            let leader_ids = self.leaders.clone();

            for &id in &leader_ids {
                let view = self.peer_view();
                if let Some(leader) = Self::find_mut(&mut self.nodes, id) {
                    leader.initiate_edge_find(&view, &mut self.outbox);
                }
            }
            self.run_until_quiet()?;

            let mut gathered = 0;
            for &id in &leader_ids {
                if let Some(leader) = self.node(id) {
                    for candidate in leader.candidate_edges() {
                        tracing::debug!(leader = %id, candidate = %candidate, "Candidate edge");
                    }
                    gathered += leader.candidate_edges().len();
                }
            }
            tracing::debug!(candidates = gathered, "Edge hunt finished");
            if gathered == 0 {
                break;
            }

            for &id in &leader_ids {
                if let Some(leader) = Self::find(&self.nodes, id) {
                    leader.initiate_merge(&mut self.outbox);
                }
            }
            self.run_until_quiet()?;

            for &id in &leader_ids {
                if let Some(leader) = Self::find(&self.nodes, id) {
                    leader.initiate_leader_change(&mut self.outbox);
                }
            }
            self.run_until_quiet()?;

            self.settle_leaders();
        }
        tracing::info!("Tree construction finished");
        Ok(())
    }

    /// Run every scheduled broadcast in order, rebuilding the tree
    /// silently whenever a relay dies along the way.
    pub fn execute_transmissions(&mut self) -> Result<(), ProtocolError> {
        let mut alive_before = self.nodes.len();
        let scheduled = self.broadcasts.clone();
        for &origin in &scheduled {
            tracing::info!(origin = %origin, "Data broadcast");
            let view = self.peer_view();
            if let Some(node) = Self::find_mut(&mut self.nodes, origin) {
                if node.is_alive() {
                    node.data_broadcast(
                        None,
                        &view,
                        &mut self.outbox,
                        &mut self.events,
                        self.min_energy,
                    );
                }
            }
            self.run_until_quiet()?;

            let alive_now = self.alive_count();
            if alive_now < alive_before {
                // Survivors promoted themselves when the death notices
                // reached them; those fragments seed the rebuild.
                self.leaders = self
                    .nodes
                    .iter()
                    .filter(|n| n.is_leader())
                    .map(|n| n.id())
                    .collect();
                tracing::info!(leaders = ?self.leaders, "Rebuilding tree after node loss");
                self.events.set_enabled(false);
                self.build_mst()?;
                self.events.set_enabled(true);
            }
            alive_before = alive_now;
        }
        Ok(())
    }

    /// The round barrier: step every alive node in roster order, then
    /// deliver the sweep's traffic, until a sweep ends with nothing left
    /// to deliver.
    fn run_until_quiet(&mut self) -> Result<(), ProtocolError> {
        loop {
            for i in 0..self.nodes.len() {
                if !self.nodes[i].is_alive() {
                    continue;
                }
                let view = self.peer_view();
                self.nodes[i].step(&view, &mut self.outbox, &mut self.events, self.min_energy)?;
            }
            let pending = self.outbox.len();
            self.flush();
            if pending == 0 {
                return Ok(());
            }
        }
    }

    /// Deliver the backlog in send order. Messages whose sender died
    /// before the flush are dropped, except death notices, which always
    /// go through.
    fn flush(&mut self) {
        for message in self.outbox.drain() {
            let sender_alive = Self::find(&self.nodes, message.sender).is_some_and(Node::is_alive);
            if sender_alive || message.kind == MessageKind::NodeDown {
                tracing::trace!(
                    kind = ?message.kind,
                    from = %message.sender,
                    to = %message.receiver,
                    "Deliver"
                );
                if let Some(receiver) = Self::find_mut(&mut self.nodes, message.receiver) {
                    receiver.deliver(message);
                }
            }
        }
    }

    /// Drop leaders that adopted someone else and record, once each, who
    /// they adopted.
    fn settle_leaders(&mut self) {
        let mut remaining = Vec::new();
        let mut adopted: Vec<NodeId> = Vec::new();
        for &id in &self.leaders {
            let Some(node) = Self::find(&self.nodes, id) else {
                continue;
            };
            if node.is_leader() {
                remaining.push(id);
            } else if !adopted.contains(&node.leader_id()) {
                adopted.push(node.leader_id());
            }
        }
        self.leaders = remaining;
        for leader in adopted {
            tracing::info!(leader = %leader, "Leader elected");
            self.events.record(SimEvent::Elected(leader));
        }
    }

    fn peer_view(&self) -> PeerView {
        let mut view = PeerView::new();
        for node in &self.nodes {
            view.insert(node.peer_info());
        }
        view
    }

    fn find(nodes: &[Node], id: NodeId) -> Option<&Node> {
        nodes.iter().find(|n| n.id() == id)
    }

    fn find_mut(nodes: &mut [Node], id: NodeId) -> Option<&mut Node> {
        nodes.iter_mut().find(|n| n.id() == id)
    }
}
