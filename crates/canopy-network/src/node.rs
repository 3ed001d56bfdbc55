//! A single radio node and its protocol state machine.

use std::collections::{HashMap, VecDeque};

use canopy_protocol::{
    Edge, Message, MessageKind, NodeId, Position, ProtocolError, SimEvent,
    MESSAGE_COST_MULTIPLIER,
};

use crate::event_log::EventLog;
use crate::outbox::Outbox;

/// By-value facts about one roster node, as of the moment a view was taken.
#[derive(Debug, Clone, Copy)]
pub struct PeerInfo {
    pub id: NodeId,
    pub position: Position,
    pub alive: bool,
    pub leader: NodeId,
}

/// Snapshot of the roster a node consults while it runs.
///
/// Nodes hold no references to each other. Liveness, placement, and
/// fragment membership of a peer are read from the view the scheduler
/// captured immediately before the current operation.
#[derive(Debug, Clone, Default)]
pub struct PeerView {
    peers: HashMap<NodeId, PeerInfo>,
}

impl PeerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: PeerInfo) {
        self.peers.insert(info.id, info);
    }

    pub fn peer(&self, id: NodeId) -> Option<&PeerInfo> {
        self.peers.get(&id)
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.peers.get(&id).is_some_and(|p| p.alive)
    }
}

/// Protocol state machine for one node.
///
/// Every node starts out alive and leading its own single-node fragment.
/// Fragments merge over minimum-weight outgoing edges, the surviving
/// leader id floods through each merged fragment, and committed links
/// accumulate in `tree_links`. Dissemination then pushes data along
/// those links, paying energy per hop; a node whose energy falls below
/// the run's minimum dies for good.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    position: Position,
    range: f32,
    energy: f32,
    alive: bool,
    is_leader: bool,
    leader_id: NodeId,
    /// Discovered neighbors in reply-arrival order. Order is load-bearing:
    /// probe fan-out and candidate tie-breaks follow it.
    neighbors: Vec<NodeId>,
    /// Tree-adjacent nodes in commit order.
    tree_links: Vec<NodeId>,
    inbox: VecDeque<Message>,
    /// Outgoing candidates gathered while this node leads a fragment.
    candidate_edges: Vec<Edge>,
    best_edge: Option<Edge>,
    /// Lightest accepted-probe weight seen so far. Survives across rounds;
    /// only a strictly lighter accept can arm another report.
    best_weight: f32,
    awaiting_replies: i32,
}

impl Node {
    pub fn new(id: NodeId, position: Position, energy: f32, range: f32) -> Self {
        Self {
            id,
            position,
            range,
            energy,
            alive: true,
            is_leader: true,
            leader_id: id,
            neighbors: Vec::new(),
            tree_links: Vec::new(),
            inbox: VecDeque::new(),
            candidate_edges: Vec::new(),
            best_edge: None,
            best_weight: f32::MAX,
            awaiting_replies: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    pub fn leader_id(&self) -> NodeId {
        self.leader_id
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    pub fn tree_links(&self) -> &[NodeId] {
        &self.tree_links
    }

    pub fn candidate_edges(&self) -> &[Edge] {
        &self.candidate_edges
    }

    /// The by-value snapshot other nodes may consult about this one.
    pub fn peer_info(&self) -> PeerInfo {
        PeerInfo {
            id: self.id,
            position: self.position,
            alive: self.alive,
            leader: self.leader_id,
        }
    }

    pub(crate) fn deliver(&mut self, message: Message) {
        self.inbox.push_back(message);
    }

    /// Queue a range probe to another node.
    pub fn initiate_discover(&self, other: NodeId, outbox: &mut Outbox) {
        outbox.push(Message::new(MessageKind::Discover, self.id, other));
    }

    /// Leader only. Seeds the candidate list with this node's own
    /// outgoing edge and asks the rest of the fragment to probe for
    /// theirs.
    pub fn initiate_edge_find(&mut self, view: &PeerView, outbox: &mut Outbox) {
        self.candidate_edges.clear();
        if let Some(edge) = self.find_candidate_edge(view) {
            self.candidate_edges.push(edge);
        }
        for &link in &self.tree_links {
            outbox.push(Message::new(MessageKind::FindMwoe, self.id, link));
        }
    }

    /// Leader only. Commits the fragment's lightest gathered edge:
    /// connect directly when this node owns it, otherwise flood the pick
    /// so the owning node connects.
    pub fn initiate_merge(&self, outbox: &mut Outbox) {
        let Some(&first) = self.candidate_edges.first() else {
            return;
        };
        let mut minimum = first;
        for &candidate in &self.candidate_edges {
            minimum = Edge::smaller_of(candidate, minimum);
        }
        if self.id == minimum.left {
            outbox.push(
                Message::new(MessageKind::Connect, self.id, minimum.right).with_edge(minimum),
            );
        } else {
            for &link in &self.tree_links {
                outbox.push(
                    Message::new(MessageKind::SelectedMwoe, self.id, link).with_edge(minimum),
                );
            }
        }
    }

    /// Leader only. Floods this node's id through its tree.
    pub fn initiate_leader_change(&self, outbox: &mut Outbox) {
        for &link in &self.tree_links {
            outbox.push(
                Message::new(MessageKind::LeaderChange, self.id, link).with_leader(self.id),
            );
        }
    }

    /// Push a data payload over every tree link except the one it came
    /// in on, paying the per-hop energy cost. A sender that drops below
    /// the minimum notifies its whole tree, dies, and stops mid-fan-out.
    pub fn data_broadcast(
        &mut self,
        origin: Option<NodeId>,
        view: &PeerView,
        outbox: &mut Outbox,
        events: &mut EventLog,
        min_energy: f32,
    ) {
        for &link in &self.tree_links {
            if origin == Some(link) {
                continue;
            }
            let Some(peer) = view.peer(link) else {
                continue;
            };
            outbox.push(Message::new(MessageKind::Data, self.id, link));
            self.energy -= self.position.distance(&peer.position) * MESSAGE_COST_MULTIPLIER;
            events.record(SimEvent::DataHop {
                from: self.id,
                to: link,
                energy: self.energy,
            });
            if self.energy < min_energy {
                // Death notices go to every tree link, the data origin
                // included.
                for &remaining in &self.tree_links {
                    outbox.push(Message::new(MessageKind::NodeDown, self.id, remaining));
                }
                self.alive = false;
                self.is_leader = false;
                tracing::warn!(node = %self.id, energy = self.energy, "Node death");
                events.record(SimEvent::NodeDown(self.id));
                break;
            }
        }
    }

    /// Drain and handle every queued message.
    ///
    /// Remote facts come from the view captured for this sweep; every
    /// reply goes through the outbox for delivery at the sweep boundary,
    /// so a node never sees same-sweep answers to its own sends.
    pub fn step(
        &mut self,
        view: &PeerView,
        outbox: &mut Outbox,
        events: &mut EventLog,
        min_energy: f32,
    ) -> Result<(), ProtocolError> {
        while let Some(message) = self.inbox.pop_front() {
            self.handle(message, view, outbox, events, min_energy)?;
        }
        Ok(())
    }

    fn handle(
        &mut self,
        message: Message,
        view: &PeerView,
        outbox: &mut Outbox,
        events: &mut EventLog,
        min_energy: f32,
    ) -> Result<(), ProtocolError> {
        match message.kind {
            MessageKind::Discover => {
                outbox.push(Message::new(MessageKind::DiscoverReply, self.id, message.sender));
            }
            MessageKind::DiscoverReply => {
                self.neighbors.push(message.sender);
                tracing::debug!(node = %self.id, peer = %message.sender, "Link discovered");
            }
            MessageKind::FindMwoe => {
                for &neighbor in &self.neighbors {
                    if view.is_alive(neighbor) {
                        self.awaiting_replies += 1;
                        outbox.push(
                            Message::new(MessageKind::TestEdge, self.id, neighbor)
                                .with_leader(self.leader_id),
                        );
                    }
                }
                self.forward(&message, outbox);
            }
            MessageKind::ReportMwoe => {
                let edge = message.require_edge()?;
                if self.is_leader {
                    self.candidate_edges.push(edge);
                } else {
                    self.forward(&message, outbox);
                }
            }
            MessageKind::SelectedMwoe => {
                let edge = message.require_edge()?;
                if edge.left == self.id {
                    outbox.push(
                        Message::new(MessageKind::Connect, self.id, edge.right).with_edge(edge),
                    );
                } else {
                    self.forward(&message, outbox);
                }
            }
            MessageKind::Connect => {
                let edge = message.require_edge()?;
                tracing::debug!(node = %self.id, link = %edge, "Connect request");
                outbox.push(
                    Message::new(MessageKind::ConnectAccept, self.id, message.sender)
                        .with_edge(edge),
                );
                if !self.tree_links.contains(&message.sender) {
                    self.tree_links.push(message.sender);
                }
                events.record_edge(edge);
            }
            MessageKind::ConnectAccept => {
                tracing::debug!(node = %self.id, peer = %message.sender, "Connect accepted");
                if !self.tree_links.contains(&message.sender) {
                    self.tree_links.push(message.sender);
                }
            }
            MessageKind::LeaderChange => {
                let leader = message.require_leader()?;
                if self.leader_id < leader {
                    self.leader_id = leader;
                    self.is_leader = false;
                    // Not the leader anymore, so no candidates to keep.
                    self.candidate_edges.clear();
                }
                self.forward(&message, outbox);
            }
            MessageKind::TestEdge => {
                let leader = message.require_leader()?;
                let verdict = if self.leader_id != leader {
                    MessageKind::AcceptEdge
                } else {
                    MessageKind::RejectEdge
                };
                outbox.push(Message::new(verdict, self.id, message.sender));
            }
            MessageKind::AcceptEdge => {
                self.awaiting_replies -= 1;
                if let Some(peer) = view.peer(message.sender) {
                    let weight = self.position.distance(&peer.position);
                    if weight < self.best_weight {
                        self.best_weight = weight;
                        self.best_edge = Some(Edge::new(self.id, message.sender, weight));
                    }
                }
                self.report_if_done(message.sender, outbox);
            }
            MessageKind::RejectEdge => {
                self.awaiting_replies -= 1;
                self.report_if_done(message.sender, outbox);
            }
            MessageKind::Data => {
                self.data_broadcast(Some(message.sender), view, outbox, events, min_energy);
            }
            MessageKind::NodeDown => {
                self.tree_links.retain(|&link| link != message.sender);
                // Whoever outlives a tree neighbor claims leadership and
                // tells the rest of its tree.
                self.is_leader = true;
                self.leader_id = self.id;
                for &link in &self.tree_links {
                    outbox.push(
                        Message::new(MessageKind::EmergencyLeader, self.id, link)
                            .with_leader(self.id),
                    );
                }
            }
            MessageKind::EmergencyLeader => {
                let leader = message.require_leader()?;
                self.is_leader = false;
                self.leader_id = leader;
                self.forward(&message, outbox);
            }
        }
        Ok(())
    }

    /// Relay a flood to every tree link except the node it came from,
    /// preserving both payload slots.
    fn forward(&self, message: &Message, outbox: &mut Outbox) {
        for &link in &self.tree_links {
            if link != message.sender {
                let mut copy = Message::new(message.kind, self.id, link);
                copy.edge = message.edge;
                copy.leader = message.leader;
                outbox.push(copy);
            }
        }
    }

    /// On the last outstanding probe reply, send this round's pick to
    /// whichever node sent that reply. The weight floor stays put; only
    /// a strictly lighter accept arms another report.
    fn report_if_done(&mut self, reply_sender: NodeId, outbox: &mut Outbox) {
        if self.awaiting_replies != 0 {
            return;
        }
        if let Some(edge) = self.best_edge.take() {
            outbox.push(
                Message::new(MessageKind::ReportMwoe, self.id, reply_sender).with_edge(edge),
            );
        }
    }

    /// The lightest link from this node that leaves its fragment, if any.
    fn find_candidate_edge(&self, view: &PeerView) -> Option<Edge> {
        let mut best: Option<Edge> = None;
        for &neighbor in &self.neighbors {
            let Some(peer) = view.peer(neighbor) else {
                continue;
            };
            if !peer.alive || peer.leader == self.leader_id {
                continue;
            }
            let dist = self.position.distance(&peer.position);
            if best.map_or(true, |b| dist < b.weight) {
                best = Some(Edge::new(self.id, neighbor, dist));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32, x: f32, y: f32) -> Node {
        Node::new(NodeId::new(id), Position::new(x, y), 10.0, 2.0)
    }

    fn view_of(nodes: &[&Node]) -> PeerView {
        let mut view = PeerView::new();
        for n in nodes {
            view.insert(n.peer_info());
        }
        view
    }

    fn connect_from(sender: u32, edge: Edge) -> Message {
        Message::new(MessageKind::Connect, NodeId::new(sender), edge.right).with_edge(edge)
    }

    #[test]
    fn test_discover_reply_records_neighbors_in_arrival_order() {
        let mut n = node(0, 0.0, 0.0);
        let view = PeerView::new();
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        n.deliver(Message::new(MessageKind::DiscoverReply, NodeId::new(2), NodeId::new(0)));
        n.deliver(Message::new(MessageKind::DiscoverReply, NodeId::new(1), NodeId::new(0)));
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();

        assert_eq!(n.neighbors(), &[NodeId::new(2), NodeId::new(1)]);
    }

    #[test]
    fn test_test_edge_verdict_follows_fragment_membership() {
        let mut n = node(5, 0.0, 0.0);
        let view = PeerView::new();
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        // Same fragment as the prober: reject.
        n.deliver(
            Message::new(MessageKind::TestEdge, NodeId::new(1), NodeId::new(5))
                .with_leader(NodeId::new(5)),
        );
        // Different fragment: accept.
        n.deliver(
            Message::new(MessageKind::TestEdge, NodeId::new(2), NodeId::new(5))
                .with_leader(NodeId::new(9)),
        );
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();

        let sent = outbox.drain();
        assert_eq!(sent[0].kind, MessageKind::RejectEdge);
        assert_eq!(sent[0].receiver, NodeId::new(1));
        assert_eq!(sent[1].kind, MessageKind::AcceptEdge);
        assert_eq!(sent[1].receiver, NodeId::new(2));
    }

    #[test]
    fn test_leader_adoption_requires_strictly_greater_id() {
        let mut n = node(4, 0.0, 0.0);
        let view = PeerView::new();
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        // Equal id: no adoption.
        n.deliver(
            Message::new(MessageKind::LeaderChange, NodeId::new(1), NodeId::new(4))
                .with_leader(NodeId::new(4)),
        );
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();
        assert_eq!(n.leader_id(), NodeId::new(4));
        assert!(n.is_leader());

        // Greater id: adopt and step down.
        n.deliver(
            Message::new(MessageKind::LeaderChange, NodeId::new(1), NodeId::new(4))
                .with_leader(NodeId::new(7)),
        );
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();
        assert_eq!(n.leader_id(), NodeId::new(7));
        assert!(!n.is_leader());
    }

    #[test]
    fn test_leader_change_is_forwarded_even_without_adoption() {
        let mut n = node(9, 0.0, 0.0);
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();
        let view = PeerView::new();

        // Wire up two tree links via connects.
        n.deliver(connect_from(1, Edge::new(NodeId::new(1), NodeId::new(9), 1.0)));
        n.deliver(connect_from(2, Edge::new(NodeId::new(2), NodeId::new(9), 1.0)));
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();
        outbox.drain();

        n.deliver(
            Message::new(MessageKind::LeaderChange, NodeId::new(1), NodeId::new(9))
                .with_leader(NodeId::new(3)),
        );
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();

        // 9 > 3, no adoption, but the flood still travels past.
        assert_eq!(n.leader_id(), NodeId::new(9));
        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, MessageKind::LeaderChange);
        assert_eq!(sent[0].receiver, NodeId::new(2));
        assert_eq!(sent[0].leader, Some(NodeId::new(3)));
    }

    #[test]
    fn test_emergency_leader_adoption_is_unconditional() {
        let mut n = node(8, 0.0, 0.0);
        let view = PeerView::new();
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        n.deliver(
            Message::new(MessageKind::EmergencyLeader, NodeId::new(2), NodeId::new(8))
                .with_leader(NodeId::new(2)),
        );
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();

        // 2 < 8, adopted anyway.
        assert_eq!(n.leader_id(), NodeId::new(2));
        assert!(!n.is_leader());
    }

    #[test]
    fn test_node_down_makes_survivor_an_emergency_leader() {
        let mut n = node(3, 0.0, 0.0);
        let view = PeerView::new();
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        n.deliver(connect_from(1, Edge::new(NodeId::new(1), NodeId::new(3), 1.0)));
        n.deliver(connect_from(2, Edge::new(NodeId::new(2), NodeId::new(3), 1.0)));
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();
        outbox.drain();

        n.deliver(Message::new(MessageKind::NodeDown, NodeId::new(1), NodeId::new(3)));
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();

        assert_eq!(n.tree_links(), &[NodeId::new(2)]);
        assert!(n.is_leader());
        assert_eq!(n.leader_id(), NodeId::new(3));
        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, MessageKind::EmergencyLeader);
        assert_eq!(sent[0].receiver, NodeId::new(2));
        assert_eq!(sent[0].leader, Some(NodeId::new(3)));
    }

    #[test]
    fn test_connect_commits_link_once() {
        let mut n = node(6, 0.0, 0.0);
        let view = PeerView::new();
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        let edge = Edge::new(NodeId::new(1), NodeId::new(6), 2.5);
        n.deliver(connect_from(1, edge));
        n.deliver(connect_from(1, edge));
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();

        assert_eq!(n.tree_links(), &[NodeId::new(1)]);
        assert_eq!(events.events(), &[SimEvent::EdgeAdded(edge)]);
        let sent = outbox.drain();
        assert!(sent.iter().all(|m| m.kind == MessageKind::ConnectAccept));
    }

    #[test]
    fn test_missing_payload_aborts_the_step() {
        let mut n = node(1, 0.0, 0.0);
        let view = PeerView::new();
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        n.deliver(Message::new(MessageKind::Connect, NodeId::new(2), NodeId::new(1)));
        let result = n.step(&view, &mut outbox, &mut events, 0.0);
        assert!(matches!(result, Err(ProtocolError::MissingEdge { .. })));
    }

    #[test]
    fn test_data_broadcast_charges_per_hop_and_skips_origin() {
        let mut n = node(0, 0.0, 0.0);
        let peer1 = node(1, 1.0, 0.0);
        let peer2 = node(2, 0.0, 1.0);
        let view = view_of(&[&peer1, &peer2]);
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        n.deliver(connect_from(1, Edge::new(NodeId::new(1), NodeId::new(0), 1.0)));
        n.deliver(connect_from(2, Edge::new(NodeId::new(2), NodeId::new(0), 1.0)));
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();
        outbox.drain();

        n.data_broadcast(Some(NodeId::new(1)), &view, &mut outbox, &mut events, 0.0);

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, MessageKind::Data);
        assert_eq!(sent[0].receiver, NodeId::new(2));
        assert_eq!(n.energy(), 10.0 - MESSAGE_COST_MULTIPLIER);
    }

    #[test]
    fn test_data_broadcast_death_notifies_every_tree_link() {
        let mut n = Node::new(NodeId::new(0), Position::new(0.0, 0.0), 1.0, 2.0);
        let peer1 = node(1, 1.0, 0.0);
        let peer2 = node(2, 0.0, 1.0);
        let view = view_of(&[&peer1, &peer2]);
        let mut outbox = Outbox::new();
        let mut events = EventLog::new();

        n.deliver(connect_from(1, Edge::new(NodeId::new(1), NodeId::new(0), 1.0)));
        n.deliver(connect_from(2, Edge::new(NodeId::new(2), NodeId::new(0), 1.0)));
        n.step(&view, &mut outbox, &mut events, 0.0).unwrap();
        outbox.drain();

        // First hop costs 1.2, dropping energy to -0.2, below the 0.5 floor.
        n.data_broadcast(None, &view, &mut outbox, &mut events, 0.5);

        assert!(!n.is_alive());
        assert!(!n.is_leader());
        let sent = outbox.drain();
        let kinds: Vec<MessageKind> = sent.iter().map(|m| m.kind).collect();
        // One data hop went out before death, then a notice to both links.
        assert_eq!(
            kinds,
            vec![MessageKind::Data, MessageKind::NodeDown, MessageKind::NodeDown]
        );
        assert_eq!(sent[1].receiver, NodeId::new(1));
        assert_eq!(sent[2].receiver, NodeId::new(2));
        assert_eq!(events.events().last(), Some(&SimEvent::NodeDown(NodeId::new(0))));
    }
}
