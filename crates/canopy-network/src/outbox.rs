//! The shared send queue nodes append to during a sweep.

use canopy_protocol::Message;

/// FIFO queue of in-flight messages.
///
/// Nodes never hand messages to each other directly: every send lands
/// here, and the scheduler delivers the backlog at the sweep boundary.
/// Delivery follows append order, so one sweep's traffic arrives in
/// (roster order x send order).
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Message>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for delivery at the end of the current sweep.
    pub fn push(&mut self, message: Message) {
        self.pending.push(message);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the whole backlog, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.pending)
    }
}
