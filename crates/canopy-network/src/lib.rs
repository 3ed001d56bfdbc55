//! Canopy Network - Deterministic simulation core
//!
//! Implements the node state machine and the round-driven scheduler:
//! - range-limited neighbor discovery over placed nodes
//! - fragment merging over minimum-weight outgoing edges until the
//!   surviving links form a spanning tree
//! - leader adoption by id, flooded through each merged fragment
//! - tree data dissemination with per-hop energy costs, node death, and
//!   silent tree repair around the dead
//!
//! The whole simulation is single-threaded. Nodes step in roster order,
//! every send goes through a shared [`Outbox`] delivered at sweep
//! boundaries, and a phase ends when a full sweep leaves the outbox
//! empty.

pub mod event_log;
pub mod network;
pub mod node;
pub mod outbox;

pub use event_log::*;
pub use network::*;
pub use node::*;
pub use outbox::*;
