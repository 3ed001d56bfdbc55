//! Canopy Protocol - Core types and message definitions
//!
//! Value-level vocabulary shared by the simulation core and the driver:
//! node identity and placement, weighted edges, the message envelope with
//! its optional payloads, and the structured run events the simulator
//! records for the run log.

pub mod constants;
pub mod edge;
pub mod error;
pub mod event;
pub mod message;
pub mod types;

pub use constants::*;
pub use edge::*;
pub use error::*;
pub use event::*;
pub use message::*;
pub use types::*;
