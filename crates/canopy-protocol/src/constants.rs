//! Protocol-wide constants.

/// Energy charged to the sender per unit of link distance for one data hop.
pub const MESSAGE_COST_MULTIPLIER: f32 = 1.2;
