//! WebSocket transport, origin policy, and session counters.

pub mod origin;
pub mod stats;
pub mod transport;
