//! lanlink - LAN session discovery and messaging for real-time multiplayer games
//!
//! This library lets one process host a game session on the local network,
//! lets others discover and join it over UDP broadcast, and carries opaque
//! game-state and chat datagrams between the participants.

pub mod network;
pub mod protocol;

pub use network::{NetworkStats, Session, SessionCallbacks, SessionConfig, SessionState};
pub use protocol::{Message, MessageType};
