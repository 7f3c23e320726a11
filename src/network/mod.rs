//! Network module for LAN multiplayer
//!
//! Handles the non-blocking UDP transport, the session state machine, the
//! host-side player registry, and LAN game discovery.

mod discovery;
mod error;
mod players;
mod session;
mod stats;
mod transport;

pub use discovery::{DiscoveredGame, GameList, DISCOVERY_INTERVAL, MAX_DISCOVERED_GAMES};
pub use error::NetworkError;
pub use players::{Player, PlayerRegistry, MAX_PLAYERS, MAX_PLAYER_NAME};
pub use session::{
    ChatCallback, ErrorCallback, GameDataCallback, PlayerJoinedCallback, PlayerLeftCallback,
    Session, SessionCallbacks, SessionConfig, SessionState, DEFAULT_PORT, DISCOVERY_PORT,
    PLAYER_TIMEOUT,
};
pub use stats::NetworkStats;
pub use transport::{SocketKind, UdpTransport, RECV_BUFFER_SIZE};
