//! LAN game session
//!
//! One hosted or joined multiplayer game instance: the connection state
//! machine, the inbound message dispatcher, and the whole API surface the
//! game UI drives. Strictly single-threaded: all network activity happens
//! inside [`update`](Session::update) and the synchronous command calls, and
//! nothing ever blocks.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::protocol::{now_ms, GameInfo, Message, MessageCodec, MessageType};

use super::discovery::{DiscoveredGame, GameList, DISCOVERY_INTERVAL};
use super::error::NetworkError;
use super::players::{Player, PlayerRegistry, MAX_PLAYERS};
use super::stats::NetworkStats;
use super::transport::{SocketKind, UdpTransport};

/// Default session port for hosting
pub const DEFAULT_PORT: u16 = 7777;

/// Fixed LAN discovery port
pub const DISCOVERY_PORT: u16 = 7778;

/// How long a hosted player may stay silent before being dropped
pub const PLAYER_TIMEOUT: Duration = Duration::from_millis(5000);

/// Connection state
///
/// ```text
/// [*] --> Disconnected
/// Disconnected --> Hosting: host_game()
/// Disconnected --> Connecting: join_game()
/// Connecting --> Connected: join response received
/// Hosting --> Disconnected: disconnect()
/// Connected --> Disconnected: disconnect()
/// any --> Error: set_error()
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not part of any session
    #[default]
    Disconnected,
    /// Advertising and accepting joins
    Hosting,
    /// Join request sent, waiting for the host's answer
    Connecting,
    /// Joined a remote session
    Connected,
    /// Unrecoverable failure flagged by the caller; observability only
    Error,
}

impl SessionState {
    /// Whether this session is an active participant with peers to notify
    pub fn is_active(self) -> bool {
        matches!(self, Self::Hosting | Self::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected",
            Self::Hosting => "Hosting",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Callback for a player joining the hosted session
pub type PlayerJoinedCallback = Box<dyn FnMut(u32, &str)>;

/// Callback for a player leaving the hosted session
pub type PlayerLeftCallback = Box<dyn FnMut(u32)>;

/// Callback for inbound opaque game data (sender id, payload)
pub type GameDataCallback = Box<dyn FnMut(u32, &[u8])>;

/// Callback for inbound chat (sender id, text)
pub type ChatCallback = Box<dyn FnMut(u32, &str)>;

/// Callback for error conditions the UI should display
pub type ErrorCallback = Box<dyn FnMut(&str)>;

/// Observers notified synchronously during [`Session::update`].
///
/// No `Send`/`Sync` bounds: the session runs in exactly one execution
/// context.
#[derive(Default)]
pub struct SessionCallbacks {
    pub on_player_joined: Option<PlayerJoinedCallback>,
    pub on_player_left: Option<PlayerLeftCallback>,
    pub on_game_data: Option<GameDataCallback>,
    pub on_chat: Option<ChatCallback>,
    pub on_error: Option<ErrorCallback>,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name used until `host_game` supplies one
    pub game_name: String,
    /// Display name advertised in discovery responses
    pub host_name: String,
    /// Discovery port; the wire contract fixes this at [`DISCOVERY_PORT`]
    pub discovery_port: u16,
    /// Where discovery requests are broadcast
    pub broadcast_addr: Ipv4Addr,
    /// Liveness limit for hosted players
    pub player_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_name: "LAN Game".to_string(),
            host_name: "Host".to_string(),
            discovery_port: DISCOVERY_PORT,
            broadcast_addr: Ipv4Addr::BROADCAST,
            player_timeout: PLAYER_TIMEOUT,
        }
    }
}

/// A LAN multiplayer session.
///
/// Owned by the caller and driven by a periodic [`update`](Session::update);
/// there is no global state, so several sessions can coexist in one process.
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    session_socket: Option<UdpTransport>,
    discovery_socket: Option<UdpTransport>,
    local_port: u16,
    local_player_id: u32,
    game_id: u32,
    game_name: String,
    /// Upstream route for a joined client
    server_addr: Option<SocketAddr>,
    registry: PlayerRegistry,
    games: GameList,
    last_discovery: Instant,
    codec: MessageCodec,
    stats: NetworkStats,
    callbacks: SessionCallbacks,
}

impl Session {
    /// Create an idle session. No sockets are opened until `host_game`,
    /// `join_game`, or `start_discovery`.
    pub fn new(config: SessionConfig) -> Self {
        let stamp = now_ms();
        Self {
            game_name: config.game_name.clone(),
            config,
            state: SessionState::Disconnected,
            session_socket: None,
            discovery_socket: None,
            local_port: DEFAULT_PORT,
            local_player_id: stamp & 0xFFFF_FF00,
            game_id: stamp,
            server_addr: None,
            registry: PlayerRegistry::new(),
            games: GameList::new(),
            last_discovery: Instant::now(),
            codec: MessageCodec::new(),
            stats: NetworkStats::default(),
            callbacks: SessionCallbacks::default(),
        }
    }

    /// Register the event observers.
    pub fn set_callbacks(&mut self, callbacks: SessionCallbacks) {
        self.callbacks = callbacks;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_host(&self) -> bool {
        self.state == SessionState::Hosting
    }

    /// Flag an unrecoverable failure. Observability only: the session stays
    /// in `Error` until the caller disconnects and retries.
    pub fn set_error(&mut self) {
        warn!("Session forced into error state");
        self.state = SessionState::Error;
    }

    /// Start hosting: bind the session socket on `port` (0 for auto-assign)
    /// and the discovery socket on the discovery port.
    ///
    /// Only legal while `Disconnected`. Any bind failure releases whatever
    /// was opened during the attempt and leaves the state untouched.
    pub fn host_game(&mut self, name: &str, port: u16) -> Result<(), NetworkError> {
        if self.state != SessionState::Disconnected {
            return Err(NetworkError::AlreadyConnected);
        }

        let session = UdpTransport::bind(SocketKind::Session, port)?;
        let discovery = UdpTransport::bind(SocketKind::Discovery, self.config.discovery_port)?;

        self.local_port = session.local_addr().port();
        self.session_socket = Some(session);
        self.discovery_socket = Some(discovery);
        if !name.is_empty() {
            self.game_name = name.to_string();
        }
        self.registry.clear();
        self.state = SessionState::Hosting;

        info!("Hosting '{}' on port {}", self.game_name, self.local_port);
        Ok(())
    }

    /// Join a remote session: resolve `host`, send one join request, and
    /// wait for the host's answer (which arrives via `update`).
    ///
    /// Only legal while `Disconnected`.
    pub fn join_game(
        &mut self,
        host: &str,
        port: u16,
        player_name: &str,
    ) -> Result<(), NetworkError> {
        if self.state != SessionState::Disconnected {
            return Err(NetworkError::AlreadyConnected);
        }

        let socket = UdpTransport::bind(SocketKind::Session, 0)?;

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| NetworkError::HostResolution(host.to_string()))?
            .find(|a| a.is_ipv4())
            .ok_or_else(|| NetworkError::HostResolution(host.to_string()))?;

        send_message(
            &socket,
            &mut self.codec,
            &mut self.stats,
            addr,
            MessageType::JoinRequest,
            player_name.as_bytes(),
        )?;

        self.local_port = socket.local_addr().port();
        self.session_socket = Some(socket);
        self.server_addr = Some(addr);
        self.state = SessionState::Connecting;

        info!("Joining {} as '{}'", addr, player_name);
        Ok(())
    }

    /// Leave the session: notify all known peers, release both sockets, and
    /// return to `Disconnected`. A no-op when already disconnected.
    pub fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }

        if self.state.is_active() {
            if let Err(e) = self.send_to_all(MessageType::PlayerDisconnect, &[]) {
                warn!("Failed to send disconnect notice: {}", e);
            }
        }

        self.session_socket = None;
        self.discovery_socket = None;
        self.server_addr = None;
        self.registry.clear();
        self.state = SessionState::Disconnected;
        info!("Disconnected");
    }

    /// Drive the session: drain one datagram from each open socket, sweep
    /// stale players, and re-broadcast discovery when browsing.
    ///
    /// Call once per frame/tick — at most one datagram is drained per socket
    /// per call, so the caller's cadence bounds network responsiveness.
    pub fn update(&mut self) {
        self.poll_socket(SocketKind::Session);
        self.poll_socket(SocketKind::Discovery);

        if self.state == SessionState::Hosting {
            for player in self.registry.sweep(self.config.player_timeout) {
                debug!("Dropping silent player {} ({})", player.name, player.id);
                if let Some(cb) = self.callbacks.on_player_left.as_mut() {
                    cb(player.id);
                }
            }
        }

        if self.discovery_socket.is_some()
            && self.state != SessionState::Hosting
            && self.last_discovery.elapsed() > DISCOVERY_INTERVAL
        {
            if let Err(e) = self.broadcast_discovery() {
                warn!("Discovery re-broadcast failed: {}", e);
            }
        }
    }

    /// Open the discovery socket (if not already open), clear past results,
    /// and issue one discovery broadcast.
    pub fn start_discovery(&mut self) -> Result<(), NetworkError> {
        if self.discovery_socket.is_none() {
            self.discovery_socket = Some(UdpTransport::bind(SocketKind::Discovery, 0)?);
        }
        self.games.clear();
        self.broadcast_discovery()
    }

    /// Close the discovery socket. A hosting session keeps its socket, since
    /// it must keep answering discovery requests.
    pub fn stop_discovery(&mut self) {
        if self.state != SessionState::Hosting {
            self.discovery_socket = None;
        }
    }

    /// Send one discovery request to the subnet broadcast address.
    pub fn broadcast_discovery(&mut self) -> Result<(), NetworkError> {
        let socket = self
            .discovery_socket
            .as_ref()
            .ok_or(NetworkError::DiscoveryClosed)?;
        let dest = SocketAddr::from((self.config.broadcast_addr, self.config.discovery_port));

        send_message(
            socket,
            &mut self.codec,
            &mut self.stats,
            dest,
            MessageType::DiscoveryRequest,
            &[],
        )?;
        self.last_discovery = Instant::now();
        Ok(())
    }

    /// Up to `max` games seen on the LAN so far.
    pub fn discovered_games(&self, max: usize) -> Vec<DiscoveredGame> {
        self.games.games(max)
    }

    /// Send to one player by id (host side).
    pub fn send_to_player(
        &mut self,
        player_id: u32,
        msg_type: MessageType,
        payload: &[u8],
    ) -> Result<usize, NetworkError> {
        if self.session_socket.is_none() {
            return Err(NetworkError::NotConnected);
        }
        let addr = self
            .registry
            .get(player_id)
            .ok_or(NetworkError::PlayerNotFound(player_id))?
            .addr;
        self.send_on_session(addr, msg_type, payload)
    }

    /// Send to every known peer. A host fans out to all connected players; a
    /// joined client sends upstream to its host. Returns how many sends
    /// succeeded.
    pub fn send_to_all(
        &mut self,
        msg_type: MessageType,
        payload: &[u8],
    ) -> Result<usize, NetworkError> {
        if self.session_socket.is_none() {
            return Err(NetworkError::NotConnected);
        }

        if let Some(server) = self.server_addr {
            self.send_on_session(server, msg_type, payload)?;
            return Ok(1);
        }

        let addrs: Vec<SocketAddr> = self
            .registry
            .players()
            .iter()
            .filter(|p| p.connected)
            .map(|p| p.addr)
            .collect();

        let mut sent = 0;
        for addr in addrs {
            match self.send_on_session(addr, msg_type, payload) {
                Ok(_) => sent += 1,
                Err(e) => warn!("Failed to send to {}: {}", addr, e),
            }
        }
        Ok(sent)
    }

    /// Send a chat line to every known peer.
    pub fn send_chat(&mut self, text: &str) -> Result<usize, NetworkError> {
        self.send_to_all(MessageType::Chat, text.as_bytes())
    }

    /// Send an opaque full-state payload to every known peer.
    pub fn send_game_state(&mut self, data: &[u8]) -> Result<usize, NetworkError> {
        self.send_to_all(MessageType::GameStateSync, data)
    }

    /// Send an opaque per-turn payload to every known peer.
    pub fn send_turn_data(&mut self, data: &[u8]) -> Result<usize, NetworkError> {
        self.send_to_all(MessageType::TurnData, data)
    }

    pub fn player_count(&self) -> usize {
        self.registry.len()
    }

    pub fn player(&self, player_id: u32) -> Option<&Player> {
        self.registry.get(player_id)
    }

    pub fn players(&self) -> &[Player] {
        self.registry.players()
    }

    pub fn local_player_id(&self) -> u32 {
        self.local_player_id
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn game_id(&self) -> u32 {
        self.game_id
    }

    pub fn game_name(&self) -> &str {
        &self.game_name
    }

    /// Snapshot of the monotonic traffic counters.
    pub fn statistics(&self) -> NetworkStats {
        self.stats
    }

    fn send_on_session(
        &mut self,
        addr: SocketAddr,
        msg_type: MessageType,
        payload: &[u8],
    ) -> Result<usize, NetworkError> {
        let socket = self
            .session_socket
            .as_ref()
            .ok_or(NetworkError::NotConnected)?;
        send_message(socket, &mut self.codec, &mut self.stats, addr, msg_type, payload)
    }

    fn send_on_discovery(
        &mut self,
        addr: SocketAddr,
        msg_type: MessageType,
        payload: &[u8],
    ) -> Result<usize, NetworkError> {
        let socket = self
            .discovery_socket
            .as_ref()
            .ok_or(NetworkError::DiscoveryClosed)?;
        send_message(socket, &mut self.codec, &mut self.stats, addr, msg_type, payload)
    }

    /// One receive attempt on one socket: receive, decode, dispatch.
    fn poll_socket(&mut self, kind: SocketKind) {
        let outcome = {
            let socket = match kind {
                SocketKind::Session => self.session_socket.as_ref(),
                SocketKind::Discovery => self.discovery_socket.as_ref(),
            };
            match socket {
                Some(socket) => socket.recv_from(),
                None => return,
            }
        };

        match outcome {
            Ok(Some((data, from))) => match Message::decode(&data) {
                Ok(msg) => {
                    self.stats.record_receive(data.len());
                    self.handle_message(from, msg);
                }
                Err(e) => {
                    self.stats.record_error();
                    debug!("Discarding bad datagram from {}: {}", from, e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                self.stats.record_error();
                warn!("Receive error on {:?} socket: {}", kind, e);
                let text = e.to_string();
                if let Some(cb) = self.callbacks.on_error.as_mut() {
                    cb(&text);
                }
            }
        }
    }

    /// Route a validated message to its handler or external observer.
    fn handle_message(&mut self, from: SocketAddr, msg: Message) {
        self.registry.touch(from);

        match msg.msg_type {
            MessageType::DiscoveryRequest => {
                if self.state == SessionState::Hosting {
                    let info = GameInfo {
                        name: self.game_name.clone(),
                        host_name: self.config.host_name.clone(),
                        host_ip: local_ipv4(),
                        host_port: self.local_port,
                        current_players: self.registry.len() as u8,
                        max_players: MAX_PLAYERS as u8,
                        game_id: self.game_id,
                    };
                    if let Err(e) =
                        self.send_on_discovery(from, MessageType::DiscoveryResponse, &info.to_bytes())
                    {
                        warn!("Failed to answer discovery request from {}: {}", from, e);
                    }
                }
            }

            MessageType::DiscoveryResponse => match GameInfo::from_bytes(&msg.payload) {
                Ok(info) => {
                    debug!("Discovered '{}' at {}:{}", info.name, info.host_ip, info.host_port);
                    self.games.upsert(info);
                }
                Err(e) => {
                    self.stats.record_error();
                    debug!("Malformed discovery response from {}: {}", from, e);
                }
            },

            MessageType::JoinRequest => self.handle_join_request(from, &msg.payload),

            MessageType::JoinResponse => {
                if self.state == SessionState::Connecting && msg.payload.len() == 4 {
                    self.local_player_id = u32::from_be_bytes([
                        msg.payload[0],
                        msg.payload[1],
                        msg.payload[2],
                        msg.payload[3],
                    ]);
                    self.state = SessionState::Connected;
                    info!("Connected with player id {}", self.local_player_id);
                }
            }

            MessageType::GameData => {
                let sender = self.sender_id(from);
                if let Some(cb) = self.callbacks.on_game_data.as_mut() {
                    cb(sender, &msg.payload);
                }
            }

            MessageType::Chat => {
                if !msg.payload.is_empty() {
                    let sender = self.sender_id(from);
                    let text = String::from_utf8_lossy(&msg.payload);
                    let text = text.trim_end_matches('\0');
                    if let Some(cb) = self.callbacks.on_chat.as_mut() {
                        cb(sender, text);
                    }
                }
            }

            MessageType::PlayerDisconnect => {
                if let Some(player) = self.registry.remove_by_addr(from) {
                    if let Some(cb) = self.callbacks.on_player_left.as_mut() {
                        cb(player.id);
                    }
                }
            }

            other => debug!("Ignoring {:?} from {}", other, from),
        }
    }

    fn handle_join_request(&mut self, from: SocketAddr, payload: &[u8]) {
        if self.state != SessionState::Hosting {
            return;
        }

        // A retransmitted request from a registered address gets the same
        // answer instead of a second identity.
        if let Some(existing) = self.registry.get_by_addr(from) {
            let id = existing.id;
            if let Err(e) = self.send_on_session(from, MessageType::JoinResponse, &id.to_be_bytes())
            {
                warn!("Failed to re-send join response to {}: {}", from, e);
            }
            return;
        }

        let name = String::from_utf8_lossy(payload);
        let name = name.trim_end_matches('\0');

        let (id, accepted_name) = match self.registry.add(from, name) {
            Ok(player) => (player.id, player.name.clone()),
            Err(_) => {
                debug!("Rejecting join from {}: session full", from);
                return;
            }
        };

        if let Err(e) = self.send_on_session(from, MessageType::JoinResponse, &id.to_be_bytes()) {
            warn!("Failed to send join response to {}: {}", from, e);
        }
        if let Some(cb) = self.callbacks.on_player_joined.as_mut() {
            cb(id, &accepted_name);
        }
    }

    /// Attribute an inbound message to a registered player; 0 when unknown
    /// (clients have no registry, so data from the host carries sender 0).
    fn sender_id(&self, from: SocketAddr) -> u32 {
        self.registry.get_by_addr(from).map(|p| p.id).unwrap_or(0)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Encode and send one message, keeping the traffic counters honest: a
/// successful send bumps the sent counters, a transport failure bumps the
/// error counter, and an encode failure sends nothing.
fn send_message(
    socket: &UdpTransport,
    codec: &mut MessageCodec,
    stats: &mut NetworkStats,
    addr: SocketAddr,
    msg_type: MessageType,
    payload: &[u8],
) -> Result<usize, NetworkError> {
    let datagram = codec.encode(msg_type, payload)?;
    match socket.send_to(&datagram, addr) {
        Ok(sent) => {
            stats.record_send(sent);
            Ok(sent)
        }
        Err(e) => {
            stats.record_error();
            Err(e)
        }
    }
}

fn local_ipv4() -> Ipv4Addr {
    match local_ip_address::local_ip() {
        Ok(IpAddr::V4(ip)) => ip,
        _ => Ipv4Addr::LOCALHOST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Config that stays off the fixed discovery port so tests don't collide
    fn test_config() -> SessionConfig {
        SessionConfig {
            discovery_port: 0,
            broadcast_addr: Ipv4Addr::LOCALHOST,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = Session::new(test_config());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_host());
        assert_eq!(session.player_count(), 0);
        assert_eq!(session.statistics(), NetworkStats::default());
    }

    #[test]
    fn test_host_game_transitions_to_hosting() {
        let mut session = Session::new(test_config());
        session.host_game("Test", 0).unwrap();

        assert_eq!(session.state(), SessionState::Hosting);
        assert!(session.is_host());
        assert!(session.local_port() > 0);
        assert_eq!(session.game_name(), "Test");
    }

    #[test]
    fn test_join_while_hosting_is_rejected() {
        let mut session = Session::new(test_config());
        session.host_game("Test", 0).unwrap();

        let result = session.join_game("127.0.0.1", 9, "Bob");
        assert!(matches!(result, Err(NetworkError::AlreadyConnected)));
        assert_eq!(session.state(), SessionState::Hosting);
    }

    #[test]
    fn test_host_while_hosting_is_rejected() {
        let mut session = Session::new(test_config());
        session.host_game("Test", 0).unwrap();

        let result = session.host_game("Other", 0);
        assert!(matches!(result, Err(NetworkError::AlreadyConnected)));
        assert_eq!(session.state(), SessionState::Hosting);
        assert_eq!(session.game_name(), "Test");
    }

    #[test]
    fn test_disconnect_returns_to_disconnected_and_allows_rehost() {
        let mut session = Session::new(test_config());
        session.host_game("Test", 0).unwrap();
        let port = session.local_port();

        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.player_count(), 0);

        // SO_REUSEADDR lets the same port come straight back
        session.host_game("Test", port).unwrap();
        assert_eq!(session.state(), SessionState::Hosting);
    }

    #[test]
    fn test_disconnect_when_disconnected_is_a_noop() {
        let mut session = Session::new(test_config());
        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_send_without_socket_fails() {
        let mut session = Session::new(test_config());
        assert!(matches!(
            session.send_chat("hi"),
            Err(NetworkError::NotConnected)
        ));
        assert!(matches!(
            session.send_to_player(1, MessageType::GameData, &[]),
            Err(NetworkError::NotConnected)
        ));
    }

    #[test]
    fn test_broadcast_without_discovery_socket_fails() {
        let mut session = Session::new(test_config());
        assert!(matches!(
            session.broadcast_discovery(),
            Err(NetworkError::DiscoveryClosed)
        ));
    }

    #[test]
    fn test_set_error_forces_error_state() {
        let mut session = Session::new(test_config());
        session.host_game("Test", 0).unwrap();
        session.set_error();
        assert_eq!(session.state(), SessionState::Error);

        // Recoverable by disconnecting and retrying
        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(SessionState::Hosting.to_string(), "Hosting");
        assert_eq!(SessionState::Connecting.to_string(), "Connecting");
        assert_eq!(SessionState::Connected.to_string(), "Connected");
        assert_eq!(SessionState::Error.to_string(), "Error");
    }

    #[test]
    fn test_update_while_disconnected_is_safe() {
        let mut session = Session::new(test_config());
        session.update();
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
