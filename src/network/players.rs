//! Host-side player registry
//!
//! The authoritative table of connected remote players. Only a hosting
//! session mutates it; clients track nothing but their own assigned id.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::info;

use super::error::NetworkError;
use crate::protocol::{now_ms, truncate_utf8};

/// Maximum players per session
pub const MAX_PLAYERS: usize = 8;

/// Maximum player-name length in bytes
pub const MAX_PLAYER_NAME: usize = 31;

/// A connected remote player
#[derive(Debug, Clone)]
pub struct Player {
    /// Host-assigned identity
    pub id: u32,
    pub name: String,
    /// Remote address; the real key for inbound attribution
    pub addr: SocketAddr,
    /// Updated on every datagram from `addr`
    pub last_seen: Instant,
    pub connected: bool,
}

/// Bounded registry of connected players.
///
/// Capacity is a hard invariant: `add` rejects once [`MAX_PLAYERS`] is
/// reached and the table never grows past it. Removal preserves the relative
/// order of the remaining players.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
    next_serial: u32,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: Vec::with_capacity(MAX_PLAYERS),
            next_serial: 1,
        }
    }

    /// Allocate the next player identity.
    ///
    /// Coarse timestamp plus a rolling serial: unique enough within one
    /// session, with address lookup as the real key.
    fn next_id(&mut self) -> u32 {
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        (now_ms() & 0xFFFF_FF00) | (serial & 0xFF)
    }

    /// Register a joining player.
    ///
    /// Rejects with [`NetworkError::SessionFull`] at capacity. An empty name
    /// gets a generated placeholder; long names are truncated on a char
    /// boundary.
    pub fn add(&mut self, addr: SocketAddr, requested_name: &str) -> Result<&Player, NetworkError> {
        if self.players.len() >= MAX_PLAYERS {
            return Err(NetworkError::SessionFull);
        }

        let name = if requested_name.is_empty() {
            format!("Player{}", self.players.len() + 1)
        } else {
            String::from_utf8_lossy(truncate_utf8(requested_name, MAX_PLAYER_NAME)).into_owned()
        };

        let player = Player {
            id: self.next_id(),
            name,
            addr,
            last_seen: Instant::now(),
            connected: true,
        };
        info!("Player {} ({}) joined from {}", player.name, player.id, addr);

        self.players.push(player);
        Ok(self.players.last().unwrap())
    }

    /// Remove the player registered at `addr`, if any.
    pub fn remove_by_addr(&mut self, addr: SocketAddr) -> Option<Player> {
        let index = self.players.iter().position(|p| p.addr == addr)?;
        let player = self.players.remove(index);
        info!("Player {} ({}) left", player.name, player.id);
        Some(player)
    }

    pub fn get(&self, id: u32) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_by_addr(&self, addr: SocketAddr) -> Option<&Player> {
        self.players.iter().find(|p| p.addr == addr)
    }

    /// Refresh the last-seen stamp for whoever is registered at `addr`.
    pub fn touch(&mut self, addr: SocketAddr) {
        if let Some(player) = self.players.iter_mut().find(|p| p.addr == addr) {
            player.last_seen = Instant::now();
        }
    }

    /// Remove every player silent for longer than `timeout`, preserving the
    /// order of the rest. Returns the removed players.
    pub fn sweep(&mut self, timeout: Duration) -> Vec<Player> {
        let now = Instant::now();
        let mut removed = Vec::new();
        self.players.retain(|p| {
            if now.duration_since(p.last_seen) > timeout {
                removed.push(p.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }
}
