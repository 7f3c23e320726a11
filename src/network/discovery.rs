//! Discovered-game tracking
//!
//! Holds the bounded list of sessions seen in discovery responses. The
//! broadcast side of discovery lives in the session, which owns the socket.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::protocol::GameInfo;

/// Maximum number of games tracked at once
pub const MAX_DISCOVERED_GAMES: usize = 16;

/// How often a browsing session re-broadcasts a discovery request
pub const DISCOVERY_INTERVAL: Duration = Duration::from_millis(1000);

/// A game seen on the LAN
#[derive(Debug, Clone)]
pub struct DiscoveredGame {
    pub info: GameInfo,
    /// When the most recent response for this game arrived
    pub last_seen: Instant,
}

/// Bounded list of discovered games, deduplicated by game id.
///
/// A response for a known game id overwrites the existing entry in place;
/// unknown ids are appended until capacity, then dropped.
#[derive(Debug, Default)]
pub struct GameList {
    games: Vec<DiscoveredGame>,
}

impl GameList {
    pub fn new() -> Self {
        Self {
            games: Vec::with_capacity(MAX_DISCOVERED_GAMES),
        }
    }

    /// Record a discovery response.
    pub fn upsert(&mut self, info: GameInfo) {
        let entry = DiscoveredGame {
            info,
            last_seen: Instant::now(),
        };

        if let Some(existing) = self
            .games
            .iter_mut()
            .find(|g| g.info.game_id == entry.info.game_id)
        {
            *existing = entry;
        } else if self.games.len() < MAX_DISCOVERED_GAMES {
            self.games.push(entry);
        } else {
            debug!("Discovered-game list full, dropping {}", entry.info.name);
        }
    }

    /// Up to `max` discovered games, in discovery order.
    pub fn games(&self, max: usize) -> Vec<DiscoveredGame> {
        self.games.iter().take(max).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn clear(&mut self) {
        self.games.clear();
    }
}
