//! Discovery-response payload
//!
//! Payload format (fixed 108 bytes):
//! - game name: 64 bytes, NUL-padded UTF-8
//! - host display name: 32 bytes, NUL-padded UTF-8
//! - host IP: 4 bytes (big-endian IPv4)
//! - host port: 2 bytes (big-endian)
//! - current players: 1 byte
//! - max players: 1 byte
//! - game id: 4 bytes (big-endian)

use std::net::Ipv4Addr;

use super::message::ProtocolError;

/// Maximum game-name length on the wire
pub const MAX_GAME_NAME: usize = 64;

/// Maximum host display-name length on the wire
pub const MAX_HOST_NAME: usize = 32;

/// Total payload size
pub const GAME_INFO_SIZE: usize = MAX_GAME_NAME + MAX_HOST_NAME + 12;

/// A hosted game as advertised in a discovery response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub name: String,
    pub host_name: String,
    pub host_ip: Ipv4Addr,
    pub host_port: u16,
    pub current_players: u8,
    pub max_players: u8,
    pub game_id: u32,
}

/// Copy `s` into a NUL-padded field, truncating on a char boundary.
fn write_padded(buf: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = truncate_utf8(s, width);
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + width - bytes.len(), 0);
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub(crate) fn truncate_utf8(s: &str, max: usize) -> &[u8] {
    if s.len() <= max {
        return s.as_bytes();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s.as_bytes()[..end]
}

/// Read a NUL-padded field back into a string.
fn read_padded(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl GameInfo {
    /// Serialize into a discovery-response payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(GAME_INFO_SIZE);
        write_padded(&mut buf, &self.name, MAX_GAME_NAME);
        write_padded(&mut buf, &self.host_name, MAX_HOST_NAME);
        buf.extend_from_slice(&self.host_ip.octets());
        buf.extend_from_slice(&self.host_port.to_be_bytes());
        buf.push(self.current_players);
        buf.push(self.max_players);
        buf.extend_from_slice(&self.game_id.to_be_bytes());
        buf
    }

    /// Deserialize from a discovery-response payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != GAME_INFO_SIZE {
            return Err(ProtocolError::SizeMismatch {
                declared: GAME_INFO_SIZE,
                actual: data.len(),
            });
        }

        let name = read_padded(&data[..MAX_GAME_NAME]);
        let host_name = read_padded(&data[MAX_GAME_NAME..MAX_GAME_NAME + MAX_HOST_NAME]);
        let rest = &data[MAX_GAME_NAME + MAX_HOST_NAME..];

        Ok(Self {
            name,
            host_name,
            host_ip: Ipv4Addr::new(rest[0], rest[1], rest[2], rest[3]),
            host_port: u16::from_be_bytes([rest[4], rest[5]]),
            current_players: rest[6],
            max_players: rest[7],
            game_id: u32::from_be_bytes([rest[8], rest[9], rest[10], rest[11]]),
        })
    }
}
