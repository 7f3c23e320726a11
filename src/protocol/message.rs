//! Message framing for the lanlink protocol
//!
//! Wire format (20-byte header, big-endian):
//! - magic: 4 bytes
//! - version: 2 bytes
//! - type: 2 bytes
//! - payload size: 4 bytes
//! - sequence: 4 bytes
//! - timestamp: 4 bytes (sender-local milliseconds)
//!
//! followed by `payload size` bytes of opaque payload.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Protocol magic number ("LIBC")
pub const PROTOCOL_MAGIC: u32 = 0x4C49_4243;

/// Protocol version
pub const PROTOCOL_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 20;

/// Maximum payload size per datagram
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Current sender-local clock in milliseconds, wrapped to the u32 wire field.
pub(crate) fn now_ms() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u32
}

/// Message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    /// LAN discovery probe (broadcast by browsing clients)
    DiscoveryRequest = 1,
    /// Host's answer carrying a [`GameInfo`](crate::protocol::GameInfo) payload
    DiscoveryResponse = 2,
    /// Client asks to join; payload is the player name
    JoinRequest = 3,
    /// Host's answer; payload is the assigned player id
    JoinResponse = 4,
    /// Reserved
    PlayerList = 5,
    /// Reserved
    GameStart = 6,
    /// Opaque game payload, forwarded to the application
    GameData = 7,
    /// Sender is leaving the session
    PlayerDisconnect = 8,
    /// Reserved
    Ping = 9,
    /// Reserved
    Pong = 10,
    /// Chat text, forwarded to the application
    Chat = 11,
    /// Opaque full-state payload, forwarded to the application
    GameStateSync = 12,
    /// Opaque per-turn payload, forwarded to the application
    TurnData = 13,
    /// Reserved
    Error = 14,
}

impl TryFrom<u16> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(MessageType::DiscoveryRequest),
            2 => Ok(MessageType::DiscoveryResponse),
            3 => Ok(MessageType::JoinRequest),
            4 => Ok(MessageType::JoinResponse),
            5 => Ok(MessageType::PlayerList),
            6 => Ok(MessageType::GameStart),
            7 => Ok(MessageType::GameData),
            8 => Ok(MessageType::PlayerDisconnect),
            9 => Ok(MessageType::Ping),
            10 => Ok(MessageType::Pong),
            11 => Ok(MessageType::Chat),
            12 => Ok(MessageType::GameStateSync),
            13 => Ok(MessageType::TurnData),
            14 => Ok(MessageType::Error),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

/// Errors produced while framing or validating datagrams
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("datagram shorter than header ({0} bytes)")]
    TooShort(usize),

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported protocol version {0}")]
    BadVersion(u16),

    #[error("unknown message type {0}")]
    UnknownType(u16),

    #[error("payload of {0} bytes exceeds maximum")]
    PayloadTooLarge(usize),

    #[error("declared payload size {declared} does not match received {actual}")]
    SizeMismatch { declared: usize, actual: usize },
}

/// A decoded network message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub msg_type: MessageType,
    pub sequence: u32,
    pub timestamp: u32,
    pub payload: Vec<u8>,
}

impl Message {
    /// Decode and validate one datagram.
    ///
    /// Pure: statistics accounting happens in the caller.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::TooShort(data.len()));
        }

        let magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        if magic != PROTOCOL_MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }

        let version = u16::from_be_bytes([data[4], data[5]]);
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::BadVersion(version));
        }

        let msg_type = MessageType::try_from(u16::from_be_bytes([data[6], data[7]]))?;
        let declared = u32::from_be_bytes([data[8], data[9], data[10], data[11]]) as usize;
        let sequence = u32::from_be_bytes([data[12], data[13], data[14], data[15]]);
        let timestamp = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);

        if declared > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge(declared));
        }
        let actual = data.len() - HEADER_SIZE;
        if declared != actual {
            return Err(ProtocolError::SizeMismatch { declared, actual });
        }

        Ok(Self {
            msg_type,
            sequence,
            timestamp,
            payload: data[HEADER_SIZE..].to_vec(),
        })
    }
}

/// Encoder holding the sender-side sequence counter.
///
/// Sequence numbers start at 1 and post-increment on every encode. They are
/// stamped for wire compatibility only; no receiver interprets them.
#[derive(Debug)]
pub struct MessageCodec {
    next_sequence: u32,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self { next_sequence: 1 }
    }

    /// Build one datagram: header plus payload.
    pub fn encode(&mut self, msg_type: MessageType, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge(payload.len()));
        }

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(&PROTOCOL_MAGIC.to_be_bytes());
        buf.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
        buf.extend_from_slice(&(msg_type as u16).to_be_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&sequence.to_be_bytes());
        buf.extend_from_slice(&now_ms().to_be_bytes());
        buf.extend_from_slice(payload);

        Ok(buf)
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}
