//! Network error types

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Errors that can occur in the network subsystem
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Already in a session")]
    AlreadyConnected,

    #[error("Not connected")]
    NotConnected,

    #[error("Session is full")]
    SessionFull,

    #[error("No player with id {0}")]
    PlayerNotFound(u32),

    #[error("Discovery socket is not open")]
    DiscoveryClosed,

    #[error("Could not resolve host '{0}'")]
    HostResolution(String),

    #[error("Short send: {sent} of {expected} bytes accepted")]
    ShortSend { sent: usize, expected: usize },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}
