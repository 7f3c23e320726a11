//! Network protocol definitions
//!
//! Defines the datagram framing and the discovery payload format.

mod discovery;
mod message;

pub use discovery::{GameInfo, GAME_INFO_SIZE, MAX_GAME_NAME, MAX_HOST_NAME};
pub use message::{
    Message, MessageCodec, MessageType, ProtocolError, HEADER_SIZE, MAX_PAYLOAD_SIZE,
    PROTOCOL_MAGIC, PROTOCOL_VERSION,
};

pub(crate) use discovery::truncate_utf8;
pub(crate) use message::now_ms;
