//! Non-blocking UDP transport layer

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, trace};

use super::error::NetworkError;

/// Receive buffer size; comfortably above one header plus maximum payload
pub const RECV_BUFFER_SIZE: usize = 4096;

/// What a socket is used for; discovery sockets get broadcast capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Carries session traffic (join, chat, game data)
    Session,
    /// Carries LAN discovery requests and responses
    Discovery,
}

/// A non-blocking UDP socket bound to the wildcard address.
///
/// Every call returns immediately: [`recv_from`](UdpTransport::recv_from)
/// reports "no data yet" as `Ok(None)`, so the caller must poll on a fixed
/// cadence to keep the receive queue drained.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Create, configure, and bind a socket on the given port (0 for
    /// auto-assign).
    ///
    /// SO_REUSEADDR is set so a session can rebind the same port right after
    /// a disconnect; discovery sockets also get SO_BROADCAST. The socket is
    /// switched to non-blocking mode before bind.
    pub fn bind(kind: SocketKind, port: u16) -> Result<Self, NetworkError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

        socket.set_reuse_address(true)?;
        if kind == SocketKind::Discovery {
            socket.set_broadcast(true)?;
        }
        socket.set_nonblocking(true)?;

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&SocketAddr::from(addr).into())?;

        let socket: UdpSocket = socket.into();
        let local_addr = socket.local_addr()?;

        info!("{:?} socket bound to {}", kind, local_addr);
        Ok(Self { socket, local_addr })
    }

    /// Get the local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send one datagram. A short write counts as failure.
    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize, NetworkError> {
        let sent = self.socket.send_to(data, addr)?;
        if sent != data.len() {
            return Err(NetworkError::ShortSend {
                sent,
                expected: data.len(),
            });
        }
        trace!("Sent {} bytes to {}", sent, addr);
        Ok(sent)
    }

    /// Attempt to receive one datagram.
    ///
    /// Returns `Ok(None)` when no data is currently available (WouldBlock),
    /// which is a non-event, not an error.
    pub fn recv_from(&self) -> Result<Option<(Vec<u8>, SocketAddr)>, NetworkError> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((len, addr)) => {
                buf.truncate(len);
                trace!("Received {} bytes from {}", len, addr);
                Ok(Some((buf, addr)))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
