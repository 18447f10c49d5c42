//! Connected UDP transport

use std::io;
use std::net::SocketAddr;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::info;

use super::Transport;
use crate::{ReachError, Result};

/// UDP socket connected to a single device endpoint.
///
/// The socket only exchanges datagrams with the connected peer. One read
/// returns at most one datagram; anything beyond the read buffer is dropped by
/// the OS, so size the buffer for the largest datagram the device sends.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `remote`.
    pub async fn connect<A: ToSocketAddrs>(remote: A) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| ReachError::transport_error("bind", e))?;
        Self::connect_socket(socket, remote).await
    }

    /// Connect an already-bound socket to `remote`.
    pub async fn connect_socket<A: ToSocketAddrs>(socket: UdpSocket, remote: A) -> Result<Self> {
        socket.connect(remote).await.map_err(|e| ReachError::transport_error("connect", e))?;
        let peer = socket.peer_addr().map_err(|e| ReachError::transport_error("connect", e))?;

        info!(%peer, "UDP transport connected");
        Ok(Self { socket, peer })
    }

    /// Address of the connected device.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|e| ReachError::transport_error("local_addr", e))
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }

    async fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        self.socket.send(bytes).await
    }
}
