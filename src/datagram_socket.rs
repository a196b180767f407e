use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use std::io;
use tokio::net::UdpSocket;
use tracing::trace;

/// This is an abstraction for an unreliable, unordered datagram transport that is connected to
///  a single peer. It is introduced to facilitate mocking the I/O part away for testing, and to
///  allow running streams over something other than a UDP socket.
///
/// Datagrams may be lost, duplicated or reordered, but they are never split or merged.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatagramSocket: Send + Sync + 'static {
    async fn send(&self, datagram: &[u8]) -> io::Result<usize>;

    /// Receives a single datagram into the buffer, returning its length. Datagrams that do
    ///  not fit into the buffer may be truncated.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// A UDP socket that was `connect()`ed to its peer. Datagrams from other addresses are
///  filtered by the OS.
#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        trace!("UDP socket: sending {} bytes to {:?}", datagram.len(), self.peer_addr());
        UdpSocket::send(self, datagram).await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf).await
    }
}
