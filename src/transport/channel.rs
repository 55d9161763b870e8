//! Socket channel boundary.
//!
//! The core never assumes blocking semantics: a channel either completes an
//! operation immediately or reports that it would block, which is a normal
//! poll result. One channel serves every connection sharing its local
//! address; inbound datagrams are demultiplexed by the hub.

use std::io;
use std::net::SocketAddr;

use crate::core::ChannelError;

/// Non-blocking datagram channel.
///
/// Fatal errors latch the channel closed; subsequent calls fail fast and the
/// owning connections transition to `Error` on their next tick.
pub trait Channel: Send + Sync {
    /// The bound local address.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Attempt to send one datagram to `remote`.
    fn try_send(&self, data: &[u8], remote: SocketAddr) -> Result<usize, ChannelError>;

    /// Attempt to receive one datagram into `buf`.
    ///
    /// `Ok(None)` means no data is ready; it is not an error.
    fn try_receive(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, ChannelError>;

    /// Mark the channel closed. Idempotent.
    fn close(&self);

    /// Whether the channel has been closed or hit a fatal error.
    fn is_closed(&self) -> bool;
}

#[cfg(feature = "transport")]
pub use udp::UdpChannel;

#[cfg(feature = "transport")]
mod udp {
    use std::io;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::net::UdpSocket;
    use tracing::warn;

    use super::Channel;
    use crate::core::ChannelError;

    /// UDP implementation of [`Channel`] over tokio's non-blocking try-APIs.
    #[derive(Debug)]
    pub struct UdpChannel {
        socket: UdpSocket,
        closed: AtomicBool,
    }

    impl UdpChannel {
        /// Bind to the given address.
        pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
            let socket = UdpSocket::bind(addr).await?;
            Ok(Self::from_socket(socket))
        }

        /// Bind synchronously, for lazy opening inside a poll tick.
        ///
        /// Must be called within a tokio runtime.
        pub fn bind_std(addr: SocketAddr) -> io::Result<Self> {
            let socket = std::net::UdpSocket::bind(addr)?;
            socket.set_nonblocking(true)?;
            Ok(Self::from_socket(UdpSocket::from_std(socket)?))
        }

        /// Wrap an existing tokio socket.
        pub fn from_socket(socket: UdpSocket) -> Self {
            Self {
                socket,
                closed: AtomicBool::new(false),
            }
        }

        fn fatal(&self, error: io::Error) -> ChannelError {
            warn!(%error, "udp channel failed, latching closed");
            self.closed.store(true, Ordering::Relaxed);
            ChannelError::Io(error)
        }
    }

    impl Channel for UdpChannel {
        fn local_addr(&self) -> io::Result<SocketAddr> {
            self.socket.local_addr()
        }

        fn try_send(&self, data: &[u8], remote: SocketAddr) -> Result<usize, ChannelError> {
            if self.is_closed() {
                return Err(ChannelError::Closed);
            }
            match self.socket.try_send_to(data, remote) {
                Ok(count) => Ok(count),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Err(ChannelError::WouldBlock),
                Err(e) => Err(self.fatal(e)),
            }
        }

        fn try_receive(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, ChannelError> {
            if self.is_closed() {
                return Err(ChannelError::Closed);
            }
            match self.socket.try_recv_from(buf) {
                Ok((len, remote)) => Ok(Some((len, remote))),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(self.fatal(e)),
            }
        }

        fn close(&self) {
            self.closed.store(true, Ordering::Relaxed);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::Relaxed)
        }
    }

}
