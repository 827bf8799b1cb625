use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{Result, RtspError};

/// UDP socket for inbound RTP datagrams.
///
/// Receives block for at most `poll_interval`, so the receive loop can
/// notice a state change between datagrams. A timeout is reported as
/// `Ok(None)`, not as an error.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind `host:port`. Port 0 picks an ephemeral port; see
    /// [`local_addr`](Self::local_addr).
    pub fn bind(host: &str, port: u16, poll_interval: Duration) -> Result<Self> {
        let socket = UdpSocket::bind((host, port)).map_err(RtspError::RtpSocket)?;
        socket
            .set_read_timeout(Some(poll_interval))
            .map_err(RtspError::RtpSocket)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(RtspError::RtpSocket)
    }

    /// Receive one datagram into `buf`, or `None` if none arrived in time.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
