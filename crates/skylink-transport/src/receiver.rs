use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::sockopt;

/// Read buffer length; large enough for any UDP datagram chunk.
pub const DEFAULT_RECV_BUFFER: usize = 65_536;

/// Kernel receive buffer requested at bind, room for a burst of video chunks.
pub const DEFAULT_SOCKET_RECV_BUFFER: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Userspace buffer one datagram is read into.
    pub recv_buffer_size: usize,
    /// `SO_RCVBUF` to request. `None` keeps the system default.
    pub socket_recv_buffer: Option<usize>,
    /// How long a receive waits before reporting no data.
    pub read_timeout: Option<Duration>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER,
            socket_recv_buffer: Some(DEFAULT_SOCKET_RECV_BUFFER),
            read_timeout: Some(Duration::from_millis(100)),
        }
    }
}

#[derive(Debug)]
pub struct DatagramReceiver {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl DatagramReceiver {
    pub fn bind(addr: SocketAddr, config: ReceiverConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|e| TransportError::Bind { addr, source: e })?;
        socket.set_read_timeout(config.read_timeout)?;

        if let Some(size) = config.socket_recv_buffer {
            match sockopt::set_recv_buffer_size(&socket, size) {
                Ok(()) => {
                    let granted = sockopt::recv_buffer_size(&socket).unwrap_or(0);
                    debug!(requested = size, granted, "receive buffer sized");
                }
                Err(e) => warn!(error = %e, requested = size, "could not size receive buffer"),
            }
        }
        info!(local = %socket.local_addr()?, "datagram receiver bound");
        Ok(Self {
            socket,
            buf: vec![0; config.recv_buffer_size],
        })
    }

    /// Receive into `buf`. `None` when the read timeout expires first.
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Receive into the internal buffer and return an owned copy.
    pub fn recv_datagram(&mut self) -> Result<Option<(Bytes, SocketAddr)>> {
        let mut buf = std::mem::take(&mut self.buf);
        let received = self.recv(&mut buf);
        let out = received.map(|r| {
            r.map(|(n, from)| {
                debug!(len = n, %from, "datagram received");
                (Bytes::copy_from_slice(&buf[..n]), from)
            })
        });
        self.buf = buf;
        out
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Granted `SO_RCVBUF`.
    pub fn socket_recv_buffer(&self) -> Result<usize> {
        Ok(sockopt::recv_buffer_size(&self.socket)?)
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::{DatagramSender, SenderConfig};

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_timeout_returns_none() {
        let receiver = DatagramReceiver::bind(
            loopback(),
            ReceiverConfig {
                read_timeout: Some(Duration::from_millis(20)),
                ..ReceiverConfig::default()
            },
        )
        .unwrap();
        let mut buf = [0u8; 64];
        assert!(receiver.recv(&mut buf).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_bind_sizes_kernel_buffer() {
        let receiver = DatagramReceiver::bind(
            loopback(),
            ReceiverConfig {
                socket_recv_buffer: Some(64 * 1024),
                ..ReceiverConfig::default()
            },
        )
        .unwrap();
        assert!(receiver.socket_recv_buffer().unwrap() >= 64 * 1024);
    }

    #[test]
    fn test_sender_to_receiver() {
        let mut receiver = DatagramReceiver::bind(
            loopback(),
            ReceiverConfig {
                read_timeout: Some(Duration::from_secs(2)),
                ..ReceiverConfig::default()
            },
        )
        .unwrap();
        let mut sender = DatagramSender::connect(
            loopback(),
            receiver.local_addr().unwrap(),
            SenderConfig::default(),
        )
        .unwrap();

        let payload = vec![0xA5u8; 8_000];
        sender.send(&payload).unwrap();
        let (datagram, from) = receiver.recv_datagram().unwrap().unwrap();
        assert_eq!(datagram.len(), 8_000);
        assert_eq!(&datagram[..], &payload[..]);
        assert_eq!(from, sender.local_addr().unwrap());
    }
}
