use std::net::{SocketAddr, UdpSocket};

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::sockopt;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Send buffer requested by default, sized for bursts of video chunks.
pub const DEFAULT_SEND_BUFFER: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// `SO_SNDBUF` to request, or `None` to keep the system default.
    pub send_buffer_size: Option<usize>,
    /// Drop on a full buffer instead of waiting for room.
    pub nonblocking: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: Some(DEFAULT_SEND_BUFFER),
            nonblocking: true,
        }
    }
}

/// Result of a single send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(usize),
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
}

/// UDP socket bound locally and connected to one remote peer.
#[derive(Debug)]
pub struct DatagramSender {
    socket: UdpSocket,
    remote: SocketAddr,
    stats: SendStats,
}

impl DatagramSender {
    /// Bind `local` and set `remote` as the destination of every datagram.
    pub fn connect(local: SocketAddr, remote: SocketAddr, config: SenderConfig) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(|e| TransportError::Bind {
            addr: local,
            source: e,
        })?;

        if let Some(size) = config.send_buffer_size {
            match sockopt::set_send_buffer_size(&socket, size) {
                Ok(()) => {
                    let granted = sockopt::send_buffer_size(&socket).unwrap_or(0);
                    debug!(requested = size, granted, "send buffer sized");
                }
                Err(e) => warn!(error = %e, requested = size, "could not size send buffer"),
            }
        }

        socket.connect(remote).map_err(|e| TransportError::Connect {
            addr: remote,
            source: e,
        })?;
        socket.set_nonblocking(config.nonblocking)?;

        info!(local = %socket.local_addr()?, %remote, "datagram sender ready");
        Ok(Self {
            socket,
            remote,
            stats: SendStats::default(),
        })
    }

    /// Send one datagram.
    ///
    /// A full buffer or a refused earlier datagram drops this one and
    /// counts it; only other socket failures are returned as errors.
    pub fn send(&mut self, datagram: &[u8]) -> Result<SendOutcome> {
        if datagram.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::DatagramTooLarge {
                size: datagram.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }

        match self.socket.send(datagram) {
            Ok(n) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += n as u64;
                Ok(SendOutcome::Sent(n))
            }
            Err(e) => {
                self.stats.send_errors += 1;
                let err = TransportError::from_send(e);
                if err.is_transient() {
                    debug!(error = %err, errors = self.stats.send_errors, "datagram dropped");
                    Ok(SendOutcome::Dropped)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub fn stats(&self) -> SendStats {
        self.stats
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Granted `SO_SNDBUF`.
    pub fn send_buffer_size(&self) -> Result<usize> {
        Ok(sockopt::send_buffer_size(&self.socket)?)
    }
}
