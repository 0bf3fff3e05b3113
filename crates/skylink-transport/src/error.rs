use std::io;
use std::net::SocketAddr;

/// Errors that can occur in datagram transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// Failed to set the default peer of a sending socket.
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The socket send buffer is full.
    #[error("socket send buffer full")]
    BufferFull,

    /// The datagram exceeds what a single UDP packet can carry.
    #[error("datagram too large ({size} bytes, max {max})")]
    DatagramTooLarge { size: usize, max: usize },
}

impl TransportError {
    pub(crate) fn from_send(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => Self::BufferFull,
            _ => Self::Io(err),
        }
    }

    /// Whether the failure only affects the current datagram.
    ///
    /// A full buffer and an ICMP port-unreachable reported for an earlier
    /// datagram are both expected while streaming.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::BufferFull => true,
            Self::Io(err) => err.kind() == io::ErrorKind::ConnectionRefused,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
