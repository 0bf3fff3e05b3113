//! UDP datagram transport.
//!
//! The send side never blocks: a full socket buffer drops the datagram and
//! bumps a counter. The receive side polls with a read timeout so callers
//! can check for shutdown between datagrams.

pub mod error;
pub mod receiver;
pub mod sender;
pub mod sockopt;
pub mod traits;

pub use error::{Result, TransportError};
pub use receiver::{
    DatagramReceiver, ReceiverConfig, DEFAULT_RECV_BUFFER, DEFAULT_SOCKET_RECV_BUFFER,
};
pub use sender::{
    DatagramSender, SendOutcome, SendStats, SenderConfig, DEFAULT_SEND_BUFFER, MAX_DATAGRAM_SIZE,
};
pub use traits::DatagramSink;
