use crate::error::Result;
use crate::sender::{DatagramSender, SendOutcome};

/// Destination for outgoing datagrams.
///
/// Lets chunk producers run against a socket or, in tests, a plain vector.
pub trait DatagramSink {
    fn send_datagram(&mut self, datagram: &[u8]) -> Result<SendOutcome>;
}

impl DatagramSink for DatagramSender {
    fn send_datagram(&mut self, datagram: &[u8]) -> Result<SendOutcome> {
        self.send(datagram)
    }
}

impl DatagramSink for Vec<Vec<u8>> {
    fn send_datagram(&mut self, datagram: &[u8]) -> Result<SendOutcome> {
        self.push(datagram.to_vec());
        Ok(SendOutcome::Sent(datagram.len()))
    }
}
