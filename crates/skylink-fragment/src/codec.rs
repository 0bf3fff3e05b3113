//! `tokio_util` codec for chunk datagrams, for use with `UdpFramed`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::error::FragmentError;
use crate::header::{Chunk, HeaderFormat};

/// Encodes and decodes one chunk per datagram in a fixed header format.
///
/// A datagram too short for the header is discarded rather than failing
/// the stream.
#[derive(Debug, Clone, Copy)]
pub struct ChunkCodec {
    format: HeaderFormat,
}

impl ChunkCodec {
    pub fn new(format: HeaderFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> HeaderFormat {
        self.format
    }
}

impl Decoder for ChunkCodec {
    type Item = Chunk;
    type Error = FragmentError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        // Each call sees exactly one datagram; take all of it.
        let datagram = src.split().freeze();
        match Chunk::from_datagram(self.format, datagram) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(err) => {
                debug!(error = %err, "discarding malformed datagram");
                Ok(None)
            }
        }
    }
}

impl Encoder<Chunk> for ChunkCodec {
    type Error = FragmentError;

    fn encode(&mut self, item: Chunk, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragmenter::Fragmenter;
    use crate::header::{StreamChunk, StreamHeader};
    use crate::reassembler::Reassembler;
    use bytes::Bytes;

    #[test]
    fn test_decode_consumes_datagram() {
        let chunk = Chunk::Stream(StreamChunk {
            header: StreamHeader {
                chunk_id: 3,
                timestamp_us: 99,
            },
            payload: Bytes::from_static(b"xyz"),
        });
        let mut codec = ChunkCodec::new(HeaderFormat::Stream);
        let mut buf = BytesMut::new();
        codec.encode(chunk.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(chunk));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_discards_short_datagram() {
        let mut codec = ChunkCodec::new(HeaderFormat::Frame);
        let mut buf = BytesMut::from(&[1u8, 2, 3][..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_udp_framed_round_trip() {
        use futures_util::{SinkExt, StreamExt};
        use tokio::net::UdpSocket;
        use tokio_util::udp::UdpFramed;

        let rx_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let rx_addr = rx_socket.local_addr().unwrap();
        let tx_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let mut tx = UdpFramed::new(tx_socket, ChunkCodec::new(HeaderFormat::Frame));
        let mut rx = UdpFramed::new(rx_socket, ChunkCodec::new(HeaderFormat::Frame));

        let frame = Bytes::from((0..3000u32).map(|i| i as u8).collect::<Vec<_>>());
        let mut fragmenter = Fragmenter::with_config(crate::FragmenterConfig {
            max_chunk_payload: 1000,
        });
        let chunks = fragmenter.fragment(frame.clone(), 1).unwrap();
        assert_eq!(chunks.len(), 3);
        for chunk in chunks {
            tx.send((Chunk::Frame(chunk), rx_addr)).await.unwrap();
        }

        let mut reassembler = Reassembler::new();
        let mut completed = None;
        while completed.is_none() {
            let (chunk, _) = rx.next().await.unwrap().unwrap();
            let Chunk::Frame(chunk) = chunk else {
                panic!("expected frame chunk");
            };
            completed = reassembler.push(chunk);
        }
        let completed = completed.unwrap();
        assert_eq!(completed.data, frame);
        assert_eq!(completed.type_tag, 1);
    }
}
