//! Chunking and sending shared by the `send` and `telemetry` commands.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use skylink_fragment::{
    Chunk, Fragmenter, FragmenterConfig, HeaderFormat, StreamChunker, StreamChunkerConfig,
};
use skylink_transport::{DatagramSink, SendOutcome, MAX_DATAGRAM_SIZE};
use tracing::warn;

use crate::exit::{fragment_error, CliError, CliResult, USAGE};
use crate::output::Report;

enum Framer {
    Frame(Fragmenter),
    Stream(StreamChunker),
}

/// Splits payloads into chunks of one header format and pushes them into a
/// datagram sink, counting what went out.
pub struct ChunkLink {
    framer: Framer,
    payloads: u64,
    chunks_sent: u64,
    chunks_dropped: u64,
}

impl ChunkLink {
    pub fn new(format: HeaderFormat, mtu: usize) -> CliResult<Self> {
        let header = format.header_size();
        if mtu <= header || mtu > MAX_DATAGRAM_SIZE {
            return Err(CliError::new(
                USAGE,
                format!("--mtu must be between {} and {MAX_DATAGRAM_SIZE}", header + 1),
            ));
        }

        let framer = match format {
            HeaderFormat::Frame => {
                Framer::Frame(Fragmenter::with_config(FragmenterConfig::for_mtu(mtu)))
            }
            HeaderFormat::Stream => Framer::Stream(StreamChunker::with_config(StreamChunkerConfig {
                max_chunk_payload: mtu - header,
            })),
        };
        Ok(Self {
            framer,
            payloads: 0,
            chunks_sent: 0,
            chunks_dropped: 0,
        })
    }

    /// Send one payload. `type_tag` applies to frame headers, `timestamp_us`
    /// to stream headers.
    pub fn send(
        &mut self,
        sink: &mut impl DatagramSink,
        payload: Bytes,
        type_tag: u8,
        timestamp_us: u64,
    ) -> CliResult<()> {
        let chunks: Vec<Chunk> = match &mut self.framer {
            Framer::Frame(fragmenter) => fragmenter
                .fragment(payload, type_tag)
                .map_err(|err| fragment_error("fragment failed", err))?
                .into_iter()
                .map(Chunk::Frame)
                .collect(),
            Framer::Stream(chunker) => chunker
                .chunk(payload, timestamp_us)
                .map_err(|err| fragment_error("chunking failed", err))?
                .into_iter()
                .map(Chunk::Stream)
                .collect(),
        };
        self.emit(sink, chunks)
    }

    /// Send one Annex-B unit, tagging frame chunks with its NAL type.
    pub fn send_video(
        &mut self,
        sink: &mut impl DatagramSink,
        unit: Bytes,
        timestamp_us: u64,
    ) -> CliResult<()> {
        let Framer::Frame(fragmenter) = &mut self.framer else {
            return self.send(sink, unit, 0, timestamp_us);
        };
        let chunks = fragmenter
            .fragment_video(unit)
            .map_err(|err| fragment_error("fragment failed", err))?;
        self.emit(sink, chunks.into_iter().map(Chunk::Frame).collect())
    }

    /// Push every chunk. A failed send drops that chunk only; the stream
    /// carries on with the next one.
    fn emit(&mut self, sink: &mut impl DatagramSink, chunks: Vec<Chunk>) -> CliResult<()> {
        self.payloads += 1;
        for chunk in chunks {
            match sink.send_datagram(&chunk.to_bytes()) {
                Ok(SendOutcome::Sent(_)) => self.chunks_sent += 1,
                Ok(SendOutcome::Dropped) => self.chunks_dropped += 1,
                Err(err) => {
                    self.chunks_dropped += 1;
                    warn!(error = %err, dropped = self.chunks_dropped, "chunk send failed");
                }
            }
        }
        Ok(())
    }

    pub fn fill_report(&self, report: &mut Report) {
        report
            .add("payloads", self.payloads)
            .add("chunks_sent", self.chunks_sent)
            .add("chunks_dropped", self.chunks_dropped);
    }
}

pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_fragment::{FrameChunk, Reassembler, StreamChunk, FRAME_HEADER_SIZE};
    use skylink_transport::TransportError;
    use std::io;

    /// Fails the first send with an unreachable route, then collects.
    struct FlakySink {
        failures: usize,
        sent: Vec<Vec<u8>>,
    }

    impl DatagramSink for FlakySink {
        fn send_datagram(&mut self, datagram: &[u8]) -> skylink_transport::Result<SendOutcome> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(TransportError::Io(io::Error::from(
                    io::ErrorKind::NetworkUnreachable,
                )));
            }
            self.sent.push(datagram.to_vec());
            Ok(SendOutcome::Sent(datagram.len()))
        }
    }

    #[test]
    fn frame_link_round_trips_through_reassembler() {
        let mut link = ChunkLink::new(HeaderFormat::Frame, 110).unwrap();
        let mut sink: Vec<Vec<u8>> = Vec::new();
        let payload = Bytes::from((0..250u32).map(|i| i as u8).collect::<Vec<_>>());
        link.send(&mut sink, payload.clone(), 3, 0).unwrap();

        assert_eq!(sink.len(), 3);
        assert!(sink.iter().all(|d| d.len() <= 110));

        let mut reassembler = Reassembler::new();
        let mut done = None;
        for datagram in sink {
            done = done.or(reassembler.push_datagram(Bytes::from(datagram)));
        }
        let frame = done.unwrap();
        assert_eq!(frame.data, payload);
        assert_eq!(frame.type_tag, 3);
    }

    #[test]
    fn video_units_tagged_by_nal_type() {
        let mut link = ChunkLink::new(HeaderFormat::Frame, 1400).unwrap();
        let mut sink: Vec<Vec<u8>> = Vec::new();
        link.send_video(&mut sink, Bytes::from_static(&[0, 0, 0, 1, 0x67, 0x42]), 0)
            .unwrap();
        let chunk = FrameChunk::from_datagram(Bytes::from(sink.remove(0))).unwrap();
        assert_eq!(chunk.header.type_tag, 7);
    }

    #[test]
    fn stream_link_stamps_chunks() {
        let mut link = ChunkLink::new(HeaderFormat::Stream, 112).unwrap();
        let mut sink: Vec<Vec<u8>> = Vec::new();
        link.send(&mut sink, Bytes::from(vec![9u8; 250]), 0, 77).unwrap();

        assert_eq!(sink.len(), 3);
        let ids: Vec<u32> = sink
            .into_iter()
            .map(|d| StreamChunk::from_datagram(Bytes::from(d)).unwrap())
            .inspect(|c| assert_eq!(c.header.timestamp_us, 77))
            .map(|c| c.header.chunk_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let mut report = Report::new("send");
        link.fill_report(&mut report);
        assert_eq!(report.get("chunks_sent"), Some(3));
    }

    #[test]
    fn socket_failure_drops_chunk_and_keeps_sending() {
        let mut link = ChunkLink::new(HeaderFormat::Frame, 110).unwrap();
        let mut sink = FlakySink {
            failures: 1,
            sent: Vec::new(),
        };
        link.send(&mut sink, Bytes::from(vec![1u8; 250]), 0, 0).unwrap();
        link.send(&mut sink, Bytes::from_static(b"next"), 0, 0).unwrap();

        assert_eq!(sink.sent.len(), 3);
        let mut report = Report::new("send");
        link.fill_report(&mut report);
        assert_eq!(report.get("payloads"), Some(2));
        assert_eq!(report.get("chunks_sent"), Some(3));
        assert_eq!(report.get("chunks_dropped"), Some(1));
    }

    #[test]
    fn rejects_mtu_without_room_for_payload() {
        assert!(ChunkLink::new(HeaderFormat::Frame, FRAME_HEADER_SIZE).is_err());
        assert!(ChunkLink::new(HeaderFormat::Frame, MAX_DATAGRAM_SIZE + 1).is_err());
    }
}
